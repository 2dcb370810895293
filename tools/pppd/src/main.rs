mod capture;
mod config;
mod link;
mod relay;
mod timefmt;

use anyhow::{Context, Result, bail};
use blinky_ppp::{Session, Stats};
use capture::Capture;
use clap::{Args, Parser, Subcommand};
use config::Config;
use dialoguer::{Select, theme::ColorfulTheme};
use link::{PortLock, SerialLink};
use relay::RadioRelay;
use serialport::{SerialPortType, available_ports};
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};
use timefmt::Clock;

/// blinky-pppd – serves the blinky PPP stack on a serial port for a dial-up peer.
#[derive(Parser, Debug)]
#[command(name = "blinky-pppd", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the PPP stack until interrupted.
    Run(RunArgs),
    /// List detected serial ports.
    ListPorts,
    /// Print the radio parameter table.
    Params {
        /// Show only this parameter (Mode, Channel, Power, Payload).
        name: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Serial device; leave empty to select interactively.
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    /// TOML config; defaults to configs/blinky-pppd.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append a JSON line per serial chunk to this file.
    #[arg(long)]
    capture: Option<PathBuf>,
    /// Serial device receiving LED relay commands (overrides config).
    #[arg(long)]
    relay_port: Option<String>,
    /// Auto-stop after duration, e.g. 30s/2m/1h (0 = unlimited).
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0")]
    duration: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run(args) => run(args).await?,
        Cmd::ListPorts => {
            let ports = available_ports()?;
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for p in ports {
                println!("{}", describe_port(&p));
            }
        }
        Cmd::Params { name, config, json } => {
            let cfg = Config::load(config.as_deref())?;
            let table = cfg.radio.table();
            if let Some(name) = name {
                let Some(p) = table.get(&name) else {
                    bail!("unknown radio parameter: {name}");
                };
                println!("{}", p.value);
            } else if json {
                println!("{}", serde_json::to_string_pretty(&cfg.radio)?);
            } else {
                for p in table.iter() {
                    println!("{:<8} {}", p.name, p.value);
                }
            }
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let cfg = Config::load(args.config.as_deref())?;
    let session_cfg = cfg.session_config()?;
    let baud = args.baud.unwrap_or(cfg.serial.baud);
    let port_name = match args.port {
        Some(p) => p,
        None => interactive_select_port()?,
    };
    let lock = PortLock::acquire(&port_name)?;
    log::debug!("holding {}", lock.path().display());

    let port = serialport::new(&port_name, baud)
        .timeout(cfg.serial.poll_interval())
        .open()
        .with_context(|| format!("open {port_name} at {baud} baud"))?;
    let clock = Clock::new();
    let capture = match &args.capture {
        Some(path) => Some(Capture::open(path, clock)?),
        None => None,
    };
    let relay_out = match args.relay_port.or(cfg.relay_port.clone()) {
        Some(name) => Some(
            serialport::new(&name, baud)
                .open()
                .with_context(|| format!("open relay port {name}"))?,
        ),
        None => None,
    };
    let pump = Pump {
        link: SerialLink::new(port, capture),
        relay: RadioRelay::new(cfg.radio, relay_out),
        session: Box::new(Session::new(session_cfg)),
        clock,
        poll: cfg.serial.poll_interval(),
        stats_every: Duration::from_secs(cfg.serial.stats_secs),
    };
    log::info!(
        "serving PPP on {port_name} at {baud} baud (server {})",
        cfg.ppp.server_name
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut task = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || pump.run(&stop)
    });
    tokio::select! {
        res = &mut task => {
            let stats = res.context("pump task")??;
            report(&stats);
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
        _ = wait_for(args.duration) => log::info!("run duration elapsed"),
    }
    stop.store(true, Ordering::SeqCst);
    let stats = task.await.context("pump task")??;
    report(&stats);
    Ok(())
}

async fn wait_for(duration: Duration) {
    if duration.is_zero() {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(duration).await
    }
}

/// Owns the session and everything it talks to; runs on a blocking thread
/// because the stack is not re-entrant.
struct Pump<L, W> {
    link: L,
    relay: RadioRelay<W>,
    session: Box<Session>,
    clock: Clock,
    poll: Duration,
    stats_every: Duration,
}

impl<L, W> Pump<L, W>
where
    L: blinky_ppp::Transport<Error = std::io::Error>,
    W: std::io::Write,
{
    fn run(mut self, stop: &AtomicBool) -> Result<Stats> {
        let mut online = self.session.is_online();
        let mut peer = None;
        let mut last_report = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            self.session
                .poll(&mut self.link, &mut self.relay, self.clock.uptime_ms())
                .context("serial link")?;
            if self.session.is_online() != online {
                online = self.session.is_online();
                log::info!("link {}", if online { "up" } else { "down" });
            }
            if self.session.host_ip() != peer {
                peer = self.session.host_ip();
                if let Some(ip) = peer {
                    log::info!("peer proposed {ip}");
                }
            }
            if !self.stats_every.is_zero() && last_report.elapsed() >= self.stats_every {
                report(self.session.stats());
                last_report = Instant::now();
            }
            std::thread::sleep(self.poll);
        }
        Ok(*self.session.stats())
    }
}

fn report(stats: &Stats) {
    log::info!(
        "stats: sent={} received={} fcs_errors={} malformed={} dropped={} overflow={} overruns={}",
        stats.frames_sent,
        stats.frames_received,
        stats.fcs_errors,
        stats.malformed_frames,
        stats.frames_dropped,
        stats.bytes_dropped,
        stats.overruns
    );
}

fn describe_port(p: &serialport::SerialPortInfo) -> String {
    match &p.port_type {
        SerialPortType::UsbPort(info) => format!(
            "{} (vid={:04x} pid={:04x} {})",
            p.port_name,
            info.vid,
            info.pid,
            info.product.as_deref().unwrap_or("")
        ),
        _ => p.port_name.clone(),
    }
}

fn interactive_select_port() -> Result<String> {
    let ports = available_ports()?;
    if ports.is_empty() {
        bail!("no serial ports found; connect the modem cable and retry");
    }
    // USB adapters first; fall back to everything.
    let mut candidates: Vec<&serialport::SerialPortInfo> = ports
        .iter()
        .filter(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .collect();
    if candidates.is_empty() {
        candidates = ports.iter().collect();
    }
    let items: Vec<String> = candidates.iter().map(|p| describe_port(p)).collect();
    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select serial port (arrows to move, enter to confirm)")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(candidates[idx].port_name.clone())
}
