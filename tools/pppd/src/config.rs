use anyhow::{Context, Result, anyhow, bail};
use blinky_radio_link::RadioParams;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PATH: &str = "configs/blinky-pppd.toml";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub ppp: PppConfig,
    #[serde(default)]
    pub radio: RadioParams,
    /// Serial port the LED relay commands are written to, if any.
    #[serde(default)]
    pub relay_port: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "SerialConfig::default_baud")]
    pub baud: u32,
    #[serde(default = "SerialConfig::default_poll_ms")]
    pub poll_ms: u64,
    /// Seconds between stats lines in the log; 0 disables them.
    #[serde(default = "SerialConfig::default_stats_secs")]
    pub stats_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PppConfig {
    #[serde(default = "PppConfig::default_tcp_window")]
    pub tcp_window: u16,
    #[serde(default = "PppConfig::default_server_name")]
    pub server_name: String,
    #[serde(default = "PppConfig::default_initial_ident")]
    pub initial_ident: u16,
    #[serde(default = "PppConfig::default_connect_handshake")]
    pub connect_handshake: bool,
    #[serde(default = "PppConfig::default_max_ipcp_naks")]
    pub max_ipcp_naks: u8,
}

impl SerialConfig {
    fn default_baud() -> u32 {
        115_200
    }
    fn default_poll_ms() -> u64 {
        5
    }
    fn default_stats_secs() -> u64 {
        60
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: Self::default_baud(),
            poll_ms: Self::default_poll_ms(),
            stats_secs: Self::default_stats_secs(),
        }
    }
}

impl PppConfig {
    fn default_tcp_window() -> u16 {
        blinky_ppp::Config::DEFAULT_TCP_WINDOW
    }
    fn default_server_name() -> String {
        blinky_ppp::Config::DEFAULT_SERVER_NAME.to_string()
    }
    fn default_initial_ident() -> u16 {
        blinky_ppp::Config::DEFAULT_INITIAL_IDENT
    }
    fn default_connect_handshake() -> bool {
        true
    }
    fn default_max_ipcp_naks() -> u8 {
        blinky_ppp::Config::DEFAULT_MAX_IPCP_NAKS
    }
}

impl Default for PppConfig {
    fn default() -> Self {
        Self {
            tcp_window: Self::default_tcp_window(),
            server_name: Self::default_server_name(),
            initial_ident: Self::default_initial_ident(),
            connect_handshake: Self::default_connect_handshake(),
            max_ipcp_naks: Self::default_max_ipcp_naks(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            ppp: PppConfig::default(),
            radio: RadioParams::default(),
            relay_port: None,
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when it exists, or built-in
    /// defaults. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("config file not found: {}", p.display());
                }
                p
            }
            None => {
                let p = Path::new(DEFAULT_PATH);
                if !p.exists() {
                    return Ok(Config::default());
                }
                p
            }
        };
        let txt = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&txt).with_context(|| format!("parse {}", path.display()))
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let mut cfg: Config = toml::from_str(txt)?;
        if cfg.serial.baud == 0 {
            cfg.serial.baud = SerialConfig::default_baud();
        }
        if cfg.serial.poll_ms == 0 {
            cfg.serial.poll_ms = SerialConfig::default_poll_ms();
        }
        if cfg.ppp.tcp_window == 0 {
            cfg.ppp.tcp_window = PppConfig::default_tcp_window();
        }
        if cfg.ppp.server_name.trim().is_empty() {
            cfg.ppp.server_name = PppConfig::default_server_name();
        }
        if cfg
            .relay_port
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            cfg.relay_port = None;
        }
        cfg.radio.validate().map_err(|e| anyhow!("[radio] {e}"))?;
        Ok(cfg)
    }

    pub fn session_config(&self) -> Result<blinky_ppp::Config> {
        let base = blinky_ppp::Config {
            tcp_window: self.ppp.tcp_window,
            initial_ident: self.ppp.initial_ident,
            connect_handshake: self.ppp.connect_handshake,
            max_ipcp_naks: self.ppp.max_ipcp_naks,
            ..blinky_ppp::Config::default()
        };
        base.with_server_name(self.ppp.server_name.trim())
            .map_err(|_| {
                anyhow!(
                    "[ppp] server_name longer than {} bytes",
                    blinky_ppp::SERVER_NAME_CAPACITY
                )
            })
    }
}
