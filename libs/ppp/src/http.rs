//! Single-shot HTTP responder living inside one TCP segment.
//!
//! Every response closes the connection. Pages:
//!
//! - `/` root page with three LED buttons
//! - `/a`, `/b`, `/c` toggle relay LEDs 1, 2, 3 and return the root page
//! - `/x` number of PPP frames sent so far, `/xb` the same with a zero-delay
//!   refresh for benchmarking page loads
//! - `/ws` with `Sec-WebSocket-Key` switches protocols
//!
//! Anything else is a 404 with an empty body.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::relay::{LedBank, LedRelay};
use crate::websocket::accept_key;
use crate::Error;

const ROOT_PAGE: &str = "\
<!DOCTYPE html>\
<html>\
<head>\
<title>Blinky Over Radio</title>\
<body style=\"font-family: sans-serif; font-size:25px; color:#807070\">\
<h1>Blinky Over Radio</h1>\
<form>\
<input type=\"button\" value=\"Toggle LED1\" onclick=\"window.location.href= '/a'\"/>\
<input type=\"button\" value=\"Toggle LED2\" onclick=\"window.location.href= '/b'\"/>\
<input type=\"button\" value=\"Toggle LED3\" onclick=\"window.location.href= '/c'\"/>\
</form>\
</body>\
</html>";

/// Width of the back-patched Content-Length field.
const CONTENT_LENGTH_WIDTH: usize = 5;
const CONTENT_LENGTH_PLACEHOLDER: &str = "?????";

pub type WebSocketKey = String<32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    /// Toggle the relay LED at this address.
    Toggle(u8),
    FrameCount { refresh: bool },
    WebSocket(WebSocketKey),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub route: Route,
}

impl Request {
    /// Parses a TCP payload. Returns `None` unless it starts with `GET /`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !data.starts_with(b"GET /") {
            return None;
        }
        // Headers are ASCII; cut at the first byte that is not UTF-8.
        let text = match core::str::from_utf8(data) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&data[..e.valid_up_to()]).unwrap_or("GET /"),
        };
        let mut lines = text.lines();
        let request_line = lines.next().unwrap_or("");
        let path = request_line.split_whitespace().nth(1).unwrap_or("/");

        let route = match path {
            "/" => Route::Root,
            "/a" => Route::Toggle(1),
            "/b" => Route::Toggle(2),
            "/c" => Route::Toggle(3),
            "/x" => Route::FrameCount { refresh: false },
            "/xb" => Route::FrameCount { refresh: true },
            "/ws" => match websocket_key(lines) {
                Some(key) => Route::WebSocket(key),
                None => Route::NotFound,
            },
            _ => Route::NotFound,
        };
        Some(Self { route })
    }
}

fn websocket_key<'a>(headers: impl Iterator<Item = &'a str>) -> Option<WebSocketKey> {
    for line in headers {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("sec-websocket-key") {
            let mut key = WebSocketKey::new();
            key.push_str(value.trim()).ok()?;
            return (!key.is_empty()).then_some(key);
        }
    }
    None
}

/// What the responder can see and touch while rendering.
pub(crate) struct Site<'a, R> {
    pub leds: &'a mut LedBank,
    pub relay: &'a mut R,
    pub server_name: &'a str,
    pub frames_sent: u32,
}

impl<R: LedRelay> Site<'_, R> {
    /// Performs the request's side effects and renders the response into
    /// `out`. Returns the number of bytes written.
    pub fn respond(&mut self, request: &Request, out: &mut [u8]) -> Result<usize, Error> {
        let mut w = SliceWriter::new(out);
        match &request.route {
            Route::WebSocket(key) => {
                let accept = accept_key(key).ok_or(Error::BufferTooSmall)?;
                core::write!(
                    w,
                    "HTTP/1.1 101 Switching Protocols\r\n\
                     Server: {}\r\n\
                     Upgrade: websocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: {}\r\n\
                     \r\n",
                    self.server_name,
                    accept
                )?;
                return Ok(w.pos);
            }
            Route::NotFound => {
                let patch = self.head(&mut w, "404 Not Found")?;
                w.patch_content_length(patch)?;
                return Ok(w.pos);
            }
            Route::Toggle(address) => self.toggle(*address),
            Route::Root | Route::FrameCount { .. } => {}
        }

        let patch = self.head(&mut w, "200 OK")?;
        match request.route {
            Route::FrameCount { refresh } => {
                let meta = if refresh {
                    "<meta http-equiv=\"refresh\" content=\"0\">"
                } else {
                    ""
                };
                core::write!(
                    w,
                    "<!DOCTYPE html><html><head>{}<title>PPP-Blinky</title></head>\
                     <body style=\"font-family: sans-serif; font-size:25px; color:#807070\">\
                     <h1>{}</h1></body></html>",
                    meta,
                    self.frames_sent
                )?;
            }
            _ => w.write_str(ROOT_PAGE)?,
        }
        w.patch_content_length(patch)?;
        Ok(w.pos)
    }

    /// Writes the status line and headers; returns where the body starts and
    /// where the Content-Length digits go.
    fn head(&self, w: &mut SliceWriter<'_>, status: &str) -> Result<Patch, Error> {
        core::write!(
            w,
            "HTTP/1.1 {}\r\nServer: {}\r\nContent-Length: ",
            status,
            self.server_name
        )?;
        let field = w.pos;
        core::write!(
            w,
            "{}\r\n\
             Connection: close\r\n\
             Content-Type: text/html; charset=us-ascii\r\n\
             \r\n",
            CONTENT_LENGTH_PLACEHOLDER
        )?;
        Ok(Patch {
            field,
            body_start: w.pos,
        })
    }

    fn toggle(&mut self, address: u8) {
        let Some(on) = self.leds.toggle(address) else {
            return;
        };
        info!("http: led {} -> {}", address, on);
        self.relay.set_peer_led_state(address, on);
        self.relay.toggle_local_led(address);
    }
}

#[derive(Debug, Clone, Copy)]
struct Patch {
    field: usize,
    body_start: usize,
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn patch_content_length(&mut self, patch: Patch) -> Result<(), Error> {
        let mut digits: String<CONTENT_LENGTH_WIDTH> = String::new();
        core::write!(
            digits,
            "{:>width$}",
            self.pos - patch.body_start,
            width = CONTENT_LENGTH_WIDTH
        )?;
        self.buf[patch.field..patch.field + CONTENT_LENGTH_WIDTH]
            .copy_from_slice(digits.as_bytes());
        Ok(())
    }
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        let dst = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::BufferTooSmall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingRelay;

    fn render(
        request: &[u8],
        leds: &mut LedBank,
        relay: &mut RecordingRelay,
    ) -> std::string::String {
        let req = Request::parse(request).unwrap();
        let mut site = Site {
            leds,
            relay,
            server_name: "Blinky-Radio",
            frames_sent: 17,
        };
        let mut out = [0u8; 1500];
        let n = site.respond(&req, &mut out).unwrap();
        std::string::String::from_utf8(out[..n].to_vec()).unwrap()
    }

    fn content_length(response: &str) -> (usize, usize) {
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let line = head
            .lines()
            .find(|l| l.starts_with("Content-Length: "))
            .unwrap();
        let field = &line["Content-Length: ".len()..];
        assert_eq!(field.len(), CONTENT_LENGTH_WIDTH);
        (field.trim_start().parse().unwrap(), body.len())
    }

    #[test]
    fn parses_routes() {
        let route = |r: &[u8]| Request::parse(r).unwrap().route;
        assert_eq!(route(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"), Route::Root);
        assert_eq!(route(b"GET /b HTTP/1.1\r\n\r\n"), Route::Toggle(2));
        assert_eq!(route(b"GET /xb HTTP/1.1\r\n\r\n"), Route::FrameCount { refresh: true });
        assert_eq!(route(b"GET /favicon.ico HTTP/1.1\r\n\r\n"), Route::NotFound);
        assert_eq!(route(b"GET /ws HTTP/1.1\r\n\r\n"), Route::NotFound);
        assert_eq!(Request::parse(b"POST / HTTP/1.1\r\n\r\n"), None);
        assert_eq!(Request::parse(b"hello"), None);
    }

    #[test]
    fn websocket_key_header_is_case_insensitive() {
        let req = Request::parse(
            b"GET /ws HTTP/1.1\r\nHost: 172.10.10.2\r\nsec-websocket-KEY:  dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .unwrap();
        match req.route {
            Route::WebSocket(key) => assert_eq!(key.as_str(), "dGhlIHNhbXBsZSBub25jZQ=="),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn root_page_with_patched_length() {
        let mut leds = LedBank::new();
        let mut relay = RecordingRelay::default();
        let resp = render(b"GET / HTTP/1.1\r\n\r\n", &mut leds, &mut relay);
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\nServer: Blinky-Radio\r\n"));
        assert!(resp.contains("Connection: close\r\n"));
        let (declared, actual) = content_length(&resp);
        assert_eq!(declared, actual);
        assert_eq!(actual, ROOT_PAGE.len());
        assert!(resp.ends_with("</html>"));
        assert!(relay.peer.is_empty());
    }

    #[test]
    fn toggle_alternates_and_relays() {
        let mut leds = LedBank::new();
        let mut relay = RecordingRelay::default();
        for _ in 0..3 {
            let resp = render(b"GET /a HTTP/1.1\r\n\r\n", &mut leds, &mut relay);
            assert!(resp.contains("Blinky Over Radio"));
        }
        assert_eq!(relay.peer, [(1, true), (1, false), (1, true)]);
        assert_eq!(relay.local, [1, 1, 1]);
        assert_eq!(leds.state(1), Some(true));
        assert_eq!(leds.state(2), Some(false));
    }

    #[test]
    fn not_found_has_empty_body() {
        let mut leds = LedBank::new();
        let mut relay = RecordingRelay::default();
        let resp = render(b"GET /nope HTTP/1.1\r\n\r\n", &mut leds, &mut relay);
        assert!(resp.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(resp.contains("Content-Length:     0\r\n"));
        assert!(resp.ends_with("\r\n\r\n"));
    }

    #[test]
    fn frame_count_pages() {
        let mut leds = LedBank::new();
        let mut relay = RecordingRelay::default();
        let plain = render(b"GET /x HTTP/1.1\r\n\r\n", &mut leds, &mut relay);
        assert!(plain.contains("<h1>17</h1>"));
        assert!(!plain.contains("refresh"));
        let (declared, actual) = content_length(&plain);
        assert_eq!(declared, actual);

        let fast = render(b"GET /xb HTTP/1.1\r\n\r\n", &mut leds, &mut relay);
        assert!(fast.contains("http-equiv=\"refresh\" content=\"0\""));
    }

    #[test]
    fn websocket_switches_protocols() {
        let mut leds = LedBank::new();
        let mut relay = RecordingRelay::default();
        let resp = render(
            b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
            &mut leds,
            &mut relay,
        );
        assert!(resp.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(resp.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(!resp.contains("Content-Length"));
    }

    #[test]
    fn small_buffer_is_an_error() {
        let req = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let mut leds = LedBank::new();
        let mut relay = ();
        let mut site = Site {
            leds: &mut leds,
            relay: &mut relay,
            server_name: "Blinky-Radio",
            frames_sent: 0,
        };
        let mut out = [0u8; 64];
        assert_eq!(site.respond(&req, &mut out), Err(Error::BufferTooSmall));
    }
}
