use heapless::String;

/// Longest `Server:` header value the HTTP responder will carry.
pub const SERVER_NAME_CAPACITY: usize = 32;

/// Tunables for a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Receive window advertised on every TCP reply.
    pub tcp_window: u16,
    pub server_name: String<SERVER_NAME_CAPACITY>,
    /// First IP identification value on originated packets.
    pub initial_ident: u16,
    /// Answer a raw `CLIENT` from the dialer with `CLIENTSERVER`.
    pub connect_handshake: bool,
    /// Consecutive IPCP Configure-Naks answered before the stack goes quiet.
    pub max_ipcp_naks: u8,
}

impl Config {
    pub const DEFAULT_TCP_WINDOW: u16 = 1200;
    pub const DEFAULT_SERVER_NAME: &'static str = "Blinky-Radio";
    pub const DEFAULT_INITIAL_IDENT: u16 = 10000;
    pub const DEFAULT_MAX_IPCP_NAKS: u8 = 10;

    /// Replaces the server name; fails when it does not fit.
    pub fn with_server_name(mut self, name: &str) -> Result<Self, crate::Error> {
        let mut value = String::new();
        value
            .push_str(name)
            .map_err(|_| crate::Error::BufferTooSmall)?;
        self.server_name = value;
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut server_name = String::new();
        // Fits: the default is well under capacity.
        let _ = server_name.push_str(Self::DEFAULT_SERVER_NAME);
        Self {
            tcp_window: Self::DEFAULT_TCP_WINDOW,
            server_name,
            initial_ident: Self::DEFAULT_INITIAL_IDENT,
            connect_handshake: true,
            max_ipcp_naks: Self::DEFAULT_MAX_IPCP_NAKS,
        }
    }
}
