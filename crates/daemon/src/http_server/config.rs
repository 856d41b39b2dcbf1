use std::net::SocketAddr;

/// Where the naming server binds and how loudly it traces requests.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Level used for per-response trace events
    pub log_level: tracing::Level,
}

impl Config {
    pub fn new(listen_addr: SocketAddr, log_level: tracing::Level) -> Self {
        tracing::debug!(%listen_addr, %log_level, "naming server config");
        Self {
            listen_addr,
            log_level,
        }
    }
}
