use std::io;
use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::Client;
pub use protocol::{Request, RequestReader, EOF_CHAR};
pub use server::{Server, ShutdownHandle};
pub use session::{Session, SessionEnd};

pub const DEFAULT_PORT: u16 = 1234;
pub const DEFAULT_INTERFACE: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";
/// Largest request the server accepts, terminating NUL included.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub interface: String,
    pub port: u16,
    /// One worker thread per client instead of one client at a time.
    pub threaded: bool,
    pub buffer_size: usize,
    /// Upper bound on how long the listener takes to notice a shutdown.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_PORT,
            threaded: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }
}

/// Parses `host:port`, `host` or `:port`, filling the missing part from
/// `default_host` or [`DEFAULT_PORT`]. Returns `None` for a bad port.
pub fn parse_address(spec: Option<&str>, default_host: &str) -> Option<(String, u16)> {
    let spec = spec.map(str::trim).unwrap_or_default();
    let (host, port) = match spec.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (spec, None),
    };

    let host = if host.is_empty() { default_host } else { host };
    let port = match port {
        Some(port) => port.parse().ok()?,
        None => DEFAULT_PORT,
    };
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address(None, DEFAULT_INTERFACE),
            Some(("0.0.0.0".to_string(), DEFAULT_PORT))
        );
        assert_eq!(
            parse_address(Some("10.0.0.5:8080"), DEFAULT_INTERFACE),
            Some(("10.0.0.5".to_string(), 8080))
        );
        assert_eq!(
            parse_address(Some(":5555"), DEFAULT_CLIENT_HOST),
            Some(("127.0.0.1".to_string(), 5555))
        );
        assert_eq!(
            parse_address(Some("example.org"), DEFAULT_CLIENT_HOST),
            Some(("example.org".to_string(), DEFAULT_PORT))
        );
        assert_eq!(parse_address(Some("host:notaport"), DEFAULT_INTERFACE), None);
        assert_eq!(parse_address(Some("host:70000"), DEFAULT_INTERFACE), None);
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:1234");
        assert!(!config.threaded);
        assert_eq!(config.buffer_size, 64 * 1024);
    }
}
