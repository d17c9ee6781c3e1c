use log::warn;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::time::Duration;

use crate::keywords::KEYWORDS_FILE;

/// Server settings, read from `DEFECT_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// Preferred port; the next `port_attempts - 1` ports are tried if taken.
    pub port: u16,
    pub port_attempts: u16,
    pub keywords_file: PathBuf,
    pub max_upload_bytes: usize,
    pub session_ttl: Option<Duration>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            port_attempts: 10,
            keywords_file: PathBuf::from(KEYWORDS_FILE),
            max_upload_bytes: 16 * 1024 * 1024,
            session_ttl: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparseable values fall back
    /// to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("DEFECT_HOST")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.host),
            port: parsed("DEFECT_PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(defaults.port),
            port_attempts: parsed("DEFECT_PORT_ATTEMPTS")
                .and_then(|v| u16::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.port_attempts),
            keywords_file: lookup("DEFECT_KEYWORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.keywords_file),
            max_upload_bytes: parsed("DEFECT_MAX_UPLOAD_MB")
                .map(|mb| mb as usize * 1024 * 1024)
                .unwrap_or(defaults.max_upload_bytes),
            session_ttl: parsed("DEFECT_SESSION_TTL_SECS").map(Duration::from_secs),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Applies `dashboard [port]` command line arguments.
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(port) = args.get(1).and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        self
    }

    /// Ports to try, in order.
    pub fn candidate_ports(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.port_attempts).filter_map(|offset| self.port.checked_add(offset))
    }

    /// Binds the first free candidate port.
    pub fn bind(&self) -> std::io::Result<TcpListener> {
        for port in self.candidate_ports() {
            let addr = SocketAddr::new(self.host, port);
            match TcpListener::bind(addr) {
                Ok(listener) => return Ok(listener),
                Err(e) => warn!("port {} unavailable ({}), trying next", port, e),
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!(
                "no free port in {}..{} on {}",
                self.port,
                self.port.saturating_add(self.port_attempts),
                self.host
            ),
        ))
    }
}
