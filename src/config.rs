//! # Client Configuration
//!
//! Settings are read from a TOML file into an explicit `Config` value that
//! is handed to the client. Only `[server]` is required:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 12345
//!
//! [client]            # optional local bind address
//! ip = "127.0.0.1"
//! port = 23457
//!
//! [session]
//! connection = "reopen"   # or "reuse"
//! connect_timeout_secs = 10
//! io_timeout_secs = 30
//!
//! [limits]
//! max_block_len = 1048576
//! max_response_len = 268435456
//!
//! [storage]
//! salt_file = "user_salts.txt"
//! output_dir = "."
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::FrameLimits;

pub const DEFAULT_CONFIG_PATH: &str = "blockfetch.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerAddress,
    #[serde(default)]
    pub client: LocalAddress,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub limits: FrameLimits,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalAddress {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
}

/// Whether registration and retrieval share one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPolicy {
    /// A fresh connection for every request.
    #[default]
    Reopen,
    /// Keep the connection open and send the next request over it.
    Reuse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub connection: ConnectionPolicy,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionPolicy::Reopen,
            connect_timeout_secs: 10,
            io_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub salt_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            salt_file: PathBuf::from("user_salts.txt"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// A configuration with defaults for everything but the server address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            server: ServerAddress { host: host.into(), port },
            client: LocalAddress::default(),
            session: SessionConfig::default(),
            limits: FrameLimits::default(),
            storage: StorageConfig::default(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server host is empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port must be non-zero".into()));
        }
        if self.session.connect_timeout_secs == 0 || self.session.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        if self.limits.max_block_len == 0 || self.limits.max_response_len == 0 {
            return Err(ConfigError::Invalid("frame limits must be non-zero".into()));
        }
        Ok(())
    }

    /// Local address to bind before connecting, if any part of it is set.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match (self.client.ip, self.client.port) {
            (None, None) => None,
            (ip, port) => Some(SocketAddr::new(
                ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                port.unwrap_or(0),
            )),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.session.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.session.io_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(toml_text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("inline"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[server]\nhost = \"localhost\"\nport = 12345\n").unwrap();

        assert_eq!(config, Config::new("localhost", 12345));
        assert_eq!(config.session.connection, ConnectionPolicy::Reopen);
        assert_eq!(config.local_addr(), None);
        assert_eq!(config.io_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [server]
            host = "10.0.0.2"
            port = 5000

            [client]
            ip = "127.0.0.1"
            port = 23457

            [session]
            connection = "reuse"
            io_timeout_secs = 5

            [limits]
            max_block_len = 4096

            [storage]
            salt_file = "/tmp/salts.txt"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.connection, ConnectionPolicy::Reuse);
        assert_eq!(config.session.connect_timeout_secs, 10);
        assert_eq!(config.local_addr(), Some("127.0.0.1:23457".parse().unwrap()));
        assert_eq!(config.limits.max_block_len, 4096);
        assert_eq!(config.limits.max_response_len, FrameLimits::default().max_response_len);
        assert_eq!(config.storage.salt_file, PathBuf::from("/tmp/salts.txt"));
        assert_eq!(config.storage.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_missing_server_section_fails() {
        assert!(matches!(parse("[client]\nport = 1\n"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_bad_ip_fails_to_parse() {
        let text = "[server]\nhost = \"h\"\nport = 1\n[client]\nip = \"999.1.1.1\"\n";
        assert!(matches!(parse(text), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_port_is_invalid() {
        let text = "[server]\nhost = \"h\"\nport = 0\n";
        assert!(matches!(parse(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        let text = "[server]\nhost = \"h\"\nport = 9\n[limits]\nmax_block_len = 0\n";
        assert!(matches!(parse(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_port_only_binds_unspecified() {
        let mut config = Config::new("h", 9);
        config.client.port = Some(4000);
        assert_eq!(config.local_addr(), Some("0.0.0.0:4000".parse().unwrap()));
    }

    #[test]
    fn test_load_from_file() {
        let name = format!("blockfetch_config_{}.toml", std::process::id());
        let path = std::env::temp_dir().join(name);
        fs::write(&path, "[server]\nhost = \"example.org\"\nport = 8080\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.host, "example.org");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/blockfetch.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
