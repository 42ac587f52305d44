//! Connection settings.
//!
//! `LinkConfig` is a plain record of scalar values. The library never reads
//! files or the environment; callers fill it from whatever source they use,
//! typically by deserializing a partial JSON object over the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 10102;

/// Default connect handshake timeout in milliseconds (1000 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000_000;

/// Default sleep between receive polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of bytes requested per socket read.
pub const DEFAULT_READ_SIZE: usize = 4096;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must not be 0")]
    ZeroPort,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Settings for opening and polling a [`Connection`](crate::link::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    /// Bounds only the connect handshake.
    pub connect_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub read_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl LinkConfig {
    /// Config for `host:port` with every other value defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check that every value is usable.
    ///
    /// A zero connect timeout is rejected by the OS, and a zero poll
    /// interval would turn `receive_or_wait` into a spin loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue("connect_timeout_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroValue("poll_interval_ms"));
        }
        if self.read_size == 0 {
            return Err(ConfigError::ZeroValue("read_size"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 10102);
        assert_eq!(config.connect_timeout(), Duration::from_secs(1000));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.read_size, 4096);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"host": "mud.example.org", "poll_interval_ms": 50}"#)
                .expect("Failed to parse config");

        assert_eq!(
            config,
            LinkConfig {
                host: "mud.example.org".to_string(),
                poll_interval_ms: 50,
                ..LinkConfig::default()
            }
        );
    }

    #[test]
    fn test_new_overrides_host_and_port() {
        let config = LinkConfig::new("127.0.0.1", 4000);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.read_size, DEFAULT_READ_SIZE);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let base = LinkConfig::default();

        let cases = [
            (LinkConfig { host: "  ".into(), ..base.clone() }, ConfigError::EmptyHost),
            (LinkConfig { port: 0, ..base.clone() }, ConfigError::ZeroPort),
            (
                LinkConfig { connect_timeout_ms: 0, ..base.clone() },
                ConfigError::ZeroValue("connect_timeout_ms"),
            ),
            (
                LinkConfig { poll_interval_ms: 0, ..base.clone() },
                ConfigError::ZeroValue("poll_interval_ms"),
            ),
            (LinkConfig { read_size: 0, ..base.clone() }, ConfigError::ZeroValue("read_size")),
        ];

        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(ConfigError::ZeroPort.to_string(), "port must not be 0");
        assert_eq!(
            ConfigError::ZeroValue("read_size").to_string(),
            "read_size must be greater than zero"
        );
    }
}
