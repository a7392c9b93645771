//! Configuration for connecting to a camera car

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection configuration for one car
///
/// A car exposes two servers: a WebSocket signaling server (offer/answer
/// exchange) and an HTTP command server (drive actions). Both default to the
/// ports the stock car firmware listens on; fully-qualified URL overrides
/// are available for deployments behind a proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverConfig {
    /// Car hostname or IP address
    pub host: String,

    /// Port of the car's WebSocket signaling server (default: 3001)
    pub signaling_port: u16,

    /// Port of the car's HTTP drive command server (default: 8000)
    pub command_port: u16,

    /// Fully-qualified signaling URL override (ws:// or wss://)
    pub signaling_url: Option<String>,

    /// Fully-qualified command base URL override (http:// or https://)
    pub command_base: Option<String>,

    /// STUN server URLs. Empty by default: the car is normally on the same
    /// LAN as the viewer and host candidates are sufficient.
    pub stun_servers: Vec<String>,

    /// Control channel connect timeout in milliseconds (default: 10000)
    pub connect_timeout_ms: u64,

    /// ICE candidate gathering timeout in milliseconds (default: 10000)
    pub ice_gathering_timeout_ms: u64,

    /// Timeout waiting for the remote answer in milliseconds (default: 20000)
    pub answer_timeout_ms: u64,

    /// Per-request drive command timeout in milliseconds (default: 5000)
    pub command_timeout_ms: u64,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            signaling_port: 3001,
            command_port: 8000,
            signaling_url: None,
            command_base: None,
            stun_servers: Vec::new(),
            connect_timeout_ms: 10_000,
            ice_gathering_timeout_ms: 10_000,
            answer_timeout_ms: 20_000,
            command_timeout_ms: 5_000,
        }
    }
}

impl RoverConfig {
    /// Configuration for a car at `host` on the stock firmware ports
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `host` is empty
    /// - `signaling_port` or `command_port` is 0
    /// - a URL override has the wrong scheme
    /// - a STUN entry does not start with `stun:`
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.host.is_empty() {
            return Err(Error::InvalidConfig("host cannot be empty".to_string()));
        }

        if self.signaling_port == 0 || self.command_port == 0 {
            return Err(Error::InvalidConfig(
                "signaling_port and command_port must be non-zero".to_string(),
            ));
        }

        if let Some(url) = &self.signaling_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(Error::InvalidConfig(format!(
                    "signaling_url must start with ws:// or wss://, got {}",
                    url
                )));
            }
        }

        if let Some(base) = &self.command_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(Error::InvalidConfig(format!(
                    "command_base must start with http:// or https://, got {}",
                    base
                )));
            }
        }

        for server in &self.stun_servers {
            if !server.starts_with("stun:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN server URL must start with stun:, got {}",
                    server
                )));
            }
        }

        Ok(())
    }

    /// URL of the car's signaling endpoint
    pub fn signaling_url(&self) -> String {
        self.signaling_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}:{}", self.host, self.signaling_port))
    }

    /// Base URL of the car's drive command endpoint
    pub fn command_base(&self) -> String {
        self.command_base
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.command_port))
    }

    /// Control channel connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// ICE gathering timeout
    pub fn ice_gathering_timeout(&self) -> Duration {
        Duration::from_millis(self.ice_gathering_timeout_ms)
    }

    /// Remote answer timeout
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.answer_timeout_ms)
    }

    /// Drive command timeout
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RoverConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_host_derives_urls() {
        let config = RoverConfig::for_host("192.168.4.1");
        assert_eq!(config.signaling_url(), "ws://192.168.4.1:3001");
        assert_eq!(config.command_base(), "http://192.168.4.1:8000");
    }

    #[test]
    fn test_url_overrides_win() {
        let config = RoverConfig {
            signaling_url: Some("wss://car.example.com/signal".to_string()),
            command_base: Some("https://car.example.com/drive".to_string()),
            ..RoverConfig::for_host("192.168.4.1")
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.signaling_url(), "wss://car.example.com/signal");
        assert_eq!(config.command_base(), "https://car.example.com/drive");
    }

    #[test]
    fn test_empty_host_fails() {
        let config = RoverConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_fails() {
        let config = RoverConfig {
            signaling_port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_override_scheme_fails() {
        let config = RoverConfig {
            signaling_url: Some("http://not-a-websocket".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RoverConfig {
            command_base: Some("ftp://car".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stun_entry_fails() {
        let config = RoverConfig {
            stun_servers: vec!["turn:relay.example.com".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = RoverConfig::for_host("10.0.0.2");
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RoverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.host, deserialized.host);
        assert_eq!(config.signaling_port, deserialized.signaling_port);
    }
}
