use anyhow::Context;
use mysensors_core::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_FILE: &str = ".mysensors-state";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub serial: SerialConfig,
    pub state_file: PathBuf,
    pub http: HttpConfig,
    pub mqtt: MqttConfig,
    /// Seconds between status dumps on stdout; 0 disables them.
    pub status_interval_secs: u64,
    pub protocol: NetworkConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            http: HttpConfig::default(),
            mqtt: MqttConfig::default(),
            status_interval_secs: 30,
            protocol: NetworkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    /// Replay frames from a capture file instead of opening `port`.
    pub replay: Option<PathBuf>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115200,
            replay: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: ":9001".to_string(),
        }
    }
}

impl HttpConfig {
    /// `:9001` style addresses bind on all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic prefix for messages received from the radio network.
    pub publish_prefix: String,
    /// Topic prefix for commands to forward to the radio network.
    pub subscribe_prefix: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            publish_prefix: "mysensors-out".to_string(),
            subscribe_prefix: "mysensors-in".to_string(),
            keep_alive_secs: 30,
        }
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: GatewayConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing yaml: {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysensors_core::{AckPolicy, UnitSystem};

    #[test]
    fn test_defaults_match_classic_flags() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.http.listen, ":9001");
        assert_eq!(cfg.http.bind_addr(), "0.0.0.0:9001");
        assert_eq!(cfg.serial.baud, 115200);
        assert_eq!(cfg.serial.port, "/dev/ttyUSB0");
        assert_eq!(cfg.state_file, PathBuf::from(".mysensors-state"));
        assert_eq!(cfg.status_interval_secs, 30);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        fs::write(
            &path,
            "serial:\n  port: /dev/ttyACM0\nmqtt:\n  enabled: false\nprotocol:\n  ack: echo\n  unit_system: imperial\n",
        )
        .unwrap();
        let cfg = GatewayConfig::load(&path).unwrap();
        assert_eq!(cfg.serial.port, "/dev/ttyACM0");
        assert_eq!(cfg.serial.baud, 115200);
        assert!(!cfg.mqtt.enabled);
        assert_eq!(cfg.mqtt.publish_prefix, "mysensors-out");
        assert_eq!(cfg.protocol.ack, AckPolicy::Echo);
        assert_eq!(cfg.protocol.unit_system, UnitSystem::Imperial);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GatewayConfig::load(dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_explicit_host_is_kept() {
        let http = HttpConfig {
            listen: "127.0.0.1:8080".into(),
        };
        assert_eq!(http.bind_addr(), "127.0.0.1:8080");
    }
}
