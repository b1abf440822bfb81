//! Agent configuration
//!
//! Compile-time defaults describe the stock rack unit: one door contact on
//! GPIO 5 wired against the internal pull-up plus the SoC temperature in
//! Celsius, sampled once per second. A TOML file can override any of it;
//! sections or fields left out keep their defaults.
//!
//! ```toml
//! [broker]
//! host = "mqtt.example.com"
//!
//! [device]
//! base_topic = "racks"
//! device_id = "07"
//!
//! [poll]
//! interval_ms = 200
//! change_policy = "rendered"
//!
//! [[channels]]
//! name = "door"
//! probe = { kind = "contact", pin = 5 }
//! ```
//!
//! Nothing is written back; every boot starts from the file and fresh caches.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, Level};

use crate::mqtt::{MqttConfig, Topic};
use crate::publisher::{ChangePolicy, Channel, Probe};
use crate::sensor::board::DEFAULT_THERMAL_PATH;
use crate::sensor::TemperatureUnit;

const CONFIG_DIR: &str = "rackwatch";
const CONFIG_FILE: &str = "agent.toml";

pub const DEFAULT_BASE_TOPIC: &str = "racks";
pub const DEFAULT_DEVICE_ID: &str = "01";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_INTERFACE: &str = "wlan0";
pub const DEFAULT_DOOR_PIN: u8 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub broker: MqttConfig,
    pub device: DeviceConfig,
    pub poll: PollConfig,
    pub network: NetworkConfig,
    pub sensors: SensorConfig,
    pub logging: LoggingConfig,
    pub channels: Vec<ChannelConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            broker: MqttConfig::default(),
            device: DeviceConfig::default(),
            poll: PollConfig::default(),
            network: NetworkConfig::default(),
            sensors: SensorConfig::default(),
            logging: LoggingConfig::default(),
            channels: default_channels(),
        }
    }
}

/// Identity of this unit in the topic tree
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub base_topic: String,
    pub device_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    /// Sleep between two poll iterations
    pub interval_ms: u64,
    pub change_policy: ChangePolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            change_policy: ChangePolicy::default(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Refuse to start unless `interface` is up. An empty interface disables
    /// the check.
    pub check_link: bool,
    pub interface: String,
}

impl NetworkConfig {
    /// Interface to verify at startup, if any.
    pub fn link_interface(&self) -> Option<&str> {
        let interface = self.interface.trim();
        (self.check_link && !interface.is_empty()).then_some(interface)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            check_link: true,
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub thermal_path: PathBuf,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            thermal_path: PathBuf::from(DEFAULT_THERMAL_PATH),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

/// Initial cache value of a channel
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentinel {
    /// `false` for contacts, -1.0 for scalars
    #[default]
    Fixed,
    /// Empty cache, the first reading is always published
    Unset,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeConfig {
    Contact {
        pin: u8,
        #[serde(default = "default_active_low")]
        active_low: bool,
    },
    Temperature {
        #[serde(default)]
        unit: TemperatureUnit,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Channel name, also the topic suffix
    pub name: String,
    /// Publish on `<base>/<device>` instead of `<base>/<device>/<name>`
    #[serde(default)]
    pub unsuffixed: bool,
    #[serde(default)]
    pub sentinel: Sentinel,
    pub probe: ProbeConfig,
}

fn default_active_low() -> bool {
    true
}

fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            name: "door".to_string(),
            unsuffixed: false,
            sentinel: Sentinel::Fixed,
            probe: ProbeConfig::Contact {
                pin: DEFAULT_DOOR_PIN,
                active_low: true,
            },
        },
        ChannelConfig {
            name: "temperature".to_string(),
            unsuffixed: false,
            sentinel: Sentinel::Fixed,
            probe: ProbeConfig::Temperature {
                unit: TemperatureUnit::Celsius,
            },
        },
    ]
}

impl AgentConfig {
    /// Location of the config file under the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads `path` if given, else the default location if it exists, else
    /// the built-in defaults. The result is always validated.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = Self::default_path();
                let exists = match &candidate {
                    Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
                    None => false,
                };
                match candidate {
                    Some(path) if exists => path,
                    _ => {
                        info!("No config file found, using built-in defaults");
                        let config = Self::default();
                        config.validate()?;
                        return Ok(config);
                    }
                }
            }
        };

        info!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::Read {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        debug!("Parsed config: {:?}", config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.broker.host.trim().is_empty() {
            return invalid("broker host is empty".to_string());
        }
        if self.broker.port == 0 {
            return invalid("broker port must not be 0".to_string());
        }
        if self.broker.client_id.is_empty() {
            return invalid("client id is empty".to_string());
        }
        if self.broker.keep_alive_secs < 5 {
            return invalid(format!(
                "keep-alive of {}s is below the 5s minimum",
                self.broker.keep_alive_secs
            ));
        }
        if self.poll.interval_ms == 0 {
            return invalid("poll interval must be at least 1 ms".to_string());
        }
        for (label, segment) in [
            ("base topic", &self.device.base_topic),
            ("device id", &self.device.device_id),
        ] {
            if segment.trim_matches('/').is_empty() {
                return invalid(format!("{} is empty", label));
            }
            if segment.contains(['+', '#']) {
                return invalid(format!("{} '{}' contains a wildcard", label, segment));
            }
        }
        self.logging.max_level()?;

        if self.channels.is_empty() {
            return invalid("no channels configured".to_string());
        }
        let mut names = HashSet::new();
        let mut pins = HashSet::new();
        let mut unsuffixed = 0;
        for channel in &self.channels {
            if channel.name.is_empty() || channel.name.contains(['/', '+', '#']) {
                return invalid(format!("invalid channel name '{}'", channel.name));
            }
            if !names.insert(channel.name.as_str()) {
                return invalid(format!("duplicate channel '{}'", channel.name));
            }
            if let ProbeConfig::Contact { pin, .. } = channel.probe {
                if !pins.insert(pin) {
                    return invalid(format!(
                        "channel '{}' reuses GPIO {} of another contact",
                        channel.name, pin
                    ));
                }
            }
            if channel.unsuffixed {
                unsuffixed += 1;
            }
        }
        if unsuffixed > 1 {
            return invalid("only one channel may publish without a topic suffix".to_string());
        }

        Ok(())
    }

    /// Builds the channels with their topics fixed for the process lifetime.
    pub fn build_channels(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .map(|channel| {
                let probe = match channel.probe {
                    ProbeConfig::Contact { pin, .. } => Probe::Contact { pin },
                    ProbeConfig::Temperature { unit } => Probe::Temperature { unit },
                };
                let suffix = (!channel.unsuffixed).then_some(channel.name.as_str());
                let topic = Topic::new(&self.device.base_topic, &self.device.device_id, suffix);
                let last_value = match channel.sentinel {
                    Sentinel::Fixed => Some(probe.sentinel()),
                    Sentinel::Unset => None,
                };
                Channel::new(channel.name.clone(), probe, topic, last_value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Reading;
    use std::io::Write;

    #[test]
    fn defaults_match_the_stock_unit() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.client_id, "pico-client");
        assert_eq!(config.broker.keep_alive_secs, 60);
        assert_eq!(config.poll.interval(), Duration::from_millis(1000));
        assert_eq!(config.poll.change_policy, ChangePolicy::Exact);

        let channels = config.build_channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].topic().as_str(), "racks/01/door");
        assert_eq!(channels[0].last_value(), Some(Reading::Contact(false)));
        assert_eq!(channels[1].topic().as_str(), "racks/01/temperature");
        assert_eq!(channels[1].last_value(), Some(Reading::Scalar(-1.0)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            [broker]
            host = "mqtt.example.com"

            [poll]
            interval_ms = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.host, "mqtt.example.com");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.poll.interval_ms, 200);
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn door_only_profile_with_unsuffixed_topic() {
        let config = AgentConfig::from_toml_str(
            r#"
            [device]
            base_topic = "pico"
            device_id = "button"

            [poll]
            interval_ms = 200
            change_policy = "rendered"

            [[channels]]
            name = "door"
            unsuffixed = true
            sentinel = "unset"
            probe = { kind = "contact", pin = 5 }
            "#,
        )
        .unwrap();

        assert_eq!(config.poll.change_policy, ChangePolicy::Rendered);
        assert_eq!(
            config.channels[0].probe,
            ProbeConfig::Contact {
                pin: 5,
                active_low: true
            }
        );

        let channels = config.build_channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].topic().as_str(), "pico/button");
        assert_eq!(channels[0].last_value(), None);
    }

    #[test]
    fn fahrenheit_unit_parses() {
        let config = AgentConfig::from_toml_str(
            r#"
            [[channels]]
            name = "temperature"
            probe = { kind = "temperature", unit = "F" }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.channels[0].probe,
            ProbeConfig::Temperature {
                unit: TemperatureUnit::Fahrenheit
            }
        );
    }

    #[test]
    fn rejects_invalid_settings() {
        let cases = [
            "[broker]\nhost = \"\"",
            "[broker]\nport = 0",
            "[broker]\nkeep_alive_secs = 2",
            "[poll]\ninterval_ms = 0",
            "[device]\nbase_topic = \"racks/#\"",
            "[logging]\nlevel = \"loud\"",
            "channels = []",
            r#"
            [[channels]]
            name = "door"
            probe = { kind = "contact", pin = 5 }
            [[channels]]
            name = "door"
            probe = { kind = "contact", pin = 6 }
            "#,
            r#"
            [[channels]]
            name = "front"
            probe = { kind = "contact", pin = 5 }
            [[channels]]
            name = "rear"
            probe = { kind = "contact", pin = 5 }
            "#,
            r#"
            [[channels]]
            name = "a"
            unsuffixed = true
            probe = { kind = "contact", pin = 5 }
            [[channels]]
            name = "b"
            unsuffixed = true
            probe = { kind = "contact", pin = 6 }
            "#,
        ];

        for case in cases {
            assert!(
                matches!(AgentConfig::from_toml_str(case), Err(ConfigError::Invalid(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn empty_interface_skips_link_check() {
        let config = AgentConfig::from_toml_str("[network]\ninterface = \"\"").unwrap();
        assert_eq!(config.network.link_interface(), None);

        let config = AgentConfig::from_toml_str("[network]\ncheck_link = false").unwrap();
        assert_eq!(config.network.link_interface(), None);

        assert_eq!(AgentConfig::default().network.link_interface(), Some("wlan0"));
    }

    #[test]
    fn duplicate_contact_pin_names_the_channel() {
        let result = AgentConfig::from_toml_str(
            r#"
            [[channels]]
            name = "front"
            probe = { kind = "contact", pin = 5 }
            [[channels]]
            name = "rear"
            probe = { kind = "contact", pin = 5 }
            "#,
        );

        match result {
            Err(ConfigError::Invalid(msg)) => {
                assert!(msg.contains("rear"), "{}", msg);
                assert!(msg.contains("GPIO 5"), "{}", msg);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            AgentConfig::from_toml_str("[broker\nhost ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\ndevice_id = \"42\"").unwrap();

        let config = AgentConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.device.device_id, "42");
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let result = AgentConfig::load(Some(Path::new("/nonexistent/rackwatch.toml"))).await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
