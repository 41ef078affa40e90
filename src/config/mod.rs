//! # Configuration Management Module
//!
//! All runtime configuration for the relay lives in a single TOML file,
//! organized into logical sections:
//!
//! - [`StationConfig`] - station identity (callsign, name)
//! - [`MeshtasticConfig`] - device communication settings
//! - [`AlertsConfig`] - NWS alert feed polling
//! - [`BeaconConfig`] - station identification beacon schedule
//! - [`StorageConfig`] - message journal location
//! - [`LoggingConfig`] - process logging
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshrelay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Station: {}", config.station.callsign);
//!     Ok(())
//! }
//! ```
//!
//! `meshrelay init` writes a default file via [`Config::create_default`].

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    pub meshtastic: MeshtasticConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub beacon: BeaconConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Station identity broadcast in idents and alert traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Short on-air identifier, e.g. "PTC1".
    pub callsign: String,
    /// Human-readable station name.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshtasticConfig {
    pub port: String,
    pub baud_rate: u32,
    pub channel: u8,
    /// Require the device to be reachable at startup. When true (the
    /// default) a failed connect is fatal; when false the relay starts
    /// without a device and every send fails as a recoverable error.
    #[serde(default = "default_require_device")]
    pub require_device_at_startup: bool,
    /// Maximum UTF-8 encoded payload size handed to the radio.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_require_device() -> bool {
    true
}

fn default_max_payload_bytes() -> usize {
    crate::message::MAX_TEXT_PAYLOAD_BYTES
}

/// NWS active-alert feed polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub enabled: bool,
    /// NWS public zone identifier, e.g. "ARC119" (Pulaski County, AR).
    pub zone: String,
    /// Base URL of the zone-scoped active-alert feed.
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    /// Seconds between polls.
    pub poll_interval_secs: u64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Alert descriptions are trimmed to this many characters before the
    /// payload clamp applies.
    pub description_limit: usize,
}

fn default_feed_base_url() -> String {
    "https://api.weather.gov/alerts/active/zone".to_string()
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zone: "ARC119".to_string(),
            feed_base_url: default_feed_base_url(),
            poll_interval_secs: 900,
            timeout_secs: 10,
            description_limit: 120,
        }
    }
}

impl AlertsConfig {
    /// Zone-scoped active-alert feed URL.
    pub fn feed_url(&self) -> String {
        format!("{}/{}", self.feed_base_url.trim_end_matches('/'), self.zone)
    }
}

/// Configuration for the periodic station identification beacon.
///
/// The beacon broadcasts on wall-clock boundaries. Supported frequencies:
/// "5min", "15min", "30min", "1hour", "2hours", "4hours" (default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub enabled: bool,
    pub frequency: String,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: "4hours".to_string(),
        }
    }
}

impl BeaconConfig {
    /// Convert frequency string to minutes.
    ///
    /// Returns one of: 5, 15, 30, 60, 120, 240. Invalid values default to 240.
    pub fn frequency_minutes(&self) -> u32 {
        match self.frequency.as_str() {
            "5min" => 5,
            "15min" => 15,
            "30min" => 30,
            "1hour" => 60,
            "2hours" => 120,
            "4hours" => 240,
            _ => {
                log::warn!(
                    "Invalid beacon frequency '{}', defaulting to 4hours",
                    self.frequency
                );
                240
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only message journal. Distinct from the process log.
    pub journal_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station: StationConfig {
                callsign: "PTC1".to_string(),
                name: "Mesh Emergency Relay".to_string(),
            },
            meshtastic: MeshtasticConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115200,
                channel: 0,
                require_device_at_startup: true,
                max_payload_bytes: crate::message::MAX_TEXT_PAYLOAD_BYTES,
            },
            alerts: AlertsConfig::default(),
            beacon: BeaconConfig::default(),
            storage: StorageConfig {
                journal_file: "meshrelay_journal.txt".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("meshrelay.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_contract() {
        let config = Config::default();
        assert_eq!(config.meshtastic.max_payload_bytes, 220);
        assert_eq!(config.alerts.poll_interval_secs, 900);
        assert_eq!(config.alerts.timeout_secs, 10);
        assert_eq!(config.alerts.description_limit, 120);
        assert!(config.meshtastic.require_device_at_startup);
        assert_eq!(config.beacon.frequency, "4hours");
    }

    #[test]
    fn feed_url_is_zone_scoped() {
        let alerts = AlertsConfig {
            zone: "ARC119".into(),
            ..Default::default()
        };
        assert_eq!(
            alerts.feed_url(),
            "https://api.weather.gov/alerts/active/zone/ARC119"
        );
    }

    #[test]
    fn beacon_frequency_minutes_valid() {
        let cases = vec![
            ("5min", 5),
            ("15min", 15),
            ("30min", 30),
            ("1hour", 60),
            ("2hours", 120),
            ("4hours", 240),
        ];
        for (frequency, expected) in cases {
            let config = BeaconConfig {
                enabled: true,
                frequency: frequency.to_string(),
            };
            assert_eq!(config.frequency_minutes(), expected, "{}", frequency);
        }
    }

    #[test]
    fn beacon_frequency_minutes_invalid_defaults() {
        for bad in ["", "90min", "daily", "4hr"] {
            let config = BeaconConfig {
                enabled: true,
                frequency: bad.to_string(),
            };
            assert_eq!(config.frequency_minutes(), 240);
        }
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.station.callsign, config.station.callsign);
        assert_eq!(parsed.alerts.zone, config.alerts.zone);
        assert_eq!(parsed.beacon.frequency, config.beacon.frequency);
        assert_eq!(
            parsed.meshtastic.max_payload_bytes,
            config.meshtastic.max_payload_bytes
        );
    }

    #[test]
    fn missing_optional_sections_take_defaults() {
        let minimal = r#"
[station]
callsign = "TEST1"
name = "Test Relay"

[meshtastic]
port = "/dev/ttyACM0"
baud_rate = 115200
channel = 0

[storage]
journal_file = "journal.txt"

[logging]
level = "debug"
"#;
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert!(parsed.alerts.enabled);
        assert_eq!(parsed.alerts.poll_interval_secs, 900);
        assert_eq!(parsed.beacon.frequency, "4hours");
        assert!(parsed.meshtastic.require_device_at_startup);
        assert_eq!(parsed.meshtastic.max_payload_bytes, 220);
        assert_eq!(parsed.logging.file, None);
    }
}
