use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Locations searched when no configuration file is given explicitly.
pub const CONFIG_PATHS: [&str; 2] = ["config.toml", "/etc/solarman2mqtt/config.toml"];

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_sun_margin")]
    pub sun_margin_minutes: u32,

    pub account: Account,
    pub devices: Devices,
    pub mqtt: MqttConfig,
}

#[derive(Deserialize)]
pub struct Account {
    /// API host, e.g. `globalapi.solarmanpv.com`. A scheme may be given.
    pub url: String,
    pub app_id: String,
    pub app_secret: String,
    pub username: String,
    /// Hex encoded SHA-256 of the account password.
    pub passhash: String,
}

#[derive(Debug, Deserialize)]
pub struct Devices {
    pub station_id: Option<u64>,
    pub inverter_sn: Option<String>,
    pub logger_sn: Option<String>,
    #[serde(default = "enabled")]
    pub fetch_station: bool,
    #[serde(default = "enabled")]
    pub fetch_inverter: bool,
    #[serde(default = "enabled")]
    pub fetch_logger: bool,
}

#[derive(Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

fn default_sun_margin() -> u32 {
    30
}

fn enabled() -> bool {
    true
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_qos() -> u8 {
    1
}

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|err| match err {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(msg) => ConfigError::Invalid(msg),
        })
    }

    /// Returns the first readable path of [`CONFIG_PATHS`].
    pub fn locate() -> Result<PathBuf, ConfigError> {
        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
            .ok_or_else(|| {
                ConfigError::NotFound(CONFIG_PATHS.iter().map(ToString::to_string).collect())
            })
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let mut config: Config = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        config.mqtt.topic = config.mqtt.topic.trim_end_matches('/').to_string();
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let devices = &self.devices;
        if devices.fetch_station && devices.station_id.is_none() {
            return Err("devices.station_id is required when fetch_station is enabled".into());
        }
        if devices.fetch_inverter && devices.inverter_sn.is_none() {
            return Err("devices.inverter_sn is required when fetch_inverter is enabled".into());
        }
        if devices.fetch_logger && devices.logger_sn.is_none() {
            return Err("devices.logger_sn is required when fetch_logger is enabled".into());
        }
        if self.mqtt.qos > 2 {
            return Err(format!("mqtt.qos must be 0, 1 or 2, got {}", self.mqtt.qos));
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            return Err("mqtt.username and mqtt.password must be given together".into());
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(format!(
                "coordinates out of range: {}, {}",
                self.latitude, self.longitude
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    /// Latitude and longitude both at exactly 0.0 switch the daylight gate off.
    pub fn has_location(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).map_err(|err| match err {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            },
            ParseFailure::Invalid(msg) => ConfigError::Invalid(msg),
        })
    }
}

impl Account {
    /// Identifies the account a cached credential belongs to.
    pub fn key(&self) -> String {
        format!("{}:{}", self.app_id, self.username)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("url", &self.url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("username", &self.username)
            .field("passhash", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("broker", &self.broker)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .field("retain", &self.retain)
            .finish()
    }
}
