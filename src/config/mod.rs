use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::metering_p1::frame::DEFAULT_MAX_TELEGRAM_SIZE;
use crate::metering_p1::value_parser::P1Timezone;

const CONFIG_PATHS: [&str; 2] = ["config/p1meter.yaml", "p1meter.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file found at config/p1meter.yaml or p1meter.yaml")]
    NotFound,
    #[error("Unable to read config file {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid timezone offset {0}")]
    InvalidTimezone(String),
}

fn parser_timezone_default() -> String { return "+01:00".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ParserConfig {
    /// UTC offset during standard time; DST timestamps add one hour
    #[serde(default="parser_timezone_default")]
    pub timezone: String,
    /// Forces the DSMR version instead of reading it from the telegram
    #[serde(default)]
    pub dsmr_version_override: Option<String>,
}

impl ParserConfig {
    pub fn timezone(&self) -> Result<P1Timezone, ConfigError> {
        P1Timezone::parse(&self.timezone).ok_or_else(|| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

fn device_path_default() -> String { return "/dev/ttyUSB0".to_string() }
fn device_read_buffer_size_default() -> usize { return 1024 }
fn device_max_telegram_size_default() -> usize { return DEFAULT_MAX_TELEGRAM_SIZE }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DeviceConfig {
    /// Character device or file to read, `-` for standard input
    #[serde(default="device_path_default")]
    pub path: String,
    #[serde(default="device_read_buffer_size_default")]
    pub read_buffer_size: usize,
    #[serde(default="device_max_telegram_size_default")]
    pub max_telegram_size: usize,
}

fn parser_default() -> ParserConfig {
    return ParserConfig { timezone: parser_timezone_default(), dsmr_version_override: None }
}
fn device_default() -> DeviceConfig {
    return DeviceConfig {
        path: device_path_default(),
        read_buffer_size: device_read_buffer_size_default(),
        max_telegram_size: device_max_telegram_size_default(),
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default="parser_default")]
    pub parser: ParserConfig,
    #[serde(default="device_default")]
    pub device: DeviceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config { parser: parser_default(), device: device_default() }
    }
}

impl Config {
    /// Looks for config/p1meter.yaml first, then p1meter.yaml
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::load_from(path);
            }
            debug!("No config at {}", path);
        }
        Err(ConfigError::NotFound)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        let config = Self::from_yaml(&contents)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates the configuration
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yml::from_str(contents)?;
        config.parser.timezone()?;
        Ok(config)
    }
}
