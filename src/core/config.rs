use crate::core::models::DataPath;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

/// Configuration stored in `config.toml` under the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            controller: ControllerConfig::default(),
            version: default_version(),
        }
    }
}

/// Where people come from and how quickly they trickle in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// JSON roster; relative paths resolve against the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_file: Option<PathBuf>,
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            people_file: None,
            record_delay_ms: default_record_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Capacity of the broadcast channel observers subscribe to
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_record_delay_ms() -> u64 {
    500
}
fn default_event_capacity() -> usize {
    64
}

pub struct ConfigService;

impl ConfigService {
    /// Load configuration, falling back to defaults when no file exists yet
    pub fn load_config(data_path: &DataPath) -> io::Result<AppConfig> {
        let config_path = data_path.config_path();
        if !config_path.exists() {
            log::debug!(
                "No configuration at {}, using defaults",
                config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid config format: {e}"),
            )
        })?;

        if config.controller.event_capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "controller.event_capacity must be greater than zero",
            ));
        }

        Ok(config)
    }

    pub fn save_config(config: &AppConfig, data_path: &DataPath) -> io::Result<()> {
        let config_path = data_path.config_path();
        let toml_content = toml::to_string_pretty(config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize config: {e}"),
            )
        })?;

        std::fs::create_dir_all(&data_path.root)?;
        std::fs::write(&config_path, toml_content)?;
        log::info!("Saved configuration to {}", config_path.display());
        Ok(())
    }

    pub fn get_value(config: &AppConfig, key: &str) -> Option<String> {
        match key {
            "reader.people_file" => Some(
                config
                    .reader
                    .people_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            "reader.record_delay_ms" => Some(config.reader.record_delay_ms.to_string()),
            "controller.event_capacity" => Some(config.controller.event_capacity.to_string()),
            _ => None,
        }
    }

    /// Apply `value` to `key`; an empty people file resets to the built-in roster
    pub fn set_value(config: &mut AppConfig, key: &str, value: &str) -> io::Result<()> {
        match key {
            "reader.people_file" => {
                let value = value.trim();
                config.reader.people_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "reader.record_delay_ms" => {
                config.reader.record_delay_ms = parse_number(key, value)?;
            }
            "controller.event_capacity" => {
                let capacity: usize = parse_number(key, value)?;
                if capacity == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "controller.event_capacity must be greater than zero",
                    ));
                }
                config.controller.event_capacity = capacity;
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unknown key: {key}"),
                ));
            }
        }
        Ok(())
    }

    pub fn known_keys() -> &'static [&'static str] {
        &[
            "reader.people_file",
            "reader.record_delay_ms",
            "controller.event_capacity",
        ]
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> io::Result<T> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{key} expects a non-negative integer, got '{value}'"),
        )
    })
}
