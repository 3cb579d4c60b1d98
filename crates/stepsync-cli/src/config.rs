//! Configuration file management.
//!
//! Settings live in a TOML file (by default `<config dir>/stepsync/config.toml`).
//! Every section and field is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepsync_core::dispatcher::{DEFAULT_LOCAL_PATH, DEFAULT_REMOTE_SOURCE, DEFAULT_REMOTE_TEMP};
use stepsync_core::{AdbBridge, DispatcherConfig, bridge};
use stepsync_store::OffsetSource;
use time::UtcOffset;
use time::macros::format_description;

/// Accepted bridge timeout range in seconds.
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=600;

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub device: DeviceConfig,
    pub data: DataConfig,
}

/// How the bridge executable is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Executable name or path.
    pub program: String,
    /// Per-invocation time limit in seconds.
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: bridge::DEFAULT_PROGRAM.to_string(),
            timeout_secs: bridge::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Paths on the phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Step database, readable only as root.
    pub source_path: String,
    /// Staging copy that the bridge can pull.
    pub temp_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_REMOTE_SOURCE.to_string(),
            temp_path: DEFAULT_REMOTE_TEMP.to_string(),
        }
    }
}

/// Local data handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Where pulled databases are written and loaded from.
    pub local_path: PathBuf,
    /// Fixed offset such as `+08:00`. Unset means the local zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from(DEFAULT_LOCAL_PATH),
            utc_offset: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default path when `None`.
    ///
    /// A missing default file yields defaults; an explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_validated(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load_validated(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write a default configuration to `path`.
    ///
    /// An existing file is only replaced when `force` is set.
    pub fn init<P: AsRef<Path>>(path: P, force: bool) -> Result<(), ConfigError> {
        if path.as_ref().exists() && !force {
            return Err(ConfigError::Exists(path.as_ref().to_path_buf()));
        }
        Self::default().save(path)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use stepsync_cli::config::Config;
    ///
    /// Config::default().validate().expect("defaults are valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.bridge.validate());
        errors.extend(self.device.validate());
        errors.extend(self.data.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn adb_bridge(&self) -> AdbBridge {
        AdbBridge::new(
            self.bridge.program.clone(),
            Duration::from_secs(self.bridge.timeout_secs),
        )
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            remote_source: self.device.source_path.clone(),
            remote_temp: self.device.temp_path.clone(),
            local_path: self.data.local_path.clone(),
        }
    }

    /// Offset used to bucket samples.
    pub fn offset_source(&self) -> Result<OffsetSource, ConfigError> {
        match &self.data.utc_offset {
            None => Ok(OffsetSource::Local),
            Some(text) => parse_offset(text)
                .map(OffsetSource::Fixed)
                .ok_or_else(|| {
                    ConfigError::Validation(vec![ValidationError {
                        field: "data.utc_offset".to_string(),
                        message: format!("'{text}' is not an offset like +08:00"),
                    }])
                }),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.program.trim().is_empty() {
            errors.push(ValidationError {
                field: "bridge.program".to_string(),
                message: "program cannot be empty".to_string(),
            });
        }
        if !TIMEOUT_RANGE_SECS.contains(&self.timeout_secs) {
            errors.push(ValidationError {
                field: "bridge.timeout_secs".to_string(),
                message: format!(
                    "timeout must be between {} and {} seconds, got {}",
                    TIMEOUT_RANGE_SECS.start(),
                    TIMEOUT_RANGE_SECS.end(),
                    self.timeout_secs
                ),
            });
        }
        errors
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        [
            ("device.source_path", &self.source_path),
            ("device.temp_path", &self.temp_path),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let message = if value.trim().is_empty() {
                "path cannot be empty".to_string()
            } else if !value.starts_with('/') {
                format!("'{value}' must be an absolute path on the device")
            } else if value.contains(char::is_whitespace) {
                format!("'{value}' must not contain whitespace")
            } else {
                return None;
            };
            Some(ValidationError {
                field: field.to_string(),
                message,
            })
        })
        .collect()
    }
}

impl DataConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.local_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "data.local_path".to_string(),
                message: "path cannot be empty".to_string(),
            });
        }
        if let Some(text) = &self.utc_offset
            && parse_offset(text).is_none()
        {
            errors.push(ValidationError {
                field: "data.utc_offset".to_string(),
                message: format!("'{text}' is not an offset like +08:00"),
            });
        }
        errors
    }
}

/// Parse `+HH:MM` / `-HH:MM`, or `Z`/`UTC`.
pub fn parse_offset(text: &str) -> Option<UtcOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return Some(UtcOffset::UTC);
    }
    UtcOffset::parse(
        text,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .ok()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config file {} already exists (use --force to overwrite)", .0.display())]
    Exists(PathBuf),
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g. `bridge.timeout_secs`).
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stepsync")
        .join("config.toml")
}
