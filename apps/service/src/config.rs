use std::collections::HashSet;
use std::{env, fmt, fs, io, path};

use monitoring::MonitorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse {}: {source}", path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("Duplicate monitor name: {0}")]
    DuplicateName(String),
    #[error("No monitor named {0}")]
    UnknownMonitor(String),
}

/// Monitors run by the service
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitors: Vec<MonitorEntry>,
}

/// One `[[monitors]]` table: a name plus the monitor definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEntry {
    pub name: String,

    /// Disabled monitors only run when selected by name
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[serde(flatten)]
    pub monitor: MonitorConfig,
}

fn enabled_by_default() -> bool {
    true
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/monitors.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/monitors.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configured Monitors ({}):", self.monitors.len())?;
        for entry in &self.monitors {
            let monitor = &entry.monitor;
            let target = monitor.url.clone().or_else(|| monitor.host()).unwrap_or_else(|| "-".into());
            write!(f, "  {} [{}] {}", entry.name, monitor.monitor_type, target)?;
            if let Some(port) = monitor.port {
                write!(f, " port {port}")?;
            }
            if !entry.enabled {
                write!(f, " (disabled)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Config {
    /// Load monitors from file
    ///
    /// Creates an empty config in ~/.config/uppe/monitors.toml
    ///  or the specified path if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(&raw_string)
                .map_err(|source| ConfigError::ParseFailed { path: config_path, source })?;
            config.check_names()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Monitors to run: every enabled one, or exactly those named in `only`
    pub fn select(&self, only: &[String]) -> Result<Vec<MonitorEntry>, ConfigError> {
        if only.is_empty() {
            return Ok(self.monitors.iter().filter(|entry| entry.enabled).cloned().collect());
        }

        only.iter()
            .map(|name| {
                self.monitors
                    .iter()
                    .find(|entry| &entry.name == name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownMonitor(name.clone()))
            })
            .collect()
    }

    fn check_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.monitors {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }
        }
        Ok(())
    }
}
