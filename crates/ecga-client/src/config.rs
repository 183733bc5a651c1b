use anyhow::{Context, Result};
use dirs_next::config_dir;
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "ECGA_CONFIG";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Client settings read from TOML. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// Processing-phase timer period.
    pub tick_interval_ms: u64,
    /// Delay between reaching 100% and hiding the progress display.
    pub grace_ms: u64,
    pub connect_timeout_s: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            tick_interval_ms: 200,
            grace_ms: 500,
            connect_timeout_s: 10,
        }
    }
}

impl ClientConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s)
    }

    /// Resolve the config file: explicit path, then `$ECGA_CONFIG`, then
    /// `<config_dir>/ecga/config.toml` if present, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return read_config(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV) {
            return read_config(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.exists() => read_config(&path),
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("ecga").join("config.toml"))
}

pub fn read_config(path: &Path) -> Result<ClientConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ClientConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    debug!("loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "server_url = \"http://10.0.0.2:9000\"\ngrace_ms = 0\n").unwrap();
        let config = ClientConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.server_url, "http://10.0.0.2:9000");
        assert_eq!(config.grace(), Duration::ZERO);
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ClientConfig::resolve(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tick_interval_ms = \"fast\"").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn zero_tick_is_clamped() {
        let config = ClientConfig {
            tick_interval_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }
}
