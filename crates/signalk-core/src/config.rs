//! Configuration storage.
//!
//! Settings and plugin configuration are kept as JSON files under a single
//! configuration directory, laid out the way the Node.js SignalK server
//! does it:
//!
//! ```text
//! <config_dir>/settings.json
//! <config_dir>/plugin-config-data/<plugin_id>.json
//! ```
//!
//! Plugins may keep their own cache files in the same directory.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SIGNALK_NODE_CONFIG_DIR";

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration was not found.
    #[error("Configuration not found: {0}")]
    NotFound(String),
    /// Failed to read configuration.
    #[error("Read error: {0}")]
    ReadError(String),
    /// Failed to write configuration.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Configuration data is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Abstract configuration storage.
pub trait ConfigStorage: Send + Sync {
    /// Directory plugins may use for their own files.
    fn config_path(&self) -> &Path;

    /// Load server settings.
    fn load_settings(&self) -> Result<ServerSettings, ConfigError>;

    /// Save server settings.
    fn save_settings(&self, settings: &ServerSettings) -> Result<(), ConfigError>;

    /// Load configuration for a specific plugin.
    fn load_plugin_config(&self, plugin_id: &str) -> Result<PluginConfig, ConfigError>;

    /// Save configuration for a specific plugin.
    fn save_plugin_config(&self, plugin_id: &str, config: &PluginConfig)
        -> Result<(), ConfigError>;
}

/// How plugin calculations are triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Recompute when input paths change.
    #[default]
    Reactive,
    /// Recompute on a fixed timer from current values.
    Polled,
}

/// Server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// HTTP port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Self vessel URN ("urn:mrn:signalk:uuid:...").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_urn: Option<String>,

    /// Calculation trigger strategy.
    #[serde(default)]
    pub trigger: TriggerMode,

    /// Timer period for the polled trigger, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    /// Publish a simulated position feed.
    #[serde(default)]
    pub demo: bool,
}

impl ServerSettings {
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }

    /// Configured polling period; zero falls back to the default.
    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(Self::DEFAULT_POLL_INTERVAL_SECS)
    }

    /// Fill in a self URN if none is configured. Returns true when one was generated.
    pub fn ensure_self_urn(&mut self) -> bool {
        if self.self_urn.is_some() {
            return false;
        }
        self.self_urn = Some(format!("urn:mrn:signalk:uuid:{}", uuid::Uuid::new_v4()));
        true
    }
}

/// Saved plugin configuration, as written by the SignalK admin UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// File-based configuration storage.
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    root: PathBuf,
}

impl FileConfigStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage rooted at `$SIGNALK_NODE_CONFIG_DIR`, falling back to `~/.signalk`.
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Self::new(dir);
        }
        let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
        Self::new(PathBuf::from(home).join(".signalk"))
    }

    fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    fn plugin_file(&self, plugin_id: &str) -> PathBuf {
        self.root
            .join("plugin-config-data")
            .join(format!("{plugin_id}.json"))
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(ConfigError::ReadError(e.to_string())),
        };
        serde_json::from_str(&text).map_err(|e| ConfigError::InvalidData(e.to_string()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::write(path, text).map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl ConfigStorage for FileConfigStorage {
    fn config_path(&self) -> &Path {
        &self.root
    }

    fn load_settings(&self) -> Result<ServerSettings, ConfigError> {
        match self.read_json(&self.settings_file()) {
            Err(ConfigError::NotFound(_)) => Ok(ServerSettings::default()),
            other => other,
        }
    }

    fn save_settings(&self, settings: &ServerSettings) -> Result<(), ConfigError> {
        self.write_json(&self.settings_file(), settings)
    }

    fn load_plugin_config(&self, plugin_id: &str) -> Result<PluginConfig, ConfigError> {
        self.read_json(&self.plugin_file(plugin_id))
    }

    fn save_plugin_config(
        &self,
        plugin_id: &str,
        config: &PluginConfig,
    ) -> Result<(), ConfigError> {
        self.write_json(&self.plugin_file(plugin_id), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_settings_are_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileConfigStorage::new(dir.path());

        let settings = storage.load_settings().unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.port(), 3000);
        assert_eq!(settings.trigger, TriggerMode::Reactive);
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileConfigStorage::new(dir.path());

        let mut settings = ServerSettings {
            port: Some(3100),
            trigger: TriggerMode::Polled,
            poll_interval_secs: Some(300),
            ..Default::default()
        };
        assert!(settings.ensure_self_urn());
        assert!(!settings.ensure_self_urn());

        storage.save_settings(&settings).unwrap();
        let loaded = storage.load_settings().unwrap();

        assert_eq!(loaded, settings);
        assert!(loaded
            .self_urn
            .unwrap()
            .starts_with("urn:mrn:signalk:uuid:"));
    }

    #[test]
    fn test_settings_file_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"port": 3001, "trigger": "polled", "pollIntervalSecs": 15}"#,
        )
        .unwrap();

        let settings = FileConfigStorage::new(dir.path()).load_settings().unwrap();
        assert_eq!(settings.port(), 3001);
        assert_eq!(settings.trigger, TriggerMode::Polled);
        assert_eq!(settings.poll_interval_secs(), 15);
    }

    #[test]
    fn test_zero_poll_interval_uses_default() {
        let settings: ServerSettings =
            serde_json::from_str(r#"{"trigger": "polled", "pollIntervalSecs": 0}"#).unwrap();
        assert_eq!(
            settings.poll_interval_secs(),
            ServerSettings::DEFAULT_POLL_INTERVAL_SECS
        );
    }

    #[test]
    fn test_plugin_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileConfigStorage::new(dir.path());

        assert!(matches!(
            storage.load_plugin_config("tides-api"),
            Err(ConfigError::NotFound(_))
        ));

        let config = PluginConfig {
            enabled: true,
            configuration: serde_json::json!({
                "default_ttl": 30,
                "tides": {"noaa": true}
            }),
        };
        storage.save_plugin_config("tides-api", &config).unwrap();

        assert!(dir
            .path()
            .join("plugin-config-data")
            .join("tides-api.json")
            .exists());
        assert_eq!(storage.load_plugin_config("tides-api").unwrap(), config);
    }

    #[test]
    fn test_invalid_plugin_config() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileConfigStorage::new(dir.path());
        fs::create_dir_all(dir.path().join("plugin-config-data")).unwrap();
        fs::write(
            dir.path().join("plugin-config-data").join("tides-api.json"),
            "{not json",
        )
        .unwrap();

        assert!(matches!(
            storage.load_plugin_config("tides-api"),
            Err(ConfigError::InvalidData(_))
        ));
    }
}
