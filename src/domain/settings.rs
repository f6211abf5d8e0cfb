//! Persisted bridge configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::bluetooth::protocol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "minutely", "hourly", "daily", "never"
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
            ansi_colors: default_true(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "tracker_bridge".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Bridge tunables. Every timing constant the session machinery uses
/// lives here so field deployments can adjust them without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_exercise_name")]
    pub exercise_device_name: String,
    #[serde(default = "default_exercise_notify_char")]
    pub exercise_notify_char: Uuid,
    #[serde(default = "default_glucose_name")]
    pub glucose_device_name: String,
    #[serde(default = "default_glucose_read_char")]
    pub glucose_read_char: Uuid,

    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_upload_interval")]
    pub upload_interval_secs: u64,
    // Masks a radio-stack artifact; see protocol::DEFAULT_DISCONNECT_DEBOUNCE_MS.
    #[serde(default = "default_debounce")]
    pub disconnect_debounce_ms: u64,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exercise_device_name: default_exercise_name(),
            exercise_notify_char: default_exercise_notify_char(),
            glucose_device_name: default_glucose_name(),
            glucose_read_char: default_glucose_read_char(),
            scan_timeout_secs: default_scan_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            upload_interval_secs: default_upload_interval(),
            disconnect_debounce_ms: default_debounce(),
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(self.upload_interval_secs)
    }

    pub fn disconnect_debounce(&self) -> Duration {
        Duration::from_millis(self.disconnect_debounce_ms)
    }
}

fn default_exercise_name() -> String {
    protocol::EXERCISE_PERIPHERAL_NAME.to_string()
}
fn default_exercise_notify_char() -> Uuid {
    protocol::EXERCISE_NOTIFY_CHAR_UUID
}
fn default_glucose_name() -> String {
    protocol::GLUCOSE_PERIPHERAL_NAME.to_string()
}
fn default_glucose_read_char() -> Uuid {
    protocol::GLUCOSE_READ_CHAR_UUID
}
fn default_scan_timeout() -> u64 {
    protocol::DEFAULT_SCAN_TIMEOUT_SECS
}
fn default_connect_timeout() -> u64 {
    protocol::DEFAULT_CONNECT_TIMEOUT_SECS
}
fn default_upload_interval() -> u64 {
    protocol::DEFAULT_UPLOAD_INTERVAL_SECS
}
fn default_debounce() -> u64 {
    protocol::DEFAULT_DISCONNECT_DEBOUNCE_MS
}

/// Loads and persists [`Settings`] as JSON under the user config dir.
pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::default_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Open a settings file at an explicit path, falling back to defaults
    /// if it is missing or unreadable.
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn default_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        path.push("TrackerBridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
