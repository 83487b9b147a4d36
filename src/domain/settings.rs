use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Which discovered peripheral to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First name match in scan order
    #[default]
    First,
    /// Name match with the highest RSSI
    StrongestSignal,
    /// Exact Bluetooth address, name is ignored
    Address(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Peripheral Settings
    #[serde(default = "default_device_name_filter")]
    pub device_name_filter: String,
    #[serde(default = "default_imu_char_uuid")]
    pub imu_char_uuid: String,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    // Output Settings
    #[serde(default = "default_false")]
    pub csv_output: bool,
    #[serde(default = "default_true")]
    pub print_data: bool,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name_filter: default_device_name_filter(),
            imu_char_uuid: default_imu_char_uuid(),
            match_policy: MatchPolicy::default(),
            scan_timeout_secs: default_scan_timeout_secs(),
            csv_output: default_false(),
            print_data: default_true(),
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
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
    "nano_imu_ble".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_device_name_filter() -> String {
    "Arduino Nano 33 BLE Sense".to_string()
}
fn default_imu_char_uuid() -> String {
    "13012F01-F8C3-4F4A-A8F4-15CD926DA146".to_string()
}
fn default_scan_timeout_secs() -> u64 {
    5
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
    load_error: Option<String>,
}

impl SettingsService {
    /// Load settings from the per-user config directory, writing defaults on
    /// first run.
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::from_path(settings_path)
    }

    /// Load settings from an explicit file. A missing file is created with
    /// defaults; an unreadable one falls back to defaults.
    pub fn from_path(settings_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let settings_path = settings_path.into();
        let exists = settings_path.exists();
        let mut load_error = None;
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                if exists {
                    load_error = Some(format!("{:#}", e));
                }
                Settings::default()
            }
        };

        let service = Self {
            settings,
            settings_path,
            load_error,
        };
        if !exists {
            service.save()?;
        }
        Ok(service)
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("NanoImuBle");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Why an existing settings file was ignored, if it was. Logging may not
    /// be set up while settings load, so callers report this afterwards.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }
}
