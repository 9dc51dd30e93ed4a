//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Session length and tick rate
//! - Focus monitor banner and alert behaviour
//! - Mind mirror capture cadence
//! - Intervention cooldown and style
//! - Gemini endpoint and model names
//!
//! Configuration is stored at `~/.config/studysync/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::emotion::MAX_HISTORY_LEN;
use crate::error::ConfigError;
use crate::intervention::InterventionStyle;
use crate::remote::gemini::{
    GeminiSettings, DEFAULT_BASE_URL, DEFAULT_FAST_MODEL, DEFAULT_MEDIA_MODEL,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::session::SessionSettings;

/// Countdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Focus monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_banner_secs")]
    pub banner_secs: u64,
    #[serde(default = "default_true")]
    pub alert_enabled: bool,
    #[serde(default = "default_penalty_per_switch")]
    pub penalty_per_switch: u32,
}

/// Mind mirror (emotion sampling) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindMirrorConfig {
    #[serde(default = "default_capture_interval_secs")]
    pub capture_interval_secs: u64,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,
    /// Snapshot directory read by the directory camera.
    #[serde(default)]
    pub frames_dir: Option<String>,
}

/// Intervention gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default)]
    pub style: InterventionStyle,
}

/// Gemini endpoint configuration. The API key lives in the keyring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_media_model")]
    pub media_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studysync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub mind_mirror: MindMirrorConfig,
    #[serde(default)]
    pub intervention: InterventionConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

// Default functions
fn default_duration_minutes() -> u32 {
    25
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_banner_secs() -> u64 {
    crate::focus::DEFAULT_BANNER_SECS
}
fn default_true() -> bool {
    true
}
fn default_penalty_per_switch() -> u32 {
    crate::focus::DEFAULT_PENALTY_PER_SWITCH
}
fn default_capture_interval_secs() -> u64 {
    5
}
fn default_history_len() -> usize {
    crate::emotion::DEFAULT_HISTORY_LEN
}
fn default_capture_timeout_secs() -> u64 {
    10
}
fn default_cooldown_secs() -> u64 {
    crate::intervention::DEFAULT_COOLDOWN_SECS as u64
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_fast_model() -> String {
    DEFAULT_FAST_MODEL.into()
}
fn default_media_model() -> String {
    DEFAULT_MEDIA_MODEL.into()
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            banner_secs: default_banner_secs(),
            alert_enabled: true,
            penalty_per_switch: default_penalty_per_switch(),
        }
    }
}

impl Default for MindMirrorConfig {
    fn default() -> Self {
        Self {
            capture_interval_secs: default_capture_interval_secs(),
            history_len: default_history_len(),
            capture_timeout_secs: default_capture_timeout_secs(),
            frames_dir: None,
        }
    }
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            style: InterventionStyle::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fast_model: default_fast_model(),
            media_model: default_media_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                // Optional fields: an empty value clears them.
                serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, keeping the field's type. Does not
    /// persist; call [`Config::save`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.session_settings()?;
        *self = updated;
        Ok(())
    }

    /// All leaf keys with their current values, in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            base_url: self.gemini.base_url.clone(),
            fast_model: self.gemini.fast_model.clone(),
            media_model: self.gemini.media_model.clone(),
            request_timeout: Duration::from_secs(self.gemini.request_timeout_secs),
        }
    }

    /// Session parameters, rejecting values the session cannot run with.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if self.session.duration_minutes == 0 {
            return Err(invalid("session.duration_minutes", "must be at least 1".into()));
        }
        let history_len = self.mind_mirror.history_len;
        if !(1..=MAX_HISTORY_LEN).contains(&history_len) {
            return Err(invalid(
                "mind_mirror.history_len",
                format!("{history_len} is outside 1-{MAX_HISTORY_LEN}"),
            ));
        }
        let cooldown_secs = self.intervention.cooldown_secs;
        let cooldown = i64::try_from(cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                invalid(
                    "intervention.cooldown_secs",
                    format!("{cooldown_secs} seconds is out of range"),
                )
            })?;

        Ok(SessionSettings {
            duration_secs: u64::from(self.session.duration_minutes) * 60,
            tick_interval: Duration::from_millis(self.session.tick_interval_ms.max(1)),
            banner_duration: Duration::from_secs(self.focus.banner_secs),
            alert_enabled: self.focus.alert_enabled,
            penalty_per_switch: self.focus.penalty_per_switch,
            capture_interval: Duration::from_secs(self.mind_mirror.capture_interval_secs.max(1)),
            capture_timeout: Duration::from_secs(self.mind_mirror.capture_timeout_secs.max(1)),
            history_len,
            cooldown,
            style: self.intervention.style,
        })
    }
}
