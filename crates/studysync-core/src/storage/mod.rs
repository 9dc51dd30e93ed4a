mod config;
pub mod database;

pub use config::{
    Config, FocusConfig, GeminiConfig, InterventionConfig, MindMirrorConfig, SessionConfig,
};
pub use database::{Database, FocusSessionRecord, QuizResultRecord, StudyStats};

use std::path::PathBuf;

use crate::error::{ConfigError, CoreError, RemoteError};

/// Environment variable that overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "STUDYSYNC_DATA_DIR";
/// Environment variable checked before the keyring for the Gemini key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const API_KEY_ENTRY: &str = "gemini_api_key";

/// Returns `~/.config/studysync[-dev]/` based on STUDYSYNC_ENV.
///
/// Set STUDYSYNC_ENV=dev to use development data directory, or
/// STUDYSYNC_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("STUDYSYNC_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studysync-dev")
            } else {
                base_dir.join("studysync")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Where the active API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Environment,
    Keyring,
}

/// Find the Gemini API key: environment first, then the OS keyring.
pub fn api_key() -> Result<(String, ApiKeySource), CoreError> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok((key, ApiKeySource::Environment));
        }
    }
    match keyring_store::get(API_KEY_ENTRY)? {
        Some(key) if !key.trim().is_empty() => Ok((key, ApiKeySource::Keyring)),
        _ => Err(RemoteError::MissingApiKey.into()),
    }
}

pub fn store_api_key(key: &str) -> Result<(), ConfigError> {
    keyring_store::set(API_KEY_ENTRY, key.trim())
}

pub fn clear_api_key() -> Result<(), ConfigError> {
    keyring_store::delete(API_KEY_ENTRY)
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::ConfigError;

    const SERVICE: &str = "studysync";

    pub fn get(key: &str) -> Result<Option<String>, ConfigError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), ConfigError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), ConfigError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
