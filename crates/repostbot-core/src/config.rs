//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and validates
//! them once at startup.

use crate::callout::CalloutStrategy;
use crate::strings::BotStrings;
use crate::toggles::ToggleSet;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Underlying configuration source failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Perceptual hash size of zero
    #[error("hash_size must be greater than zero")]
    ZeroHashSize,
    /// Callout style name not recognized
    #[error("Unknown callout style: {0}")]
    UnknownCalloutStyle(String),
    /// A value required by the selected storage backend is missing
    #[error("{0} is required for the r2 storage backend")]
    MissingR2Setting(&'static str),
    /// Strings file could not be read
    #[error("Cannot read strings file {path}: {source}")]
    StringsIo {
        /// File path
        path: String,
        /// Read failure
        source: std::io::Error,
    },
    /// Strings file is not valid YAML
    #[error("Cannot parse strings file {path}: {source}")]
    StringsYaml {
        /// File path
        path: String,
        /// Parse failure
        source: serde_yaml::Error,
    },
    /// A string needed by the selected callout style is empty
    #[error("String `{name}` is required by the {style} callout style")]
    MissingString {
        /// String key
        name: &'static str,
        /// Callout style name
        style: &'static str,
    },
}

/// Where group records are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per group on local disk
    #[default]
    File,
    /// Process memory only
    Memory,
    /// Cloudflare R2 / S3 bucket
    R2,
}

/// Repost engine settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepostSettings {
    /// Side length of the perceptual hash grid
    #[serde(default = "default_hash_size")]
    pub hash_size: u32,
    /// Group record backend
    #[serde(default)]
    pub storage_backend: StorageBackend,
    /// Directory for the file backend
    #[serde(default = "default_repost_data_path")]
    pub repost_data_path: String,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,

    /// Telegram id of the bot administrator
    pub bot_admin_id: Option<i64>,
    /// Minimum seconds between two runs of the same command by one actor
    #[serde(default = "default_flood_protection_seconds")]
    pub flood_protection_seconds: u64,
    /// Callout style name (`verbose` or `summary`)
    #[serde(default = "default_callout_style")]
    pub callout_style: String,
    /// Toggle values for groups that never set them
    #[serde(default)]
    pub default_toggles: ToggleSet,
    /// YAML file overriding built-in message strings
    pub strings_path: Option<String>,
    /// Seconds a reset prompt waits for an answer
    #[serde(default = "default_reset_timeout")]
    pub reset_confirmation_timeout_secs: u64,
}

const fn default_hash_size() -> u32 {
    16
}

fn default_repost_data_path() -> String {
    "groups".to_string()
}

const fn default_flood_protection_seconds() -> u64 {
    10
}

fn default_callout_style() -> String {
    "summary".to_string()
}

const fn default_reset_timeout() -> u64 {
    60
}

impl Default for RepostSettings {
    fn default() -> Self {
        Self {
            hash_size: default_hash_size(),
            storage_backend: StorageBackend::default(),
            repost_data_path: default_repost_data_path(),
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint_url: None,
            r2_bucket_name: None,
            bot_admin_id: None,
            flood_protection_seconds: default_flood_protection_seconds(),
            callout_style: default_callout_style(),
            default_toggles: ToggleSet::default(),
            strings_path: None,
            reset_confirmation_timeout_secs: default_reset_timeout(),
        }
    }
}

/// Builds the layered configuration shared by every settings struct.
///
/// # Errors
///
/// Returns a `ConfigError` if a source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        // Start off by merging in the "default" configuration file
        .add_source(File::with_name("config/default").required(false))
        // Add in the current environment file
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Add in a local configuration file
        // This file shouldn't be checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__HASH_SIZE=8 ./target/app` would set the `hash_size` key
        .add_source(Environment::with_prefix("APP").separator("__"))
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

fn env_fallback(slot: &mut Option<String>, var: &str) {
    if slot.is_none() {
        if let Ok(val) = std::env::var(var) {
            if !val.is_empty() {
                *slot = Some(val);
            }
        }
    }
}

impl RepostSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if loading fails or a value is invalid.
    pub fn new() -> Result<Self, SettingsError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Fallback: check R2 variables directly if config didn't map them
        env_fallback(&mut settings.r2_endpoint_url, "R2_ENDPOINT_URL");
        env_fallback(&mut settings.r2_access_key_id, "R2_ACCESS_KEY_ID");
        env_fallback(&mut settings.r2_secret_access_key, "R2_SECRET_ACCESS_KEY");
        env_fallback(&mut settings.r2_bucket_name, "R2_BUCKET_NAME");

        settings.validate()?;
        Ok(settings)
    }

    /// Checks values that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.hash_size == 0 {
            return Err(SettingsError::ZeroHashSize);
        }
        self.callout_strategy()?;
        if self.storage_backend == StorageBackend::R2 {
            let required = [
                (&self.r2_endpoint_url, "R2_ENDPOINT_URL"),
                (&self.r2_access_key_id, "R2_ACCESS_KEY_ID"),
                (&self.r2_secret_access_key, "R2_SECRET_ACCESS_KEY"),
                (&self.r2_bucket_name, "R2_BUCKET_NAME"),
            ];
            if let Some((_, name)) = required.iter().find(|(value, _)| value.is_none()) {
                return Err(SettingsError::MissingR2Setting(name));
            }
        }
        Ok(())
    }

    /// Callout strategy named by `callout_style`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::UnknownCalloutStyle` for unrecognized names.
    pub fn callout_strategy(&self) -> Result<CalloutStrategy, SettingsError> {
        CalloutStrategy::from_name(&self.callout_style)
    }

    /// Loads message strings and checks the ones the callout style needs.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if the strings file is unusable or a required
    /// string is empty.
    pub fn load_strings(&self) -> Result<BotStrings, SettingsError> {
        let strings = BotStrings::load(self.strings_path.as_deref())?;
        strings.validate_for(self.callout_strategy()?)?;
        Ok(strings)
    }

    /// Flood protection window.
    #[must_use]
    pub const fn flood_window(&self) -> Duration {
        Duration::from_secs(self.flood_protection_seconds)
    }

    /// How long a reset prompt stays open.
    #[must_use]
    pub const fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_confirmation_timeout_secs)
    }
}
