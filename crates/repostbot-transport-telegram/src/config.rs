//! Telegram transport settings.

use config::ConfigError;
use repostbot_core::config::RepostSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Repost engine settings shared across transport handlers.
    pub repost: Arc<RepostSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(repost: RepostSettings, telegram: TelegramSettings) -> Self {
        Self {
            repost: Arc::new(repost),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        repostbot_core::config::build_config()?.try_deserialize()
    }
}

/// Initial delay before retrying a failed Telegram API call.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the delay between retries.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries after the first attempt.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Time-to-live (seconds) of cached group administrator lists.
pub const ADMIN_CACHE_TTL_SECS: u64 = 60;
/// Maximum number of chats with cached administrator lists.
pub const ADMIN_CACHE_MAX_SIZE: u64 = 10_000;

/// Get admin cache TTL from env or default.
///
/// Environment variable: `ADMIN_CACHE_TTL_SECS`.
#[must_use]
pub fn get_admin_cache_ttl() -> u64 {
    std::env::var("ADMIN_CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(ADMIN_CACHE_TTL_SECS)
}

/// Get admin cache max size from env or default.
///
/// Environment variable: `ADMIN_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_admin_cache_max_size() -> u64 {
    std::env::var("ADMIN_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(ADMIN_CACHE_MAX_SIZE)
}
