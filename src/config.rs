use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers commands on one guild only, for development
    pub bot_name: Option<String>,

    // Audio
    pub default_volume: f32,
    pub max_playlist_size: usize,

    // Background loops
    pub scheduler_tick_ms: u64,
    pub ingest_tick_ms: u64,

    // Display
    pub queue_page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, validating the result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            discord_token: value("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            guild_id: parse_optional("GUILD_ID", value("GUILD_ID"))?,
            bot_name: value("BOT_NAME"),

            default_volume: parse_or("DEFAULT_VOLUME", value("DEFAULT_VOLUME"), defaults.default_volume)?,
            max_playlist_size: parse_or(
                "MAX_PLAYLIST_SIZE",
                value("MAX_PLAYLIST_SIZE"),
                defaults.max_playlist_size,
            )?,

            scheduler_tick_ms: parse_or(
                "SCHEDULER_TICK_MS",
                value("SCHEDULER_TICK_MS"),
                defaults.scheduler_tick_ms,
            )?,
            ingest_tick_ms: parse_or("INGEST_TICK_MS", value("INGEST_TICK_MS"), defaults.ingest_tick_ms)?,

            queue_page_size: parse_or(
                "QUEUE_PAGE_SIZE",
                value("QUEUE_PAGE_SIZE"),
                defaults.queue_page_size,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Playlist size, page size and tick intervals must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_volume) {
            return Err(invalid(
                "DEFAULT_VOLUME",
                self.default_volume,
                "must be between 0.0 and 2.0",
            ));
        }

        let positive = [
            ("MAX_PLAYLIST_SIZE", self.max_playlist_size as u64),
            ("SCHEDULER_TICK_MS", self.scheduler_tick_ms),
            ("INGEST_TICK_MS", self.ingest_tick_ms),
            ("QUEUE_PAGE_SIZE", self.queue_page_size as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(invalid(key, value, "must be greater than 0"));
            }
        }

        Ok(())
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms)
    }

    pub fn ingest_tick(&self) -> Duration {
        Duration::from_millis(self.ingest_tick_ms)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: {} commands{}\n  \
            Audio: {}% vol, {} max playlist entries\n  \
            Loops: scheduler {}ms, ingestion {}ms\n  \
            Queue: {} per page",
            self.guild_id.map_or("global".to_string(), |id| format!("guild {}", id)),
            self.bot_name
                .as_deref()
                .map_or(String::new(), |name| format!(" as {}", name)),
            (self.default_volume * 100.0) as u32,
            self.max_playlist_size,
            self.scheduler_tick_ms,
            self.ingest_tick_ms,
            self.queue_page_size,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,
            bot_name: None,

            default_volume: 0.5,
            max_playlist_size: 100,

            scheduler_tick_ms: 1000,
            ingest_tick_ms: 1000,

            queue_page_size: 5,
        }
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_optional<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.map(|raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string()))
    })
    .transpose()
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    Ok(parse_optional(key, raw)?.unwrap_or(default))
}
