use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PlaybackError;

/// Voice connection control, one call per server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError>;

    /// Moves an existing call to another channel of the same server.
    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError>;

    /// Returns whether there was a call to leave.
    async fn disconnect(&self, guild_id: GuildId) -> Result<bool, PlaybackError>;

    async fn is_connected(&self, guild_id: GuildId) -> bool;
}

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }

    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("🔇 Could not join channel {} in guild {}: {:?}", channel_id, guild_id, e);
                PlaybackError::TransportUnavailable(format!("could not join <#{}>", channel_id))
            })
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError> {
        self.join(guild_id, channel_id).await?;
        info!("🔊 Joined channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError> {
        // Joining again with a live call re-targets it without dropping playback
        self.join(guild_id, channel_id).await?;
        info!("🔀 Moved to channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        if self.manager.get(guild_id).is_none() {
            return Ok(false);
        }

        self.manager.remove(guild_id).await.map_err(|e| {
            PlaybackError::TransportUnavailable(format!("could not leave the voice channel: {}", e))
        })?;
        info!("👋 Left voice in guild {}", guild_id);
        Ok(true)
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        match self.manager.get(guild_id) {
            Some(call) => call.lock().await.current_channel().is_some(),
            None => false,
        }
    }
}
