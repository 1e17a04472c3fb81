use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::{
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Songbird,
};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, warn};

use crate::error::PlaybackError;

/// Transport-level state of a track as reported by its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// Resolved but never started (every queued track).
    Pending,
    Playing,
    Paused,
    Finished,
    /// The transport gave up on the stream before it ended.
    Failed,
}

impl TrackStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TrackStatus::Playing | TrackStatus::Paused)
    }
}

/// Display data for a resolved track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub source_url: String,
    pub duration: Option<Duration>,
}

impl TrackMetadata {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            title: None,
            uploader: None,
            source_url: source_url.into(),
            duration: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Title, or the source URL when the extractor gave none.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.source_url)
    }

    /// Only real web links are worth rendering as clickable.
    pub fn link(&self) -> Option<&str> {
        let url = self.source_url.as_str();
        (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
    }
}

/// Transport control for one track's audio stream.
#[async_trait]
pub trait PlaybackStream: Send + Sync {
    /// Begins playback. A stream can only be started once.
    async fn start(&mut self) -> Result<(), PlaybackError>;
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    fn stop(&self);
    async fn status(&self) -> TrackStatus;
}

/// One resolved, playable unit. Owns its stream exclusively.
pub struct Track {
    metadata: TrackMetadata,
    stream: Box<dyn PlaybackStream>,
}

impl Track {
    pub fn new(metadata: TrackMetadata, stream: Box<dyn PlaybackStream>) -> Self {
        Self { metadata, stream }
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn title(&self) -> &str {
        self.metadata.display_title()
    }

    pub async fn start(&mut self) -> Result<(), PlaybackError> {
        self.stream.start().await
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.stream.pause()
    }

    pub fn resume(&self) -> Result<(), PlaybackError> {
        self.stream.resume()
    }

    pub fn stop(&self) {
        self.stream.stop()
    }

    pub async fn status(&self) -> TrackStatus {
        self.stream.status().await
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Songbird-backed stream. The input stays lazy until `start`, and the voice
/// call is looked up at that moment so a queued track follows the bot across
/// channel moves.
pub struct SongbirdStream {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    volume: f32,
    input: Mutex<Option<Input>>,
    handle: Option<TrackHandle>,
}

impl SongbirdStream {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>, input: Input, volume: f32) -> Self {
        Self {
            guild_id,
            manager,
            volume,
            input: Mutex::new(Some(input)),
            handle: None,
        }
    }

    fn handle(&self) -> Result<&TrackHandle, PlaybackError> {
        self.handle.as_ref().ok_or(PlaybackError::NothingPlaying)
    }
}

#[async_trait]
impl PlaybackStream for SongbirdStream {
    async fn start(&mut self) -> Result<(), PlaybackError> {
        let input = self
            .input
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PlaybackError::AlreadyPlaying)?;

        let call = self.manager.get(self.guild_id).ok_or_else(|| {
            PlaybackError::TransportUnavailable("the bot is not connected to voice".into())
        })?;

        let handle = call.lock().await.play_input(input);
        if let Err(e) = handle.set_volume(self.volume) {
            warn!("🔊 Could not apply volume in guild {}: {:?}", self.guild_id, e);
        }

        debug!("▶️ Stream started in guild {}", self.guild_id);
        self.handle = Some(handle);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.handle()?
            .pause()
            .map_err(|_| PlaybackError::NothingPlaying)
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.handle()?
            .play()
            .map_err(|_| PlaybackError::NothingPlaying)
    }

    fn stop(&self) {
        if let Some(handle) = &self.handle {
            let _ = handle.stop();
        }
    }

    async fn status(&self) -> TrackStatus {
        let Some(handle) = &self.handle else {
            return TrackStatus::Pending;
        };

        match handle.get_info().await {
            Ok(state) => match state.playing {
                PlayMode::Play => TrackStatus::Playing,
                PlayMode::Pause => TrackStatus::Paused,
                PlayMode::Errored(e) => {
                    warn!("💥 Stream failed in guild {}: {:?}", self.guild_id, e);
                    TrackStatus::Failed
                }
                _ => TrackStatus::Finished,
            },
            // The driver drops finished tracks, so a dead handle means done.
            Err(_) => TrackStatus::Finished,
        }
    }
}
