use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    ingest::PlaylistIngestionLoop,
    playlist::PlaylistExpansionJob,
    queue::{Enqueued, QueueSnapshot},
    registry::Registry,
    scheduler::PlaybackScheduler,
    track::{TrackMetadata, TrackStatus},
    transport::VoiceTransport,
};
use crate::{
    error::PlaybackError,
    notify::NotificationSink,
    sources::{is_playlist_source, MediaResolver},
};

/// What `play` did with a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Track(Enqueued),
    /// The playlist is expanding in the background; `position` is its place
    /// among this server's pending playlists.
    Playlist { source: String, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReport {
    pub skipped: TrackMetadata,
    pub up_next: Option<TrackMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Connected,
    Moved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub stopped: Option<TrackMetadata>,
    pub cleared: usize,
    pub abandoned_playlists: usize,
    pub disconnected: bool,
}

/// Entry point for every playback command. Owns the per-server registry and
/// the seams to the resolver, the voice transport and the chat.
pub struct Jukebox {
    registry: Arc<Registry>,
    resolver: Arc<dyn MediaResolver>,
    transport: Arc<dyn VoiceTransport>,
    notifier: Arc<dyn NotificationSink>,
}

impl Jukebox {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        transport: Arc<dyn VoiceTransport>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            resolver,
            transport,
            notifier,
        }
    }

    /// Starts the scheduler and the playlist ingestion loop. Both stop when
    /// `token` is cancelled.
    pub fn spawn_background(
        &self,
        token: CancellationToken,
        scheduler_tick: Duration,
        ingest_tick: Duration,
    ) -> Vec<JoinHandle<()>> {
        let scheduler =
            PlaybackScheduler::new(self.registry.clone(), self.notifier.clone(), scheduler_tick);
        let ingestion = PlaylistIngestionLoop::new(
            self.registry.clone(),
            self.resolver.clone(),
            self.notifier.clone(),
            ingest_tick,
        );

        vec![
            tokio::spawn(scheduler.run(token.clone())),
            tokio::spawn(ingestion.run(token)),
        ]
    }

    /// Plays or queues `source`. Playlists are expanded in the background and
    /// queued later by the ingestion loop. `channel` receives announcements.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        source: &str,
    ) -> Result<PlayOutcome, PlaybackError> {
        if is_playlist_source(source) {
            return Ok(self.submit_playlist(guild_id, channel, source).await);
        }

        let track = match self.resolver.resolve_one(guild_id, source).await {
            Ok(track) => track,
            Err(e) => {
                warn!("🔎 Could not resolve {} in guild {}: {}", e.query(), guild_id, e);
                return Err(e.into());
            }
        };
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.set_announce_channel(channel);
        Ok(PlayOutcome::Track(state.enqueue(track).await?))
    }

    pub async fn submit_playlist(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        source: &str,
    ) -> PlayOutcome {
        let job =
            PlaylistExpansionJob::spawn(self.resolver.clone(), guild_id, channel, source.to_string());
        let slot = self.registry.slot(guild_id);
        let mut pending = slot.pending.lock().await;
        pending.push_back(job);
        PlayOutcome::Playlist {
            source: source.to_string(),
            position: pending.len(),
        }
    }

    /// Stops the current track; the scheduler promotes the next one.
    pub async fn skip(&self, guild_id: GuildId) -> Result<SkipReport, PlaybackError> {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        let skipped = state.stop().ok_or(PlaybackError::NothingPlaying)?;
        Ok(SkipReport {
            skipped,
            up_next: state.up_next().cloned(),
        })
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<TrackMetadata, PlaybackError> {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.stop().ok_or(PlaybackError::NothingPlaying)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<TrackMetadata, PlaybackError> {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<TrackMetadata, PlaybackError> {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.resume().await
    }

    /// Removes the track at 1-based `position`, or the last one.
    pub async fn remove(
        &self,
        guild_id: GuildId,
        position: Option<usize>,
    ) -> Result<TrackMetadata, PlaybackError> {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.remove(position).map(|track| track.metadata().clone())
    }

    pub async fn clear(&self, guild_id: GuildId) -> usize {
        let slot = self.registry.slot(guild_id);
        let mut state = slot.playback.lock().await;
        state.clear()
    }

    /// Drops pending playlists, stops playback, empties the queue and leaves
    /// voice. Afterwards the server behaves like one never seen before.
    pub async fn reset(&self, guild_id: GuildId) -> ResetReport {
        let slot = self.registry.slot(guild_id);
        let (summary, abandoned) = {
            let mut pending = slot.pending.lock().await;
            let mut state = slot.playback.lock().await;
            slot.bump_epoch();
            let abandoned = pending.len();
            pending.clear();
            (state.reset(), abandoned)
        };

        let disconnected = match self.transport.disconnect(guild_id).await {
            Ok(disconnected) => disconnected,
            Err(e) => {
                warn!("🔇 Reset could not disconnect guild {}: {}", guild_id, e);
                false
            }
        };

        info!(
            "🔄 Guild {} reset ({} queued dropped, {} playlists abandoned)",
            guild_id, summary.cleared, abandoned
        );
        ResetReport {
            stopped: summary.stopped,
            cleared: summary.cleared,
            abandoned_playlists: abandoned,
            disconnected,
        }
    }

    /// Connects to `channel`, or moves there when already connected elsewhere.
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<JoinOutcome, PlaybackError> {
        if self.transport.is_connected(guild_id).await {
            self.transport.move_to(guild_id, channel).await?;
            Ok(JoinOutcome::Moved)
        } else {
            self.transport.connect(guild_id, channel).await?;
            Ok(JoinOutcome::Connected)
        }
    }

    /// Leaves voice and resets the server. `None` when there was no
    /// connection to leave.
    pub async fn leave(&self, guild_id: GuildId) -> Option<ResetReport> {
        if !self.transport.is_connected(guild_id).await {
            return None;
        }
        Some(self.reset(guild_id).await)
    }

    pub async fn is_connected(&self, guild_id: GuildId) -> bool {
        self.transport.is_connected(guild_id).await
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<(TrackMetadata, TrackStatus)> {
        let slot = self.registry.get(guild_id)?;
        let state = slot.playback.lock().await;
        let metadata = state.current()?.clone();
        let status = state.current_status().await?;
        Some((metadata, status))
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        match self.registry.get(guild_id) {
            Some(slot) => slot.playback.lock().await.snapshot(),
            None => QueueSnapshot::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}
