use serenity::model::id::ChannelId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info, warn};

use super::track::{Track, TrackMetadata, TrackStatus};
use crate::error::PlaybackError;

/// Result of handing a track to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// The server was idle; the track became `current` and started.
    Playing(TrackMetadata),
    /// Appended behind `current`; `position` is 1-based.
    Queued {
        metadata: TrackMetadata,
        position: usize,
    },
}

/// What one scheduler tick did to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Nothing to do: idle with an empty queue, or `current` still running.
    Unchanged,
    /// `current` finished and the queue was empty.
    Drained { finished: TrackMetadata },
    /// `current` broke off mid-stream and was retired. The queue front is
    /// promoted on the next tick.
    StreamFailed { failed: TrackMetadata },
    /// The queue front became `current`.
    Promoted {
        finished: Option<TrackMetadata>,
        started: TrackMetadata,
    },
    /// The queue front could not start and was discarded.
    StartFailed {
        finished: Option<TrackMetadata>,
        failed: TrackMetadata,
        error: PlaybackError,
    },
}

/// Playback state of one server: the active track and the FIFO queue behind it.
///
/// Only `current` is ever started, so at most one track per server is
/// playing or paused.
#[derive(Debug, Default)]
pub struct ServerPlaybackState {
    current: Option<Track>,
    queue: VecDeque<Track>,
    announce_channel: Option<ChannelId>,
}

impl ServerPlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plays the track right away when idle, otherwise appends it.
    pub async fn enqueue(&mut self, mut track: Track) -> Result<Enqueued, PlaybackError> {
        if self.current.is_none() {
            track.start().await?;
            let metadata = track.metadata().clone();
            info!("🎵 Now playing: {}", metadata.display_title());
            self.current = Some(track);
            return Ok(Enqueued::Playing(metadata));
        }

        let metadata = track.metadata().clone();
        self.queue.push_back(track);
        info!("➕ Queued: {} (#{})", metadata.display_title(), self.queue.len());
        Ok(Enqueued::Queued {
            metadata,
            position: self.queue.len(),
        })
    }

    /// Signals `current` to stop. Promotion is left to the scheduler.
    pub fn stop(&mut self) -> Option<TrackMetadata> {
        let current = self.current.as_ref()?;
        current.stop();
        info!("⏹️ Stop requested for: {}", current.title());
        Some(current.metadata().clone())
    }

    pub async fn pause(&mut self) -> Result<TrackMetadata, PlaybackError> {
        let current = self.active_current().await?;
        match current.status().await {
            TrackStatus::Paused => Err(PlaybackError::AlreadyPaused),
            _ => {
                current.pause()?;
                info!("⏸️ Paused: {}", current.title());
                Ok(current.metadata().clone())
            }
        }
    }

    pub async fn resume(&mut self) -> Result<TrackMetadata, PlaybackError> {
        let current = self.active_current().await?;
        match current.status().await {
            TrackStatus::Playing => Err(PlaybackError::AlreadyPlaying),
            _ => {
                current.resume()?;
                info!("▶️ Resumed: {}", current.title());
                Ok(current.metadata().clone())
            }
        }
    }

    /// Removes the track at 1-based `position`, or the last one when `None`.
    pub fn remove(&mut self, position: Option<usize>) -> Result<Track, PlaybackError> {
        let len = self.queue.len();
        let index = match position {
            None if len > 0 => len - 1,
            Some(p) if (1..=len).contains(&p) => p - 1,
            _ => {
                return Err(PlaybackError::InvalidPosition {
                    position: position.unwrap_or(0),
                    len,
                })
            }
        };

        let track = self
            .queue
            .remove(index)
            .ok_or(PlaybackError::InvalidPosition { position: index + 1, len })?;
        debug!("❌ Removed from queue #{}: {}", index + 1, track.title());
        Ok(track)
    }

    /// Empties the queue, leaving `current` alone. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let cleared = self.queue.len();
        self.queue.clear();
        if cleared > 0 {
            info!("🗑️ Queue cleared ({} tracks)", cleared);
        }
        cleared
    }

    /// Stops and drops everything, returning to a freshly created state.
    pub fn reset(&mut self) -> ResetSummary {
        let stopped = self.current.take().map(|track| {
            track.stop();
            track.metadata().clone()
        });
        let cleared = self.queue.len();
        self.queue.clear();
        self.announce_channel = None;
        ResetSummary { stopped, cleared }
    }

    /// One scheduler step: retire a finished or failed `current`, then promote at most one
    /// queued track.
    pub async fn advance(&mut self) -> Advance {
        let mut finished = None;
        if let Some(current) = &self.current {
            match current.status().await {
                TrackStatus::Finished => {}
                TrackStatus::Failed => {
                    current.stop();
                    let failed = current.metadata().clone();
                    warn!("💥 Playback broke off: {}", failed.display_title());
                    self.current = None;
                    return Advance::StreamFailed { failed };
                }
                _ => return Advance::Unchanged,
            }
            current.stop();
            finished = self.current.take().map(|t| t.metadata().clone());
        }

        let Some(mut next) = self.queue.pop_front() else {
            return match finished {
                Some(finished) => {
                    info!("📭 Queue empty after: {}", finished.display_title());
                    Advance::Drained { finished }
                }
                None => Advance::Unchanged,
            };
        };

        match next.start().await {
            Ok(()) => {
                let started = next.metadata().clone();
                info!("➡️ Next in queue: {}", started.display_title());
                self.current = Some(next);
                Advance::Promoted { finished, started }
            }
            Err(error) => {
                warn!("⚠️ Could not start {}: {}", next.title(), error);
                Advance::StartFailed {
                    finished,
                    failed: next.metadata().clone(),
                    error,
                }
            }
        }
    }

    pub fn current(&self) -> Option<&TrackMetadata> {
        self.current.as_ref().map(Track::metadata)
    }

    pub async fn current_status(&self) -> Option<TrackStatus> {
        match &self.current {
            Some(track) => Some(track.status().await),
            None => None,
        }
    }

    pub fn up_next(&self) -> Option<&TrackMetadata> {
        self.queue.front().map(Track::metadata)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn announce_channel(&self) -> Option<ChannelId> {
        self.announce_channel
    }

    pub fn set_announce_channel(&mut self, channel: ChannelId) {
        self.announce_channel = Some(channel);
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current().cloned(),
            items: self.queue.iter().map(|t| t.metadata().clone()).collect(),
        }
    }

    async fn active_current(&self) -> Result<&Track, PlaybackError> {
        let current = self.current.as_ref().ok_or(PlaybackError::NothingPlaying)?;
        if current.status().await.is_active() {
            Ok(current)
        } else {
            Err(PlaybackError::NothingPlaying)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub stopped: Option<TrackMetadata>,
    pub cleared: usize,
}

/// Point-in-time copy of a server's queue for display.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub current: Option<TrackMetadata>,
    pub items: Vec<TrackMetadata>,
}

impl QueueSnapshot {
    /// Sum of known queued durations; `current` is not counted.
    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.duration).sum()
    }

    /// Page of the queue; pages past either end clamp to the nearest one.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_pages = self.items.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(self.items.len());

        QueuePage {
            items: self.items[start..end]
                .iter()
                .enumerate()
                .map(|(i, item)| (start + i + 1, item.clone()))
                .collect(),
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    /// `(1-based queue position, track)`
    pub items: Vec<(usize, TrackMetadata)>,
    pub current_page: usize,
    pub total_pages: usize,
}
