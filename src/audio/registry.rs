use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{playlist::PlaylistExpansionJob, queue::ServerPlaybackState};

/// Everything the bot tracks for one server.
#[derive(Default)]
pub struct GuildSlot {
    pub playback: Mutex<ServerPlaybackState>,
    pub pending: Mutex<VecDeque<PlaylistExpansionJob>>,
    ingest_gate: Arc<Mutex<()>>,
    epoch: AtomicU64,
}

impl GuildSlot {
    /// Bumped on every reset. Work started under an older epoch must not touch
    /// the playback state. Only bump while holding the `playback` lock.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Claims the right to ingest a playlist for this server, or `None` while
    /// another ingestion is still running.
    pub fn try_claim_ingest(&self) -> Option<OwnedMutexGuard<()>> {
        self.ingest_gate.clone().try_lock_owned().ok()
    }
}

/// Per-server state, created on first use and never shared across servers.
#[derive(Default)]
pub struct Registry {
    guilds: DashMap<GuildId, Arc<GuildSlot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, guild_id: GuildId) -> Arc<GuildSlot> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Created playback state for guild {}", guild_id);
                Arc::new(GuildSlot::default())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSlot>> {
        self.guilds.get(&guild_id).map(|slot| slot.clone())
    }

    /// Copies the slot handles so callers never hold a map shard across an await.
    pub fn slots(&self) -> Vec<(GuildId, Arc<GuildSlot>)> {
        self.guilds
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_is_created_once_per_guild() {
        let registry = Registry::new();
        assert!(registry.get(GuildId::new(1)).is_none());

        let a = registry.slot(GuildId::new(1));
        let again = registry.slot(GuildId::new(1));
        let b = registry.slot(GuildId::new(2));

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.slots().len(), 2);
    }

    #[tokio::test]
    async fn test_guilds_do_not_share_state() {
        let registry = Registry::new();
        let a = registry.slot(GuildId::new(1));
        let b = registry.slot(GuildId::new(2));

        a.playback
            .lock()
            .await
            .set_announce_channel(serenity::model::id::ChannelId::new(9));

        assert!(b.playback.lock().await.announce_channel().is_none());
    }

    #[test]
    fn test_ingest_gate_is_exclusive() {
        let slot = GuildSlot::default();
        let guard = slot.try_claim_ingest().unwrap();
        assert!(slot.try_claim_ingest().is_none());
        drop(guard);
        assert!(slot.try_claim_ingest().is_some());
    }

    #[test]
    fn test_epoch_bumps() {
        let slot = GuildSlot::default();
        assert_eq!(slot.epoch(), 0);
        assert_eq!(slot.bump_epoch(), 1);
        assert_eq!(slot.epoch(), 1);
    }
}
