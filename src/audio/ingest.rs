use serenity::model::id::ChannelId;
use std::{sync::Arc, time::Duration};
use tokio::{sync::OwnedMutexGuard, task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    playlist::PlaylistExpansionJob,
    registry::{GuildSlot, Registry},
};
use crate::{notify::NotificationSink, sources::MediaResolver};

/// Background loop that turns completed playlist expansions into queued
/// tracks, oldest job first for each server.
pub struct PlaylistIngestionLoop {
    registry: Arc<Registry>,
    resolver: Arc<dyn MediaResolver>,
    notifier: Arc<dyn NotificationSink>,
    tick: Duration,
}

impl PlaylistIngestionLoop {
    pub fn new(
        registry: Arc<Registry>,
        resolver: Arc<dyn MediaResolver>,
        notifier: Arc<dyn NotificationSink>,
        tick: Duration,
    ) -> Self {
        Self {
            registry,
            resolver,
            notifier,
            tick,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();
        info!("📥 Playlist ingestion running every {:?}", self.tick);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(&mut tasks).await;
                }
            }
        }

        tasks.shutdown().await;
        info!("📥 Playlist ingestion stopped");
    }

    /// Starts ingesting the front job of every server whose front job has
    /// finished expanding and which has no ingestion underway. Returns how
    /// many ingestions were started.
    pub async fn tick(&self, tasks: &mut JoinSet<()>) -> usize {
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("💥 Playlist ingestion task failed: {:?}", e);
            }
        }

        let mut started = 0;
        for (guild_id, slot) in self.registry.slots() {
            let Some(gate) = slot.try_claim_ingest() else {
                continue;
            };

            // Epoch and pop happen under the pending lock, which reset also
            // holds while it bumps the epoch.
            let (job, epoch) = {
                let mut pending = slot.pending.lock().await;
                if !pending.front_mut().is_some_and(|job| job.is_complete()) {
                    continue;
                }
                let epoch = slot.epoch();
                match pending.pop_front() {
                    Some(job) => (job, epoch),
                    None => continue,
                }
            };

            debug!(
                "📥 Ingesting playlist {} ({} entries) for guild {}",
                job.source(),
                job.resolved_urls().len(),
                guild_id
            );
            tasks.spawn(ingest(
                slot,
                job,
                epoch,
                self.resolver.clone(),
                self.notifier.clone(),
                gate,
            ));
            started += 1;
        }
        started
    }
}

fn progress(done: usize, total: usize) -> String {
    format!("Queueing songs from playlist: {}/{}", done, total)
}

async fn ingest(
    slot: Arc<GuildSlot>,
    job: PlaylistExpansionJob,
    epoch: u64,
    resolver: Arc<dyn MediaResolver>,
    notifier: Arc<dyn NotificationSink>,
    _gate: OwnedMutexGuard<()>,
) {
    let guild_id = job.guild_id();
    let channel: ChannelId = job.channel_id();
    let source = job.source().to_string();
    let urls = job.into_resolved_urls();
    let total = urls.len();

    if total == 0 {
        notifier
            .say(channel, &format!("⚠️ No playable songs found in playlist {}", source))
            .await;
        return;
    }

    let message = notifier.say(channel, &progress(0, total)).await;
    let mut queued = 0;

    for (index, url) in urls.iter().enumerate() {
        if slot.epoch() != epoch {
            info!("🗑️ Playlist {} abandoned after reset in guild {}", source, guild_id);
            return;
        }

        let outcome = match resolver.resolve_one(guild_id, url).await {
            Ok(track) => {
                let mut state = slot.playback.lock().await;
                // A reset may have landed while the entry was resolving.
                if slot.epoch() != epoch {
                    info!("🗑️ Playlist {} abandoned after reset in guild {}", source, guild_id);
                    return;
                }
                if state.announce_channel().is_none() {
                    state.set_announce_channel(channel);
                }
                state.enqueue(track).await.map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        if let Some(message) = message {
            notifier.edit(channel, message, &progress(index + 1, total)).await;
        }

        match outcome {
            Ok(_) => queued += 1,
            Err(reason) => {
                warn!("⚠️ Skipping playlist entry {} in guild {}: {}", url, guild_id, reason);
                notifier
                    .say(channel, &format!("⚠️ Unable to queue {} from the playlist.", url))
                    .await;
            }
        }
    }

    info!("✅ Queued {}/{} songs from {} in guild {}", queued, total, source, guild_id);
    notifier.say(channel, "✅ Finished queueing playlist.").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::track::TrackStatus,
        notify::testing::RecordingSink,
        sources::testing::FakeResolver,
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::GuildId;
    use tokio::sync::oneshot;

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(10);

    struct Harness {
        registry: Arc<Registry>,
        resolver: Arc<FakeResolver>,
        sink: Arc<RecordingSink>,
        ingestion: PlaylistIngestionLoop,
    }

    fn harness(resolver: FakeResolver) -> Harness {
        let registry = Arc::new(Registry::new());
        let resolver = Arc::new(resolver);
        let sink = Arc::new(RecordingSink::default());
        let ingestion = PlaylistIngestionLoop::new(
            registry.clone(),
            resolver.clone(),
            sink.clone(),
            Duration::from_millis(10),
        );
        Harness {
            registry,
            resolver,
            sink,
            ingestion,
        }
    }

    fn completed_job(source: &str, urls: &[&str]) -> PlaylistExpansionJob {
        let (tx, rx) = oneshot::channel::<Vec<String>>();
        tx.send(urls.iter().map(|u| u.to_string()).collect()).unwrap();
        PlaylistExpansionJob::with_receiver(GUILD, CHANNEL, source.into(), rx)
    }

    async fn titles(slot: &GuildSlot) -> Vec<String> {
        let snapshot = slot.playback.lock().await.snapshot();
        snapshot
            .current
            .into_iter()
            .chain(snapshot.items)
            .map(|m| m.display_title().to_string())
            .collect()
    }

    async fn drain(tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
    }

    #[tokio::test]
    async fn test_ingestion_preserves_order_and_skips_failures() {
        let h = harness(FakeResolver::new().with_missing("u2"));
        let slot = h.registry.slot(GUILD);
        slot.pending
            .lock()
            .await
            .push_back(completed_job("pl", &["u1", "u2", "u3"]));

        let mut tasks = JoinSet::new();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        drain(&mut tasks).await;

        assert_eq!(titles(&slot).await, vec!["u1", "u3"]);
        assert_eq!(h.resolver.control("u1").unwrap().status(), TrackStatus::Playing);
        assert_eq!(h.resolver.control("u3").unwrap().status(), TrackStatus::Pending);
        assert!(slot.pending.lock().await.is_empty());

        assert_eq!(
            h.sink.messages(),
            vec![
                "Queueing songs from playlist: 3/3",
                "⚠️ Unable to queue u2 from the playlist.",
                "✅ Finished queueing playlist.",
            ]
        );
        assert_eq!(h.sink.edit_count(), 3);
    }

    #[tokio::test]
    async fn test_incomplete_front_job_blocks_later_jobs() {
        let h = harness(FakeResolver::new());
        let slot = h.registry.slot(GUILD);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = slot.pending.lock().await;
            pending.push_back(PlaylistExpansionJob::with_receiver(GUILD, CHANNEL, "first".into(), rx));
            pending.push_back(completed_job("second", &["b1"]));
        }

        let mut tasks = JoinSet::new();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 0);
        assert!(h.resolver.resolved().is_empty());
        assert_eq!(slot.pending.lock().await.len(), 2);

        tx.send(vec!["a1".to_string(), "a2".to_string()]).unwrap();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        drain(&mut tasks).await;
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        drain(&mut tasks).await;

        assert_eq!(titles(&slot).await, vec!["a1", "a2", "b1"]);
    }

    #[tokio::test]
    async fn test_one_ingestion_per_server_at_a_time() {
        let h = harness(FakeResolver::new());
        let slot = h.registry.slot(GUILD);
        {
            let mut pending = slot.pending.lock().await;
            pending.push_back(completed_job("first", &["a1"]));
            pending.push_back(completed_job("second", &["b1"]));
        }

        let mut tasks = JoinSet::new();
        let gate = slot.try_claim_ingest().unwrap();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 0);
        drop(gate);

        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        assert_eq!(h.ingestion.tick(&mut tasks).await, 0);
        drain(&mut tasks).await;
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        drain(&mut tasks).await;

        assert_eq!(titles(&slot).await, vec!["a1", "b1"]);
    }

    #[tokio::test]
    async fn test_reset_abandons_running_ingestion() {
        let h = harness(FakeResolver::new());
        let slot = h.registry.slot(GUILD);
        slot.pending
            .lock()
            .await
            .push_back(completed_job("pl", &["u1", "u2"]));

        // Hold the playback lock so the ingestion task resolves u1 and then
        // waits to enqueue it.
        let mut tasks = JoinSet::new();
        {
            let mut state = slot.playback.lock().await;
            assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
            tokio::task::yield_now().await;
            assert_eq!(h.resolver.resolved(), vec!["u1"]);
            slot.bump_epoch();
            state.reset();
        }
        drain(&mut tasks).await;

        assert!(titles(&slot).await.is_empty());
        assert_eq!(h.resolver.resolved(), vec!["u1"]);
        assert!(!h
            .sink
            .messages()
            .contains(&"✅ Finished queueing playlist.".to_string()));
    }

    #[tokio::test]
    async fn test_reset_stops_ingestion_before_next_lookup() {
        let h = harness(FakeResolver::new());
        let slot = h.registry.slot(GUILD);
        slot.pending
            .lock()
            .await
            .push_back(completed_job("pl", &["u1", "u2"]));

        let mut tasks = JoinSet::new();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        // The task has not been polled yet on this runtime.
        slot.bump_epoch();
        drain(&mut tasks).await;

        assert!(h.resolver.resolved().is_empty());
        assert!(slot.try_claim_ingest().is_some());
    }

    #[tokio::test]
    async fn test_panicking_ingestion_does_not_stop_the_others() {
        let h = harness(FakeResolver::new().with_panicking("boom"));
        let broken = h.registry.slot(GUILD);
        let healthy = h.registry.slot(GuildId::new(2));
        broken
            .pending
            .lock()
            .await
            .push_back(completed_job("bad", &["boom"]));
        healthy
            .pending
            .lock()
            .await
            .push_back(completed_job("good", &["x1"]));

        let mut tasks = JoinSet::new();
        assert_eq!(h.ingestion.tick(&mut tasks).await, 2);
        let mut panicked = 0;
        while let Some(result) = tasks.join_next().await {
            if result.is_err_and(|e| e.is_panic()) {
                panicked += 1;
            }
        }
        assert_eq!(panicked, 1);
        assert_eq!(titles(&healthy).await, vec!["x1"]);

        // The crashed server's gate was released and its next job runs.
        broken
            .pending
            .lock()
            .await
            .push_back(completed_job("retry", &["ok1"]));
        assert_eq!(h.ingestion.tick(&mut tasks).await, 1);
        drain(&mut tasks).await;
        assert_eq!(titles(&broken).await, vec!["ok1"]);
    }

    #[tokio::test]
    async fn test_empty_playlist_is_reported() {
        let h = harness(FakeResolver::new());
        let slot = h.registry.slot(GUILD);
        slot.pending.lock().await.push_back(completed_job("pl", &[]));

        let mut tasks = JoinSet::new();
        h.ingestion.tick(&mut tasks).await;
        drain(&mut tasks).await;

        assert_eq!(
            h.sink.messages(),
            vec!["⚠️ No playable songs found in playlist pl"]
        );
    }
}
