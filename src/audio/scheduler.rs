use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{queue::Advance, registry::Registry};
use crate::notify::NotificationSink;

/// Background loop that retires finished tracks and promotes the next one,
/// at most one promotion per server per tick.
pub struct PlaybackScheduler {
    registry: Arc<Registry>,
    notifier: Arc<dyn NotificationSink>,
    tick: Duration,
}

impl PlaybackScheduler {
    pub fn new(registry: Arc<Registry>, notifier: Arc<dyn NotificationSink>, tick: Duration) -> Self {
        Self {
            registry,
            notifier,
            tick,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("⏱️ Playback scheduler running every {:?}", self.tick);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => self.tick().await,
            }
        }

        info!("⏱️ Playback scheduler stopped");
    }

    /// Advances every server once. Servers are processed concurrently and a
    /// failing server never stops the others.
    pub async fn tick(&self) {
        let mut tasks = JoinSet::new();
        for (guild_id, slot) in self.registry.slots() {
            let notifier = self.notifier.clone();
            tasks.spawn(async move {
                let (advance, channel) = {
                    let mut state = slot.playback.lock().await;
                    let advance = state.advance().await;
                    (advance, state.announce_channel())
                };
                announce(guild_id, advance, channel, notifier.as_ref()).await;
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("💥 Scheduler task failed: {:?}", e);
            }
        }
    }
}

async fn announce(
    guild_id: GuildId,
    advance: Advance,
    channel: Option<ChannelId>,
    notifier: &dyn NotificationSink,
) {
    let message = match advance {
        Advance::Unchanged => return,
        Advance::Drained { finished } => {
            debug!("Guild {} finished {} with nothing queued", guild_id, finished.display_title());
            return;
        }
        Advance::StreamFailed { failed } => {
            format!(
                "⚠️ Playback of **{}** stopped: the audio stream failed.",
                failed.display_title()
            )
        }
        Advance::Promoted { started, .. } => {
            format!("🎵 Now playing: **{}**", started.display_title())
        }
        Advance::StartFailed { failed, error, .. } => {
            format!(
                "⚠️ Could not play **{}**: {}",
                failed.display_title(),
                error.user_message()
            )
        }
    };

    if let Some(channel) = channel {
        notifier.say(channel, &message).await;
    }
}
