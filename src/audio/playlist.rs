use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::sources::MediaResolver;

enum JobState {
    Resolving(oneshot::Receiver<Vec<String>>),
    Complete(Vec<String>),
}

/// Background expansion of a playlist source into its entry URLs.
///
/// The expansion runs on its own task and publishes its result exactly once
/// through a oneshot channel; only the owner of the job ever reads it. Dropping
/// the job abandons the result without cancelling the extractor.
pub struct PlaylistExpansionJob {
    guild_id: GuildId,
    channel_id: ChannelId,
    source: String,
    state: JobState,
}

impl PlaylistExpansionJob {
    pub fn spawn(
        resolver: Arc<dyn MediaResolver>,
        guild_id: GuildId,
        channel_id: ChannelId,
        source: String,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let url = source.clone();
        tokio::spawn(async move {
            let urls = resolver.expand_playlist(&url).await;
            if tx.send(urls).is_err() {
                debug!("Playlist {} finished after its job was abandoned", url);
            }
        });

        info!("📋 Expanding playlist {} for guild {}", source, guild_id);
        Self::with_receiver(guild_id, channel_id, source, rx)
    }

    pub(crate) fn with_receiver(
        guild_id: GuildId,
        channel_id: ChannelId,
        source: String,
        rx: oneshot::Receiver<Vec<String>>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            source,
            state: JobState::Resolving(rx),
        }
    }

    /// Polls the expansion. Once this returns `true` it always will.
    pub fn is_complete(&mut self) -> bool {
        let JobState::Resolving(rx) = &mut self.state else {
            return true;
        };

        match rx.try_recv() {
            Ok(urls) => {
                self.state = JobState::Complete(urls);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                warn!("⚠️ Playlist expansion for {} died without a result", self.source);
                self.state = JobState::Complete(Vec::new());
                true
            }
        }
    }

    /// Entry URLs in playlist order; empty until the job completes.
    pub fn resolved_urls(&self) -> &[String] {
        match &self.state {
            JobState::Complete(urls) => urls,
            JobState::Resolving(_) => &[],
        }
    }

    pub fn into_resolved_urls(self) -> Vec<String> {
        match self.state {
            JobState::Complete(urls) => urls,
            JobState::Resolving(_) => Vec::new(),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::FakeResolver;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn wait_complete(job: &mut PlaylistExpansionJob) {
        for _ in 0..200 {
            if job.is_complete() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("playlist job never completed");
    }

    #[tokio::test]
    async fn test_spawned_job_completes_in_order() {
        let resolver = Arc::new(FakeResolver::new().with_playlist("pl", &["u1", "u2", "u3"]));
        let mut job = PlaylistExpansionJob::spawn(
            resolver,
            GuildId::new(1),
            ChannelId::new(2),
            "pl".to_string(),
        );

        wait_complete(&mut job).await;

        assert_eq!(job.resolved_urls(), ["u1", "u2", "u3"]);
        assert!(job.is_complete());
        assert_eq!(job.into_resolved_urls(), vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_job_is_incomplete_until_published() {
        let (tx, rx) = oneshot::channel();
        let mut job =
            PlaylistExpansionJob::with_receiver(GuildId::new(1), ChannelId::new(2), "pl".into(), rx);

        assert!(!job.is_complete());
        assert!(job.resolved_urls().is_empty());

        tx.send(vec!["u1".to_string()]).unwrap();
        assert!(job.is_complete());
        assert_eq!(job.resolved_urls(), ["u1"]);
    }

    #[tokio::test]
    async fn test_dead_expansion_completes_empty() {
        let (tx, rx) = oneshot::channel::<Vec<String>>();
        let mut job =
            PlaylistExpansionJob::with_receiver(GuildId::new(1), ChannelId::new(2), "pl".into(), rx);
        drop(tx);

        assert!(job.is_complete());
        assert!(job.resolved_urls().is_empty());
    }
}
