pub mod ytdlp;

use async_trait::async_trait;
use regex::Regex;
use serenity::model::id::GuildId;
use std::sync::LazyLock;

use crate::{audio::track::Track, error::ResolveError};

pub use ytdlp::YtDlpResolver;

/// YouTube `list=` parameter or a SoundCloud `/sets/` path.
static PLAYLIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[?&]list=[\w-]+|soundcloud\.com/[^/?#]+/sets/[^/?#]+)")
        .expect("playlist marker pattern is valid")
});

/// Turns user-supplied sources into playable tracks.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves a URL or search query to a single track bound to `guild_id`'s
    /// voice session.
    async fn resolve_one(&self, guild_id: GuildId, source: &str) -> Result<Track, ResolveError>;

    /// Lists the webpage URLs of a playlist in order. Entries that fail to
    /// resolve are left out; this never fails as a whole.
    async fn expand_playlist(&self, url: &str) -> Vec<String>;
}

/// Whether `source` should be expanded as a playlist instead of played directly.
pub fn is_playlist_source(source: &str) -> bool {
    PLAYLIST_MARKER.is_match(source)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::audio::track::testing::{fake_track, StreamControl};
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    /// Resolver that serves fake tracks. Sources listed in `missing` fail with
    /// `NotFound`, sources in `panicking` panic; playlists come from `playlists`.
    #[derive(Default)]
    pub(crate) struct FakeResolver {
        missing: HashSet<String>,
        panicking: HashSet<String>,
        playlists: HashMap<String, Vec<String>>,
        controls: Mutex<HashMap<String, StreamControl>>,
        resolved: Mutex<Vec<String>>,
    }

    impl FakeResolver {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_missing(mut self, source: &str) -> Self {
            self.missing.insert(source.to_string());
            self
        }

        pub(crate) fn with_panicking(mut self, source: &str) -> Self {
            self.panicking.insert(source.to_string());
            self
        }

        pub(crate) fn with_playlist(mut self, url: &str, entries: &[&str]) -> Self {
            self.playlists
                .insert(url.to_string(), entries.iter().map(|s| s.to_string()).collect());
            self
        }

        pub(crate) fn control(&self, source: &str) -> Option<StreamControl> {
            self.controls.lock().unwrap().get(source).cloned()
        }

        /// Sources successfully resolved so far, in call order.
        pub(crate) fn resolved(&self) -> Vec<String> {
            self.resolved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaResolver for FakeResolver {
        async fn resolve_one(&self, _guild_id: GuildId, source: &str) -> Result<Track, ResolveError> {
            if self.missing.contains(source) {
                return Err(ResolveError::NotFound(source.to_string()));
            }
            if self.panicking.contains(source) {
                panic!("extractor crashed on {}", source);
            }
            let (track, control) = fake_track(source);
            self.controls
                .lock()
                .unwrap()
                .insert(source.to_string(), control);
            self.resolved.lock().unwrap().push(source.to_string());
            Ok(track)
        }

        async fn expand_playlist(&self, url: &str) -> Vec<String> {
            self.playlists.get(url).cloned().unwrap_or_default()
        }
    }
}
