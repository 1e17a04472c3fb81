use anyhow::Context;
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::GuildId;
use songbird::{input::YoutubeDl, Songbird};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};
use url::Url;

use super::MediaResolver;
use crate::{
    audio::track::{SongbirdStream, Track, TrackMetadata},
    error::ResolveError,
};

const YTDLP: &str = "yt-dlp";
const RESOLVE_CONCURRENCY: usize = 3;
const EXPAND_CONCURRENCY: usize = 2;

/// Caps on concurrent extractor processes. Track lookups and playlist
/// expansions draw from separate pools, so a long `--flat-playlist` run
/// never holds up a `/play` on any server.
struct ExtractorLimits {
    resolve: Semaphore,
    expand: Semaphore,
}

impl ExtractorLimits {
    fn new(resolve: usize, expand: usize) -> Self {
        Self {
            resolve: Semaphore::new(resolve),
            expand: Semaphore::new(expand),
        }
    }

    async fn resolve_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.resolve.acquire().await.ok()
    }

    async fn expand_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.expand.acquire().await.ok()
    }
}

/// Resolver backed by the `yt-dlp` command line extractor.
pub struct YtDlpResolver {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    max_playlist_size: usize,
    volume: f32,
    limits: ExtractorLimits,
}

/// Fields read from `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
}

/// One line of `--flat-playlist --dump-json`.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    url: Option<String>,
    webpage_url: Option<String>,
    ie_key: Option<String>,
}

impl YtDlpResolver {
    pub fn new(manager: Arc<Songbird>, max_playlist_size: usize, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            max_playlist_size,
            volume,
            limits: ExtractorLimits::new(RESOLVE_CONCURRENCY, EXPAND_CONCURRENCY),
        }
    }

    /// Installed extractor version, used by the health check.
    pub async fn version() -> anyhow::Result<String> {
        let output = Command::new(YTDLP)
            .arg("--version")
            .output()
            .await
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn fetch_metadata(&self, source: &str) -> Result<TrackMetadata, ResolveError> {
        let _permit = self.limits.resolve_permit().await;
        let target = search_target(source);
        debug!("📊 Resolving: {}", target);

        let output = Command::new(YTDLP)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "--default-search",
                "auto",
                "-f",
                "bestaudio/best",
                target.as_str(),
            ])
            .output()
            .await
            .map_err(|e| ResolveError::Network {
                query: source.to_string(),
                reason: format!("could not run yt-dlp: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(source, &stderr));
        }

        parse_track_info(source, &String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve_one(&self, guild_id: GuildId, source: &str) -> Result<Track, ResolveError> {
        let metadata = self.fetch_metadata(source).await?;
        info!("🔎 Resolved {} -> {}", source, metadata.display_title());

        // Stream URLs expire, so songbird re-extracts when the track actually starts.
        let input = YoutubeDl::new(self.http.clone(), metadata.source_url.clone());
        let stream = SongbirdStream::new(guild_id, self.manager.clone(), input.into(), self.volume);
        Ok(Track::new(metadata, Box::new(stream)))
    }

    async fn expand_playlist(&self, url: &str) -> Vec<String> {
        let _permit = self.limits.expand_permit().await;
        info!("📋 Expanding playlist: {}", url);

        let output = Command::new(YTDLP)
            .args([
                "--flat-playlist",
                "--dump-json",
                "--ignore-errors",
                "--no-warnings",
                "--playlist-end",
                self.max_playlist_size.to_string().as_str(),
                url,
            ])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("❌ Could not run yt-dlp for playlist {}: {}", url, e);
                return Vec::new();
            }
        };

        if !output.status.success() {
            // --ignore-errors still prints every entry it could read
            debug!(
                "yt-dlp exited with {} for {}: {}",
                output.status,
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let entries = parse_playlist_entries(&String::from_utf8_lossy(&output.stdout));
        info!("📋 Playlist {} expanded to {} entries", url, entries.len());
        entries
    }
}

/// Web URLs go straight to the extractor; anything else is a search.
fn search_target(source: &str) -> String {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => source.to_string(),
        _ => format!("ytsearch1:{}", source),
    }
}

fn parse_track_info(source: &str, stdout: &str) -> Result<TrackMetadata, ResolveError> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ResolveError::NotFound(source.to_string()))?;

    let info: YtDlpInfo =
        serde_json::from_str(line).map_err(|_| ResolveError::NotFound(source.to_string()))?;

    let mut metadata = TrackMetadata::new(info.webpage_url.unwrap_or_else(|| source.to_string()));
    if let Some(title) = info.title {
        metadata = metadata.with_title(title);
    }
    if let Some(uploader) = info.uploader {
        metadata = metadata.with_uploader(uploader);
    }
    // Live streams report no duration
    if let Some(secs) = info.duration.filter(|secs| secs.is_finite() && *secs >= 0.0) {
        metadata = metadata.with_duration(Duration::from_secs_f64(secs));
    }
    Ok(metadata)
}

fn parse_playlist_entries(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<FlatEntry>(line).ok())
        .filter_map(|entry| {
            let url = entry.webpage_url.or(entry.url)?;
            if url.contains("://") {
                Some(url)
            } else if entry.ie_key.as_deref() == Some("Youtube") {
                // Older yt-dlp releases only give the bare video id
                Some(format!("https://www.youtube.com/watch?v={}", url))
            } else {
                None
            }
        })
        .collect()
}

fn classify_failure(source: &str, stderr: &str) -> ResolveError {
    let lower = stderr.to_lowercase();
    if lower.contains("unsupported url") {
        return ResolveError::Unsupported(source.to_string());
    }

    let network = [
        "unable to download",
        "timed out",
        "connection",
        "network is unreachable",
        "temporary failure in name resolution",
        "http error 5",
    ];
    if network.iter().any(|needle| lower.contains(needle)) {
        return ResolveError::Network {
            query: source.to_string(),
            reason: stderr.trim().lines().last().unwrap_or_default().to_string(),
        };
    }

    ResolveError::NotFound(source.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(
            search_target("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(search_target("daft punk around the world"), "ytsearch1:daft punk around the world");
        assert_eq!(search_target("ftp://host/file.mp3"), "ytsearch1:ftp://host/file.mp3");
    }

    #[test]
    fn test_parse_track_info() {
        let stdout = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","uploader":"Rick Astley","duration":212.0,"webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#;
        let meta = parse_track_info("rick", stdout).unwrap();

        assert_eq!(meta.display_title(), "Never Gonna Give You Up");
        assert_eq!(meta.uploader.as_deref(), Some("Rick Astley"));
        assert_eq!(meta.duration, Some(Duration::from_secs(212)));
        assert_eq!(meta.source_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_parse_track_info_without_optional_fields() {
        let meta = parse_track_info("https://cdn.example.com/a.mp3", r#"{"duration":null}"#).unwrap();
        assert_eq!(meta.display_title(), "https://cdn.example.com/a.mp3");
        assert_eq!(meta.duration, None);
    }

    #[test]
    fn test_empty_output_is_not_found() {
        assert_eq!(
            parse_track_info("zzqx", "\n").unwrap_err(),
            ResolveError::NotFound("zzqx".into())
        );
    }

    #[test]
    fn test_parse_playlist_entries_keeps_order_and_skips_garbage() {
        let stdout = [
            r#"{"url":"https://www.youtube.com/watch?v=one","ie_key":"Youtube"}"#,
            "not json",
            r#"{"url":"two","ie_key":"Youtube"}"#,
            r#"{"url":"opaque-id","ie_key":"Soundcloud"}"#,
            r#"{"webpage_url":"https://soundcloud.com/a/three","url":"https://api.soundcloud.com/tracks/3"}"#,
            r#"{"title":"private video"}"#,
        ]
        .join("\n");

        assert_eq!(
            parse_playlist_entries(&stdout),
            vec![
                "https://www.youtube.com/watch?v=one".to_string(),
                "https://www.youtube.com/watch?v=two".to_string(),
                "https://soundcloud.com/a/three".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_busy_playlist_expansions_leave_track_lookups_free() {
        let limits = ExtractorLimits::new(RESOLVE_CONCURRENCY, EXPAND_CONCURRENCY);
        let mut expanding = Vec::new();
        for _ in 0..EXPAND_CONCURRENCY {
            expanding.push(limits.expand_permit().await.unwrap());
        }

        let wait = Duration::from_millis(50);
        assert!(tokio::time::timeout(wait, limits.expand_permit()).await.is_err());

        let mut resolving = Vec::new();
        for _ in 0..RESOLVE_CONCURRENCY {
            let permit = tokio::time::timeout(wait, limits.resolve_permit())
                .await
                .expect("track lookup waited behind a playlist expansion");
            resolving.push(permit.unwrap());
        }

        drop(expanding);
        assert!(tokio::time::timeout(wait, limits.expand_permit()).await.is_ok());
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("x", "ERROR: Unsupported URL: x"),
            ResolveError::Unsupported("x".into())
        );
        assert!(matches!(
            classify_failure("x", "ERROR: Unable to download webpage: timed out"),
            ResolveError::Network { .. }
        ));
        assert_eq!(
            classify_failure("x", "ERROR: [youtube] abc: Video unavailable"),
            ResolveError::NotFound("x".into())
        );
    }
}
