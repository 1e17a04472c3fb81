use thiserror::Error;

/// Failure to turn a source string into a playable track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("nothing playable found for `{0}`")]
    NotFound(String),
    #[error("network error while resolving `{query}`: {reason}")]
    Network { query: String, reason: String },
    #[error("unsupported source `{0}`")]
    Unsupported(String),
}

impl ResolveError {
    pub fn query(&self) -> &str {
        match self {
            ResolveError::NotFound(query) | ResolveError::Unsupported(query) => query,
            ResolveError::Network { query, .. } => query,
        }
    }
}

/// Errors surfaced by playback operations. None of them are fatal: the command
/// boundary turns each one into a chat reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    #[error("invalid queue position {position} (queue holds {len})")]
    InvalidPosition { position: usize, len: usize },
    #[error("voice transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("playback is already paused")]
    AlreadyPaused,
    #[error("playback is already running")]
    AlreadyPlaying,
    #[error("nothing is playing")]
    NothingPlaying,
}

impl PlaybackError {
    /// Text shown to the user who ran the command.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::Resolution(ResolveError::NotFound(source)) => {
                format!("❌ Unable to find anything to play from **{}**.", source)
            }
            PlaybackError::Resolution(ResolveError::Network { query, .. }) => {
                format!("🌐 Network error while looking up **{}**, try again later.", query)
            }
            PlaybackError::Resolution(ResolveError::Unsupported(source)) => {
                format!("🚫 **{}** is not a supported audio source.", source)
            }
            PlaybackError::InvalidPosition { position, len: 0 } => {
                format!("❌ **{}** is not a valid queue position: the queue is empty.", position)
            }
            PlaybackError::InvalidPosition { position, len } => {
                format!(
                    "❌ **{}** is not a valid queue position (1-{}).",
                    position, len
                )
            }
            PlaybackError::TransportUnavailable(reason) => {
                format!("🔇 Unable to use a voice channel: {}.", reason)
            }
            PlaybackError::AlreadyPaused => "⏸️ Playback is already paused.".to_string(),
            PlaybackError::AlreadyPlaying => "▶️ Playback is already running.".to_string(),
            PlaybackError::NothingPlaying => "😴 There is nothing playing.".to_string(),
        }
    }
}

/// Startup-only configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_name_the_condition() {
        let err = PlaybackError::InvalidPosition { position: 4, len: 0 };
        assert!(err.user_message().contains("queue is empty"));

        let err = PlaybackError::InvalidPosition { position: 9, len: 3 };
        assert!(err.user_message().contains("(1-3)"));

        let err: PlaybackError = ResolveError::Unsupported("ftp://x".into()).into();
        assert!(err.user_message().contains("ftp://x"));
    }

    #[test]
    fn test_resolve_error_keeps_source() {
        let err = ResolveError::Network {
            query: "https://youtu.be/abc".into(),
            reason: "timed out".into(),
        };
        assert_eq!(err.query(), "https://youtu.be/abc");
    }
}
