//! # Audio Module
//!
//! Per-server playback orchestration for the jukebox.
//!
//! ## Architecture
//!
//! ### [`queue`] - Server playback state
//! - The `current` track and the FIFO queue behind it
//! - At most one track per server is ever playing or paused
//!
//! ### [`scheduler`] - Playback scheduler
//! - Fixed-interval scan over every server
//! - Retires finished tracks and promotes the queue front, one per tick
//!
//! ### [`playlist`] and [`ingest`] - Playlists
//! - Playlist URLs are expanded on their own task
//! - Completed expansions are queued in playlist order with progress messages
//!
//! ### [`player`] - Command facade
//! - `Jukebox` ties the registry, resolver, voice transport and chat together
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let jukebox = Jukebox::new(resolver, transport, notifier);
//! jukebox.spawn_background(token, Duration::from_secs(1), Duration::from_secs(1));
//!
//! jukebox.join(guild_id, voice_channel).await?;
//! jukebox.play(guild_id, text_channel, "https://youtu.be/dQw4w9WgXcQ").await?;
//! jukebox.pause(guild_id).await?;
//! ```

pub mod ingest;
pub mod player;
pub mod playlist;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod track;
pub mod transport;
