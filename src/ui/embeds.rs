use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{queue::QueueSnapshot, track::TrackMetadata};

/// Embed colors shared by every reply
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// One embed describing a track: title, uploader, link and length.
pub fn create_track_embed(track: &TrackMetadata) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(track.display_title())
        .description(format!(
            "Uploader: {}",
            track.uploader.as_deref().unwrap_or_default()
        ))
        .color(colors::MUSIC_PURPLE);

    if let Some(url) = track.link() {
        embed = embed.url(url);
    }

    if let Some(duration) = track.duration {
        embed = embed.field("Length:", format_duration(duration), true);
    }

    embed
}

/// Queue listing for one page, positions counted from the front of the queue.
pub fn create_queue_embed(snapshot: &QueueSnapshot, page: usize, per_page: usize) -> CreateEmbed {
    if snapshot.items.is_empty() {
        return CreateEmbed::default()
            .title("📋 Nothing is currently queued.")
            .description("💡 Use `/play <source>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .timestamp(Timestamp::now());
    }

    let queue_page = snapshot.page(page, per_page);
    let mut embed = CreateEmbed::default()
        .title(format!("Current Queue ({})", snapshot.items.len()))
        .description(format!(
            "Total playback time: {}",
            format_playback_time(snapshot.total_duration())
        ))
        .color(colors::INFO_BLUE);

    for (position, item) in &queue_page.items {
        embed = embed.field(
            item.display_title(),
            format!("Queue position: {}", position),
            false,
        );
    }

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{}",
            queue_page.current_page, queue_page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Lists every command
pub fn create_help_embed(bot_name: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("🎵 {}", bot_name))
        .description("Plays music from media links.")
        .color(colors::INFO_BLUE)
        .field(
            "🔊 Connection",
            "• `/join [channel]` - Joins your voice channel, or the named one\n\
            • `/leave` - Leaves voice, stopping playback and clearing the queue",
            false,
        )
        .field(
            "🎵 Playback",
            "• `/play [source]` - Plays a link, playlist or search; resumes without a source\n\
            • `/pause` / `/resume` - Pauses or resumes playback\n\
            • `/skip` - Skips to the next song in the queue\n\
            • `/stop` - Stops the current song; keeps the queue\n\
            • `/nowplaying` - Shows the current song",
            false,
        )
        .field(
            "📜 Queue",
            "• `/queue [page]` - Shows the queue\n\
            • `/remove [position]` - Removes a song, the last one by default\n\
            • `/clear` - Clears the queue\n\
            • `/reset` - Stops playback, clears the queue and disconnects",
            false,
        )
        .footer(CreateEmbedFooter::new("YouTube and SoundCloud playlists are queued in order"))
        .timestamp(Timestamp::now())
}

pub fn create_reset_embed(
    bot_name: &str,
    report: &crate::audio::player::ResetReport,
) -> CreateEmbed {
    let mut lines = Vec::new();
    if let Some(stopped) = &report.stopped {
        lines.push(format!("⏹️ Playback of **{}** has been stopped.", stopped.display_title()));
    }
    if report.cleared > 0 {
        lines.push(format!("🗑️ Queue has been cleared ({} songs).", report.cleared));
    }
    if report.abandoned_playlists > 0 {
        lines.push(format!(
            "📋 {} pending playlist(s) dropped.",
            report.abandoned_playlists
        ));
    }
    if report.disconnected {
        lines.push(format!("👋 {} has disconnected.", bot_name));
    }
    lines.push("Player has been cleared.".to_string());

    CreateEmbed::default()
        .title(format!("🔄 {} has finished resetting.", bot_name))
        .description(lines.join("\n"))
        .color(colors::WARNING_ORANGE)
}

pub fn create_playlist_embed(source: &str, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Downloading playlist data")
        .description("This could take a while (about 1 sec per song).")
        .color(colors::SUCCESS_GREEN);

    if source.starts_with("http://") || source.starts_with("https://") {
        embed = embed.url(source);
    }
    if position > 1 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "{} playlists ahead of this one",
            position - 1
        )));
    }
    embed
}

/// `m:ss`
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// `HH:MM:SS`, hours not wrapped
pub fn format_playback_time(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
