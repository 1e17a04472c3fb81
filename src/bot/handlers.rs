use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        channel::ChannelType,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::{
        player::{JoinOutcome, PlayOutcome},
        queue::Enqueued,
        track::TrackStatus,
    },
    bot::JukeboxBot,
    error::PlaybackError,
    ui::{
        buttons::{self, button_ids},
        embeds,
    },
};

type Reply = Result<EditInteractionResponse, PlaybackError>;

/// Runs a slash command and edits the deferred reply with the outcome
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Commands only work inside a server")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Resolution can take a while, so answer within the interaction deadline first
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let reply = match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, guild_id, bot).await,
        "leave" => handle_leave(ctx, guild_id, bot).await,
        "play" => handle_play(ctx, &command, guild_id, bot).await,
        "pause" => handle_pause(guild_id, bot).await,
        "resume" => handle_resume(guild_id, bot).await,
        "skip" => handle_skip(guild_id, bot).await,
        "stop" => handle_stop(guild_id, bot).await,
        "nowplaying" => handle_nowplaying(guild_id, bot).await,
        "queue" => handle_queue(&command, guild_id, bot).await,
        "remove" => handle_remove(&command, guild_id, bot).await,
        "clear" => handle_clear(guild_id, bot).await,
        "reset" => handle_reset(ctx, guild_id, bot).await,
        "help" => Ok(EditInteractionResponse::new().embed(embeds::create_help_embed(&bot.bot_name(ctx)))),
        _ => Ok(EditInteractionResponse::new().content("❌ Unknown command")),
    };

    let response = reply.unwrap_or_else(|e| {
        info!("⚠️ /{} in guild {} failed: {}", command.data.name, guild_id, e);
        EditInteractionResponse::new().content(e.user_message())
    });
    command.edit_response(&ctx.http, response).await?;

    Ok(())
}

/// Handles the player buttons
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    info!(
        "🔘 Button {} pressed by {} in guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let jukebox = &bot.jukebox;
    let outcome = match component.data.custom_id.as_str() {
        button_ids::PAUSE => jukebox
            .pause(guild_id)
            .await
            .map(|track| format!("⏸️ Paused **{}**", track.display_title())),
        button_ids::RESUME => jukebox
            .resume(guild_id)
            .await
            .map(|track| format!("▶️ Resumed **{}**", track.display_title())),
        button_ids::SKIP => jukebox
            .skip(guild_id)
            .await
            .map(|report| format!("⏭️ Skipped **{}**", report.skipped.display_title())),
        button_ids::STOP => jukebox
            .stop(guild_id)
            .await
            .map(|track| format!("⏹️ Stopped **{}**", track.display_title())),
        _ => Ok("❌ Unknown action".to_string()),
    };
    let content = outcome.unwrap_or_else(|e| e.user_message());

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Reply {
    let requested = option_str(command, "channel");
    let (channel_id, channel_name) = find_voice_channel(ctx, guild_id, command.user.id, requested)?;

    let outcome = bot.jukebox.join(guild_id, channel_id).await?;
    let verb = match outcome {
        JoinOutcome::Connected => "connected to",
        JoinOutcome::Moved => "moved to",
    };

    Ok(EditInteractionResponse::new().content(format!(
        "🔊 {} {}: **{}**",
        bot.bot_name(ctx),
        verb,
        channel_name
    )))
}

async fn handle_leave(ctx: &Context, guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let bot_name = bot.bot_name(ctx);
    let content = match bot.jukebox.leave(guild_id).await {
        Some(_) => format!("👋 {} disconnected.", bot_name),
        None => format!("{} is not currently connected to a voice channel.", bot_name),
    };
    Ok(EditInteractionResponse::new().content(content))
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Reply {
    let Some(source) = option_str(command, "source") else {
        // Without a source, /play resumes
        let track = bot.jukebox.resume(guild_id).await?;
        return Ok(EditInteractionResponse::new()
            .content("▶️ Playback has resumed.")
            .embed(embeds::create_track_embed(&track)));
    };

    if !bot.jukebox.is_connected(guild_id).await {
        let (channel_id, _) = find_voice_channel(ctx, guild_id, command.user.id, None)?;
        bot.jukebox.join(guild_id, channel_id).await?;
    }

    let response = match bot.jukebox.play(guild_id, command.channel_id, source).await? {
        PlayOutcome::Track(Enqueued::Playing(track)) => EditInteractionResponse::new()
            .content("__**Now Playing:**__")
            .embed(embeds::create_track_embed(&track)),
        PlayOutcome::Track(Enqueued::Queued { metadata, position }) => {
            EditInteractionResponse::new()
                .content(format!("__**Added to queue:**__ position {}", position))
                .embed(embeds::create_track_embed(&metadata))
        }
        PlayOutcome::Playlist { source, position } => EditInteractionResponse::new()
            .embed(embeds::create_playlist_embed(&source, position)),
    };
    Ok(response)
}

async fn handle_pause(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let track = bot.jukebox.pause(guild_id).await?;
    Ok(EditInteractionResponse::new()
        .content("⏸️ Playback has been paused.")
        .embed(embeds::create_track_embed(&track)))
}

async fn handle_resume(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let track = bot.jukebox.resume(guild_id).await?;
    Ok(EditInteractionResponse::new()
        .content("▶️ Playback has resumed.")
        .embed(embeds::create_track_embed(&track)))
}

async fn handle_skip(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let report = bot.jukebox.skip(guild_id).await?;
    let content = match report.up_next {
        Some(next) => format!(
            "⏭️ Skipped **{}**. Up next: **{}**",
            report.skipped.display_title(),
            next.display_title()
        ),
        None => format!(
            "⏭️ Skipped **{}**. No more songs in queue.",
            report.skipped.display_title()
        ),
    };
    Ok(EditInteractionResponse::new().content(content))
}

async fn handle_stop(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let track = bot.jukebox.stop(guild_id).await?;
    Ok(EditInteractionResponse::new().content(format!(
        "⏹️ Playback of **{}** has been stopped.",
        track.display_title()
    )))
}

async fn handle_nowplaying(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let (track, status) = bot
        .jukebox
        .now_playing(guild_id)
        .await
        .ok_or(PlaybackError::NothingPlaying)?;

    let header = match status {
        TrackStatus::Paused => "__**Now Playing:**__ (paused)",
        _ => "__**Now Playing:**__",
    };
    Ok(EditInteractionResponse::new()
        .content(header)
        .embed(embeds::create_track_embed(&track))
        .components(buttons::create_player_buttons()))
}

async fn handle_queue(command: &CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let page = option_int(command, "page").map_or(1, |page| page.max(1) as usize);
    let snapshot = bot.jukebox.snapshot(guild_id).await;
    Ok(EditInteractionResponse::new().embed(embeds::create_queue_embed(
        &snapshot,
        page,
        bot.config().queue_page_size,
    )))
}

async fn handle_remove(command: &CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let position = option_int(command, "position").map(|p| p.max(0) as usize);
    let track = bot.jukebox.remove(guild_id, position).await?;
    Ok(EditInteractionResponse::new()
        .content("__**Removed from queue:**__")
        .embed(embeds::create_track_embed(&track)))
}

async fn handle_clear(guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let content = match bot.jukebox.clear(guild_id).await {
        0 => "There was no queue to clear.".to_string(),
        cleared => format!("🗑️ The queue has been cleared ({} songs).", cleared),
    };
    Ok(EditInteractionResponse::new().content(content))
}

async fn handle_reset(ctx: &Context, guild_id: GuildId, bot: &JukeboxBot) -> Reply {
    let report = bot.jukebox.reset(guild_id).await;
    Ok(EditInteractionResponse::new().embed(embeds::create_reset_embed(&bot.bot_name(ctx), &report)))
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Voice channel to join: the one named (case-insensitive) or the caller's own.
/// Reads the cache only; nothing here may hold a cache reference across an await.
fn find_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    name: Option<&str>,
) -> Result<(ChannelId, String), PlaybackError> {
    let guild = guild_id.to_guild_cached(&ctx.cache).ok_or_else(|| {
        PlaybackError::TransportUnavailable("this server is not available yet".into())
    })?;

    match name {
        Some(name) => {
            let wanted = name.to_lowercase();
            guild
                .channels
                .values()
                .find(|channel| {
                    channel.kind == ChannelType::Voice && channel.name.to_lowercase() == wanted
                })
                .map(|channel| (channel.id, channel.name.clone()))
                .ok_or_else(|| {
                    PlaybackError::TransportUnavailable(format!(
                        "there is no voice channel named **{}**",
                        name
                    ))
                })
        }
        None => {
            let channel_id = guild
                .voice_states
                .get(&user_id)
                .and_then(|state| state.channel_id)
                .ok_or_else(|| {
                    PlaybackError::TransportUnavailable("you are not in a voice channel".into())
                })?;
            let channel_name = guild
                .channels
                .get(&channel_id)
                .map_or_else(|| channel_id.to_string(), |channel| channel.name.clone());
            Ok((channel_id, channel_name))
        }
    }
}
