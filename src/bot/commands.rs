use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers every command globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers every command on one guild, for development
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        nowplaying_command(),
        queue_command(),
        remove_command(),
        clear_command(),
        reset_command(),
        help_command(),
    ]
}

// Voice

fn join_command() -> CreateCommand {
    CreateCommand::new("join")
        .description("Join your voice channel, or the named one")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "channel",
            "Voice channel name",
        ))
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave voice, stopping playback and clearing the queue")
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a link, playlist or search; resumes playback without a source")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "source",
            "URL, playlist URL or search terms",
        ))
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause playback")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume paused playback")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next song in the queue")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop the current song; keeps the queue")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the current song")
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a song from the queue, the last one by default")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "position", "Queue position")
                .min_int_value(1),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the queue")
}

fn reset_command() -> CreateCommand {
    CreateCommand::new("reset")
        .description("Stop playback, clear the queue and disconnect")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Show the available commands")
}
