//! # Bot Module
//!
//! Discord front end for the jukebox.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - Command and button handling ([`handlers`])
//! - Gateway events: ready, interactions, voice state updates
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`] trait. Every playback
//! operation goes through the shared [`Jukebox`]; the bot only translates
//! interactions into calls and results into replies.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::player::Jukebox, config::Config};

pub struct JukeboxBot {
    config: Arc<Config>,
    pub jukebox: Arc<Jukebox>,
    shutdown: CancellationToken,
    loops_started: AtomicBool,
}

impl JukeboxBot {
    pub fn new(config: Config, jukebox: Arc<Jukebox>, shutdown: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            jukebox,
            shutdown,
            loops_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name used in replies: `BOT_NAME`, or the gateway user name.
    pub fn bot_name(&self, ctx: &Context) -> String {
        self.config
            .bot_name
            .clone()
            .unwrap_or_else(|| ctx.cache.current_user().name.clone())
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands are registered globally, or on a single guild when `GUILD_ID`
    /// is set (faster propagation, useful for development).
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registering commands for guild {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registering commands globally");
                commands::register_global_commands(ctx).await?;
            }
        }

        info!("✅ Slash commands registered");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Failed to register commands: {:?}", e);
        }

        // `ready` fires again after every reconnect
        if !self.loops_started.swap(true, Ordering::SeqCst) {
            self.jukebox.spawn_background(
                self.shutdown.clone(),
                self.config.scheduler_tick(),
                self.config.ingest_tick(),
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("❌ Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("❌ Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Resets a server when the bot is disconnected from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        if old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            warn!("🔌 Voice disconnect without a guild");
            return;
        };

        info!("🔌 Bot disconnected from voice in guild {}", guild_id);
        self.jukebox.reset(guild_id).await;
    }
}
