use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod notify;
mod sources;
mod ui;

use crate::audio::{player::Jukebox, transport::SongbirdTransport};
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::notify::SerenityNotifier;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting guild-jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // One songbird manager backs both the voice transport and every track stream
    let manager = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));
    let resolver = Arc::new(YtDlpResolver::new(
        manager.clone(),
        config.max_playlist_size,
        config.default_volume,
    ));
    let jukebox = Arc::new(Jukebox::new(
        resolver,
        Arc::new(SongbirdTransport::new(manager.clone())),
        Arc::new(SerenityNotifier::new(http)),
    ));

    let shutdown = CancellationToken::new();
    let handler = JukeboxBot::new(config.clone(), jukebox, shutdown.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, stopping...");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("❌ Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let version = YtDlpResolver::version().await?;
    info!("yt-dlp {}", version);
    println!("OK");
    Ok(())
}
