//! Tagwatch
//!
//! Watches container-image registries for tags compatible with the ones
//! currently deployed, asks an operator over chat, and redeploys on
//! approval.
//!
//! Two entrypoints, both single-shot and scheduler-driven:
//! - `check`: one pass of the update detector and notifier
//! - `poll`: one feed batch of the approval loop (cursor, callback
//!   interpreter, manifest mutator, deployment trigger)
//!
//! Single-instance operation is assumed: cursor and manifest writes are
//! atomic but unlocked, so two concurrent runs interleave unpredictably.

mod checker;
mod compose;
mod config;
mod cursor;
mod deploy;
mod poller;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tagwatch_client::BotClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "tagwatch")]
#[command(about = "Container image update watcher with chat approval", long_about = None)]
struct Cli {
    /// Bot API token
    #[arg(long, env = "TAGWATCH_BOT_TOKEN")]
    bot_token: String,

    /// Chat id the notices and approvals go to
    #[arg(long, env = "TAGWATCH_CHAT_ID")]
    chat_id: String,

    /// Bot API base URL
    #[arg(
        long,
        env = "TAGWATCH_BOT_API_BASE",
        default_value = "https://api.telegram.org"
    )]
    bot_api_base: String,

    /// Container registry base URL
    #[arg(
        long,
        env = "TAGWATCH_REGISTRY_BASE",
        default_value = "https://registry.hub.docker.com"
    )]
    registry_base: String,

    /// Deployment manifest path
    #[arg(long, env = "TAGWATCH_COMPOSE_FILE")]
    compose_file: PathBuf,

    /// Feed cursor file path
    #[arg(
        long,
        env = "TAGWATCH_OFFSET_FILE",
        default_value = "tagwatch_offset.txt"
    )]
    offset_file: PathBuf,

    /// Image-to-service map (JSON object: repository -> service name)
    #[arg(long, env = "TAGWATCH_SERVICE_MAP")]
    service_map: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check deployed images for compatible newer tags and notify
    Check,
    /// Process one batch of the approval feed
    Poll,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config {
        bot_token: cli.bot_token,
        chat_id: cli.chat_id,
        bot_api_base: cli.bot_api_base,
        registry_base: cli.registry_base,
        compose_path: cli.compose_file,
        offset_path: cli.offset_file,
        service_map_path: cli.service_map,
    };
    config.validate()?;

    match cli.command {
        Commands::Check => {
            let checker = checker::UpdateChecker::new(config);
            let notified = checker.run_once().await?;
            info!("Check complete, {} notice(s) sent", notified);
        }
        Commands::Poll => {
            let service_map = config.load_service_map()?;
            let bot = BotClient::new(config.bot_url());
            let store = cursor::OffsetStore::new(config.offset_path.clone());
            let sink = poller::ComposeDeploySink::new(bot.clone(), config, service_map);

            let poller = poller::FeedPoller::new(bot, store, sink);
            let processed = poller.run_once().await?;
            info!("Poll complete, {} unit(s) processed", processed);
        }
    }

    Ok(())
}
