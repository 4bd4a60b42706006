//! Starter Bot
//!
//! A small bot built on Herald, talking to the console instead of a chat
//! platform: inbound events are JSON lines on stdin, outbound actions are
//! JSON lines on stdout.
//!
//! Routers, in dispatch order:
//! - `admin`: owner-only `/start`, `/ping` and `/stats` in private chats
//! - `groups`: deletes join/leave notices and lists mentioned usernames
//! - `personal`: `/start` greeting, owner `/ping`, reactions to photos and videos
//!
//! # Usage
//!
//! ```bash
//! cp demos/starter-bot/config.example.toml herald.toml
//! cargo run --package starter-bot -- --locales demos/starter-bot/l10n < events.jsonl
//! ```

mod console;
mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use herald::runtime::{ConfigLoader, HeraldRuntime};
use tracing::info;

use crate::console::ConsoleTransport;

#[derive(Debug, Parser)]
#[command(name = "starter-bot", version, about = "A Herald starter bot driven from the console")]
struct Cli {
    /// Configuration file (TOML, or YAML with the `yaml-config` feature).
    #[arg(short, long, env = "CONFIG_FILE_PATH")]
    config: Option<PathBuf>,

    /// Directory with one sub-directory of `.ftl` files per locale.
    #[arg(short, long)]
    locales: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if let Some(locales) = cli.locales {
        config.localization.locales_path = locales;
    }

    let runtime = HeraldRuntime::from_config(config).await?;
    let owners = runtime.owners().to_vec();

    let mut dispatcher = runtime.dispatcher();
    for router in handlers::routers(&owners) {
        dispatcher = dispatcher.include_router(router);
    }
    let dispatcher = dispatcher.build();

    let transport = Arc::new(ConsoleTransport::new(owners));
    info!("Reading events from stdin");
    runtime.core(dispatcher, transport).run(console::events()).await?;

    Ok(())
}
