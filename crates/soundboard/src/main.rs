mod api;
mod bridge_sink;
mod cli;
mod config;

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use soundboard_core::coordinator::Coordinator;
use soundboard_core::events::EventBus;
use soundboard_core::quick_sounds::QuickSoundStore;

use crate::api::AppState;
use crate::bridge_sink::{BridgeClient, BridgeSink};

#[actix_web::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,soundboard=info,soundboard_core=info")
        }))
        .init();

    let file_cfg = match args.config.as_ref() {
        Some(path) => config::AppConfig::load(path)?,
        None => config::AppConfig::default(),
    };
    let cfg = config::resolve(file_cfg, &args)?;
    tracing::info!(
        bridge = %cfg.bridge_addr,
        channel = %cfg.channel,
        media_base_url = cfg.media_base_url.as_deref().unwrap_or(""),
        "soundboard starting"
    );

    let quick_sounds = QuickSoundStore::load(&cfg.quick_sounds_path)
        .with_context(|| format!("load quick sounds {:?}", cfg.quick_sounds_path))?;

    let client = BridgeClient::new(cfg.bridge_addr, cfg.token.clone());
    let sink = BridgeSink::new(client, cfg.media_base_url.clone(), cfg.status_poll);
    let events = EventBus::new();
    let mut coordinator = Coordinator::spawn(Box::new(sink), cfg.coordinator.clone(), events.clone());
    let handle = coordinator.handle();

    if cfg.connect_on_start {
        if let Err(err) = handle.connect(&cfg.channel) {
            tracing::warn!(channel = %cfg.channel, error = %err, "initial connect failed");
        }
    }

    {
        let handle = handle.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown requested");
            let _ = handle.shutdown();
            std::process::exit(130);
        })
        .context("install ctrl-c handler")?;
    }

    let state = web::Data::new(AppState::new(handle, events, quick_sounds, cfg.channel.clone()));
    tracing::info!(bind = %cfg.bind, "control api listening");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .disable_signals()
    .bind(cfg.bind)
    .with_context(|| format!("bind {}", cfg.bind))?
    .run()
    .await?;

    coordinator.shutdown();
    Ok(())
}
