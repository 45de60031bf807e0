//! `ratchet`: serve the learning core, or run one pass by hand.
//!
//! # Usage
//!
//! ```
//! ratchet --config ratchet.toml serve
//! ratchet mine
//! ratchet cycle
//! ratchet knowledge --entry-type rule_promotion --limit 20
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use ratchet_api::{ApiState, MiningTrigger};
use ratchet_core::{knowledge::EntryType, store::LearningStore};
use ratchet_engine::LearningEngine;
use ratchet_server::{Scheduler, ServerConfig, config::expand_tilde};
use ratchet_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Adaptive learning core: pattern mining and rule propagation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ratchet.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API and run the scheduler.
  Serve,
  /// Run one mining pass and print its report.
  Mine,
  /// Run one propagation cycle and print its report.
  Cycle,
  /// Print recent audit entries, newest first.
  Knowledge {
    #[arg(long, value_parser = parse_entry_type)]
    entry_type: Option<EntryType>,
    #[arg(long, default_value_t = 20)]
    limit:      usize,
  },
}

fn parse_entry_type(s: &str) -> Result<EntryType, String> {
  s.parse().map_err(|e: ratchet_core::Error| e.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let engine = Arc::new(
    LearningEngine::new(Arc::new(store), cfg.learning.clone(), cfg.propagation.clone())
      .with_lease_ttl(cfg.lease_ttl()),
  );

  match cli.command {
    Command::Serve => serve(engine, &cfg).await,
    Command::Mine => {
      let report = engine
        .mine_exclusive(Utc::now())
        .await
        .context("mining pass failed")?
        .context("a mining pass is already running against this store")?;
      print_json(&report)
    }
    Command::Cycle => {
      let report = engine
        .cycle_exclusive(Utc::now())
        .await
        .context("propagation cycle failed")?
        .context("a propagation cycle is already running against this store")?;
      print_json(&report)
    }
    Command::Knowledge { entry_type, limit } => {
      let entries = engine
        .store()
        .list_knowledge(entry_type, limit)
        .await
        .context("failed to read knowledge entries")?;
      print_json(&entries)
    }
  }
}

async fn serve(engine: Arc<LearningEngine<SqliteStore>>, cfg: &ServerConfig) -> anyhow::Result<()> {
  let mut state = ApiState::new(engine.clone());
  let mut scheduler = Scheduler::new(engine)
    .mining_every(cfg.mining_interval())
    .propagation_every(cfg.propagation_interval());
  if cfg.mine_every_executions > 0 {
    let trigger = Arc::new(MiningTrigger::new(cfg.mine_every_executions));
    state = state.with_trigger(trigger.clone());
    scheduler = scheduler.on_volume(trigger);
  }
  let scheduler = scheduler.spawn();

  let app = ratchet_server::app(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      tracing::info!("received SIGINT, shutting down");
    })
    .await
    .context("server error")?;

  scheduler.abort();
  Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
