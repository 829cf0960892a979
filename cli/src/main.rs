//! ensindex CLI: replay decoded registrar events and inspect the reconciled
//! registrar actions.
//!
//! Usage:
//! ```bash
//! ensindex replay   --config config/ens-mainnet.json --events events.json
//! ensindex replay   --config config/ens-mainnet.json --events events.json --db ./ensindex.db --ingest
//! ensindex validate --config config/ens-mainnet.json
//! ensindex info
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use ensindex_core::error::IndexerError;
use ensindex_core::handler::DecodedEvent;
use ensindex_core::indexer::IndexerConfig;
use ensindex_core::pricing::Pricing;
use ensindex_core::store::RegistrarStore;
use ensindex_core::subregistry::SubregistryId;
use ensindex_core::types::{to_hex, UnixTimestamp};
use ensindex_core::RegistrarAction;
use ensindex_evm::{IndexerBuilder, Ingestor, ProcessOutcome};
use ensindex_storage::InMemoryStorage;

mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "ensindex",
    about = "ENS registration lifecycle and registrar-action indexer",
    version
)]
struct Cli {
    /// Default log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Per-crate log level override, e.g. `ensindex-evm=debug` (repeatable)
    #[arg(long = "log", global = true)]
    log_overrides: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a file of decoded events and print the resulting actions
    Replay {
        /// Indexer configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// JSON array of decoded events, ordered by (block, log index) per chain
        #[arg(short, long)]
        events: PathBuf,
        /// SQLite database path (requires the `sqlite` feature); in-memory otherwise
        #[arg(long)]
        db: Option<PathBuf>,
        /// Route events through per-chain workers instead of one batch
        #[arg(long)]
        ingest: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a configuration file and list its contract bindings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show build and capability info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..LogConfig::default()
    }
    .with_overrides(&cli.log_overrides)?;
    init_tracing(&log_config);

    match cli.command {
        Commands::Replay {
            config,
            events,
            db,
            ingest,
            json,
        } => cmd_replay(&config, &events, db.as_deref(), ingest, json).await,
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<IndexerConfig> {
    IndexerConfig::from_file(path).with_context(|| format!("load config '{}'", path.display()))
}

async fn open_store(db: Option<&Path>) -> Result<Arc<dyn RegistrarStore>> {
    match db {
        None => Ok(Arc::new(InMemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        Some(path) => {
            let path = path.to_str().context("database path is not valid UTF-8")?;
            let store = ensindex_storage::SqliteStorage::open(path)
                .await
                .with_context(|| format!("open database '{path}'"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => anyhow::bail!("--db requires ensindex built with the `sqlite` feature"),
    }
}

async fn cmd_replay(
    config_path: &Path,
    events_path: &Path,
    db: Option<&Path>,
    ingest: bool,
    as_json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let names: HashMap<SubregistryId, String> = config
        .subregistries
        .iter()
        .map(|s| (SubregistryId::new(s.chain_id, s.registrar), s.name.clone()))
        .collect();
    let capacity = config.channel_capacity;
    let id = config.id.clone();

    let raw = std::fs::read_to_string(events_path)
        .with_context(|| format!("read events '{}'", events_path.display()))?;
    let events: Vec<DecodedEvent> = serde_json::from_str(&raw).context("parse events JSON")?;

    let store = open_store(db).await?;
    let processor = Arc::new(IndexerBuilder::from_config(config).build(Arc::clone(&store))?);
    info!(indexer = %id, events = events.len(), ingest, "replay started");

    let outcome = if ingest {
        let chains = processor.registry().chains();
        let ingestor = Ingestor::spawn(Arc::clone(&processor), &chains, capacity);
        for event in events {
            match ingestor.submit(event).await {
                Ok(()) => {}
                // the worker halted; its error surfaces from shutdown
                Err(IndexerError::Aborted { .. }) => break,
                Err(e) => warn!(error = %e, "event skipped"),
            }
        }
        let reports = ingestor.shutdown().await.context("ingestion halted")?;
        let mut total = ProcessOutcome::default();
        for report in &reports {
            info!(
                chain_id = report.chain_id,
                state = %report.state,
                last = ?report.last_position.map(|p| p.to_string()),
                "worker finished"
            );
            total.absorb(report.outcome);
        }
        total
    } else {
        processor
            .process_batch(&events)
            .await
            .context("replay halted")?
    };

    if as_json {
        print_json(store.as_ref(), &names, &outcome).await
    } else {
        print_summary(store.as_ref(), &names, &outcome).await
    }
}

async fn print_summary(
    store: &dyn RegistrarStore,
    names: &HashMap<SubregistryId, String>,
    outcome: &ProcessOutcome,
) -> Result<()> {
    println!(
        "Transactions: {} ({} replayed)  events: {} applied, {} ignored  coverage gaps: {}",
        outcome.transactions,
        outcome.replayed,
        outcome.events_applied,
        outcome.events_ignored,
        outcome.coverage_gaps
    );

    for subregistry in store.subregistries().await? {
        let name = names.get(&subregistry.id).map(String::as_str).unwrap_or("?");
        let actions = store.actions_by_subregistry(&subregistry.id).await?;
        println!("\n{name} ({}): {} action(s)", subregistry.id, actions.len());
        for action in &actions {
            let expires = store
                .lifecycle(&subregistry.id, &action.node)
                .await?
                .map(|l| format_timestamp(l.expires_at))
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:<12} {}  +{:<10} {:<28} referrer {:<42}  expires {}",
                action.action_type.to_string(),
                to_hex(action.node),
                action.incremental_duration.to_string(),
                format_pricing(&action.pricing),
                action
                    .referral
                    .info()
                    .map(|r| r.decoded_referrer.to_string())
                    .unwrap_or_else(|| "-".into()),
                expires
            );
        }
    }
    Ok(())
}

async fn print_json(
    store: &dyn RegistrarStore,
    names: &HashMap<SubregistryId, String>,
    outcome: &ProcessOutcome,
) -> Result<()> {
    let mut subregistries = Vec::new();
    for subregistry in store.subregistries().await? {
        let actions: Vec<RegistrarAction> = store.actions_by_subregistry(&subregistry.id).await?;
        subregistries.push(json!({
            "name": names.get(&subregistry.id),
            "id": subregistry.id.to_string(),
            "node": to_hex(subregistry.node),
            "actions": actions,
        }));
    }
    let out = json!({
        "transactions": outcome.transactions,
        "replayed": outcome.replayed,
        "eventsApplied": outcome.events_applied,
        "eventsIgnored": outcome.events_ignored,
        "coverageGaps": outcome.coverage_gaps,
        "subregistries": subregistries,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn format_pricing(pricing: &Pricing) -> String {
    match pricing.breakdown() {
        Some(p) => format!("{} wei ({} + {})", p.total(), p.base_cost(), p.premium()),
        None => "price unknown".into(),
    }
}

fn format_timestamp(ts: UnixTimestamp) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!(
        "Indexer '{}': {} subregistries, channel capacity {}",
        config.id,
        config.subregistries.len(),
        config.channel_capacity
    );
    for s in &config.subregistries {
        println!("  {} (chain {}): .{}", s.name, s.chain_id, s.managed_name);
        println!("    base registrar    {}", s.registrar);
        for c in &s.controllers {
            println!("    controller        {} ({:?})", c.address, c.generation);
        }
        for r in &s.renewal_referrers {
            println!("    renewal referrer  {r}");
        }
    }
    Ok(())
}

fn cmd_info() {
    println!("ENSIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Contract families: base registrar, registrar controller, renewal referrer");
    println!("  Controller generations: legacy, wrapped, unwrapped, unpriced");
    println!("  Default channel capacity: 1024 events per chain");
    println!(
        "  Storage backends: memory{}",
        if cfg!(feature = "sqlite") { ", SQLite" } else { " (SQLite: feature `sqlite`)" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_replay_flags() {
        let cli = Cli::parse_from([
            "ensindex",
            "replay",
            "-c",
            "cfg.json",
            "-e",
            "events.json",
            "--ingest",
            "--log",
            "ensindex-evm=debug",
        ]);
        assert_eq!(cli.log_overrides, vec!["ensindex-evm=debug".to_string()]);
        match cli.command {
            Commands::Replay { config, ingest, db, .. } => {
                assert_eq!(config, PathBuf::from("cfg.json"));
                assert!(ingest);
                assert!(db.is_none());
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn formats_expiry_as_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_pricing(&Pricing::Unknown), "price unknown");
    }
}
