//! Netforge CLI
//!
//! Command-line interface for the transactional router configuration
//! manager. Every subcommand maps 1:1 onto an engine operation.

use clap::{Parser, Subcommand};
use netforge_core::logging::{self, Profile};
use netforge_engine::{Engine, EventBus, Registry};
use netforge_store::{ConfigStore, SnapshotStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "netforge")]
#[command(about = "Transactional configuration manager for Linux routers", long_about = None)]
struct Cli {
    /// Active configuration directory
    #[arg(long, global = true, default_value = "/etc/config")]
    config_dir: PathBuf,

    /// Snapshot storage directory
    #[arg(long, global = true, default_value = "/var/lib/netforge/snapshots")]
    snapshot_dir: PathBuf,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a configuration document
    Show { name: String },
    /// Read an option via dotted path (config.section.option)
    Get { path: String },
    /// Stage an option change via dotted path
    Set { path: String, value: String },
    /// List configs with staged changes
    Changes,
    /// Drop all staged changes
    Revert,
    /// Commit staged changes (snapshot, write, apply, validate)
    Commit(commands::transaction::CommitArgs),
    /// Confirm a pending transaction before its window expires
    Confirm,
    /// Roll back to the most recent snapshot
    Rollback,
    /// Snapshot operations
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Run a single applier against its current config
    Apply { name: String },
}

fn main() {
    let cli = Cli::parse();

    logging::init(if cli.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let engine = build_engine(&cli.config_dir, &cli.snapshot_dir);

    let result = match cli.command {
        Commands::Show { name } => commands::config::show(&engine, &name),
        Commands::Get { path } => commands::config::get(&engine, &path),
        Commands::Set { path, value } => commands::config::set(&engine, &path, &value),
        Commands::Changes => commands::config::changes(&engine),
        Commands::Revert => commands::config::revert(&engine),
        Commands::Commit(args) => commands::transaction::commit(&engine, args),
        Commands::Confirm => commands::transaction::confirm(&engine),
        Commands::Rollback => commands::transaction::rollback(&engine),
        Commands::Snapshot(args) => commands::snapshot::execute(&engine, args),
        Commands::Apply { name } => commands::apply::execute(&engine, &name),
    };

    engine.close();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn build_engine(config_dir: &Path, snapshot_dir: &Path) -> Engine {
    let config = Arc::new(ConfigStore::new(config_dir));
    let snapshots = Arc::new(SnapshotStore::new(snapshot_dir, config_dir));
    let registry = Arc::new(Registry::with_defaults(Arc::clone(&config)));
    let bus = Arc::new(EventBus::new());

    Engine::new(config, snapshots, registry, bus)
}
