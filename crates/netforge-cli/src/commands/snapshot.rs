//! Snapshot commands
//!
//! Usage:
//!   netforge snapshot list
//!   netforge snapshot restore <id>
//!   netforge snapshot prune --keep <n>
//!   netforge snapshot delete <id>

use clap::{Args, Subcommand};
use netforge_core::errors::Result;
use netforge_engine::Engine;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// List snapshots, newest first
    List,
    /// Validate and restore a snapshot into the active directory
    Restore { id: String },
    /// Remove old snapshots, keeping the most recent ones
    Prune {
        /// Number of snapshots to keep
        #[arg(long, default_value_t = 100)]
        keep: usize,
    },
    /// Delete a single snapshot
    Delete { id: String },
}

pub fn execute(engine: &Engine, args: SnapshotArgs) -> Result<()> {
    match args.command {
        SnapshotCommand::List => {
            for snapshot in engine.snapshot_list()? {
                println!(
                    "{}  {}  [{}]  {}",
                    snapshot.id,
                    snapshot.metadata.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.metadata.configs.join(","),
                    snapshot.metadata.message
                );
            }
            Ok(())
        }
        SnapshotCommand::Restore { id } => {
            engine.snapshot_restore(&id)?;
            println!("Restored snapshot {id}");
            Ok(())
        }
        SnapshotCommand::Prune { keep } => {
            let deleted = engine.snapshot_prune(keep)?;
            for id in &deleted {
                println!("Deleted {id}");
            }
            println!("Pruned {} snapshot(s)", deleted.len());
            Ok(())
        }
        SnapshotCommand::Delete { id } => {
            engine.snapshot_delete(&id)?;
            println!("Deleted {id}");
            Ok(())
        }
    }
}
