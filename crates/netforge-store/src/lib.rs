//! Netforge Store - Persistence layer
//!
//! Provides:
//! - Atomic file primitives (temp→fsync→rename, mode-preserving copies)
//! - The staged config store over an active directory
//! - The checksummed, timestamped snapshot store
//!
//! All writes that replace a live file go through the atomic primitives so
//! a destination is always wholly old content or wholly new, never mixed.

pub mod config_store;
pub mod fsutil;
pub mod snapshot;

// Re-export key types
pub use config_store::ConfigStore;
pub use snapshot::{Snapshot, SnapshotMetadata, SnapshotStore};
