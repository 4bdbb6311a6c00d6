//! Netforge Engine - Orchestration layer
//!
//! Sequences configuration commits through snapshot, disk write, ordered
//! apply, validation, an optional confirm-or-revert window, and rollback.
//! Provides:
//! - The applier capability and registry (network, firewall, dhcp)
//! - A cancellable external-command runner
//! - An asynchronous in-process event bus
//! - The transaction engine and its operation surface

pub mod appliers;
pub mod bus;
pub mod cmd;
pub mod ctx;
pub mod transaction;

// Re-export commonly used types
pub use appliers::{Applier, Registry};
pub use bus::{Event, EventBus, EventKind};
pub use ctx::ApplyContext;
pub use transaction::{Engine, TxState};
