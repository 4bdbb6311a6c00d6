//! Applier capability and registry
//!
//! An applier translates a parsed configuration document into side effects
//! on the running system, can check that the intended configuration is
//! live, and can roll back whatever state it captured before the most
//! recent apply. The registry maps stable names to appliers; the
//! transaction engine walks it in a fixed apply order.

pub mod dhcp;
pub mod firewall;
pub mod network;

use crate::ctx::ApplyContext;
use netforge_core::errors::Result;
use netforge_core::model::ConfigDocument;
use netforge_store::ConfigStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use dhcp::DhcpApplier;
pub use firewall::FirewallApplier;
pub use network::NetworkApplier;

/// Contract for subsystems that push configuration into the running system
///
/// `apply` must be safely re-runnable with the same input; the engine
/// re-invokes it during rollback with the restored document. Long-running
/// external commands must honor the context's cancellation signal.
pub trait Applier: Send {
    /// Stable name; also the config document this applier consumes
    fn name(&self) -> &'static str;

    /// Translate the document into system state
    fn apply(&mut self, ctx: &ApplyContext, doc: &ConfigDocument) -> Result<()>;

    /// Inspect live system state; Ok only when the intended configuration
    /// is present
    fn validate(&mut self, ctx: &ApplyContext) -> Result<()>;

    /// Restore whatever state was captured before the most recent apply
    fn rollback(&mut self, ctx: &ApplyContext) -> Result<()>;
}

/// Name → applier mapping
///
/// Appliers carry captured pre-state across calls, so each sits behind its
/// own mutex; the engine serializes a transaction's calls anyway, the lock
/// guards the standalone `apply(name)` entry point.
pub struct Registry {
    appliers: HashMap<&'static str, Mutex<Box<dyn Applier>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            appliers: HashMap::new(),
        }
    }

    /// Registry wired with the default applier set
    pub fn with_defaults(store: Arc<ConfigStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NetworkApplier::new()));
        registry.register(Box::new(FirewallApplier::new()));
        registry.register(Box::new(DhcpApplier::new(store)));
        registry
    }

    /// Register an applier under its own name
    pub fn register(&mut self, applier: Box<dyn Applier>) {
        self.appliers.insert(applier.name(), Mutex::new(applier));
    }

    /// Look up an applier by name
    pub fn get(&self, name: &str) -> Option<&Mutex<Box<dyn Applier>>> {
        self.appliers.get(name)
    }

    /// All registered applier names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.appliers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
