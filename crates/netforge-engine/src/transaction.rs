//! Transaction engine
//!
//! Sequences a commit through snapshot → write-to-disk → apply-in-order →
//! validate → optional confirm window → optional rollback. Only one
//! transaction may be in progress at a time; all state transitions happen
//! under a single engine lock, while applier work runs outside it with
//! `InProgress` excluding every competing operation. The confirm-or-revert
//! window protects against loss of remote administrative access: changes
//! not reaffirmed within the window are rolled back by a background timer.

use crate::appliers::Registry;
use crate::bus::{Event, EventBus, EventKind};
use crate::ctx::ApplyContext;
use netforge_core::errors::{not_found, Error, Result};
use netforge_store::{ConfigStore, Snapshot, SnapshotStore};
use serde_json::json;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default order in which changed configs are applied
pub const DEFAULT_APPLY_ORDER: &[&str] = &["network", "firewall", "dhcp"];

/// Transaction engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    InProgress,
    /// Applied successfully, waiting for confirmation
    Pending,
    Completed,
    /// Rollback failed; operator intervention required
    Failed,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Idle => "idle",
            TxState::InProgress => "in_progress",
            TxState::Pending => "pending",
            TxState::Completed => "completed",
            TxState::Failed => "failed",
        }
    }
}

/// Information about a transaction awaiting confirmation
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// Snapshot to roll back to when the window expires
    pub snapshot_id: String,
    /// Length of the confirm window
    pub timeout: Duration,
    /// When the window was armed
    pub started: Instant,
}

struct Inner {
    state: TxState,
    current_snapshot: Option<Snapshot>,
    pending: Option<PendingConfirmation>,
    /// Dropped (under the engine lock) by `confirm` to cancel the timer
    confirm_tx: Option<Sender<()>>,
    apply_order: Vec<String>,
}

struct Shared {
    config: Arc<ConfigStore>,
    snapshots: Arc<SnapshotStore>,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    inner: Mutex<Inner>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

/// The transaction engine and its operation surface
///
/// An engine is an explicit value created at startup and passed to every
/// operation; cloning hands out another handle to the same engine.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Create an engine over the given stores, appliers, and bus
    pub fn new(
        config: Arc<ConfigStore>,
        snapshots: Arc<SnapshotStore>,
        registry: Arc<Registry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                snapshots,
                registry,
                bus,
                inner: Mutex::new(Inner {
                    state: TxState::Idle,
                    current_snapshot: None,
                    pending: None,
                    confirm_tx: None,
                    apply_order: DEFAULT_APPLY_ORDER.iter().map(|s| s.to_string()).collect(),
                }),
                timers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Override the order in which configs are applied
    pub fn set_apply_order(&self, order: Vec<String>) {
        self.shared.lock_inner().apply_order = order;
    }

    /// Current engine state
    pub fn state(&self) -> TxState {
        self.shared.lock_inner().state
    }

    /// Pending confirmation info, if the engine is in the confirm window
    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        self.shared.lock_inner().pending.clone()
    }

    /// Time left to confirm; zero when nothing is pending
    pub fn remaining_confirm_time(&self) -> Duration {
        match &self.shared.lock_inner().pending {
            Some(pending) => pending.timeout.saturating_sub(pending.started.elapsed()),
            None => Duration::ZERO,
        }
    }

    // ===== Operation surface =====

    /// Emitted text form of a config (staged or on-disk)
    pub fn show(&self, name: &str) -> Result<String> {
        self.shared.config.show(name)
    }

    /// Resolve a dotted path to an option value
    pub fn get(&self, path: &str) -> Result<String> {
        self.shared.config.get(path)
    }

    /// Stage an option change
    pub fn set(&self, path: &str, value: &str) -> Result<()> {
        self.shared.config.set(path, value)?;
        self.shared
            .bus
            .publish(Event::new(EventKind::ConfigChanged, json!({ "path": path })));
        Ok(())
    }

    /// Names of configs with staged changes
    pub fn changes(&self) -> Vec<String> {
        self.shared.config.staged_names()
    }

    /// Drop all staged changes
    pub fn revert(&self) {
        self.shared.config.revert();
    }

    /// List snapshots, newest first
    pub fn snapshot_list(&self) -> Result<Vec<Snapshot>> {
        self.shared.snapshots.list()
    }

    /// Validate and restore a snapshot into the active directory
    pub fn snapshot_restore(&self, id: &str) -> Result<()> {
        self.shared.snapshots.restore(id)
    }

    /// Prune snapshots beyond `keep`, returning deleted ids
    pub fn snapshot_prune(&self, keep: usize) -> Result<Vec<String>> {
        self.shared.snapshots.prune(keep)
    }

    /// Delete a single snapshot
    pub fn snapshot_delete(&self, id: &str) -> Result<()> {
        self.shared.snapshots.delete(id)
    }

    /// Run a single applier against its current config
    ///
    /// Applier-only entry point used by service-manager integration; no
    /// snapshot and no confirm window.
    pub fn apply(&self, name: &str) -> Result<()> {
        let applier = self
            .shared
            .registry
            .get(name)
            .ok_or_else(|| not_found(format!("applier '{name}'")))?;

        let doc = self.shared.config.load(name)?;
        let ctx = ApplyContext::background();

        let mut applier = applier.lock().expect("applier lock poisoned");
        applier.apply(&ctx, &doc)?;
        applier.validate(&ctx)
    }

    /// Commit staged configuration changes
    ///
    /// `confirm_timeout` > 0 leaves the engine in `Pending` until
    /// [`Engine::confirm`] or expiry; `overall_timeout` bounds the whole
    /// commit (zero means unbounded). Blocks until the engine reaches
    /// `Idle` or enters `Pending`. A concurrent commit fails with `Busy`.
    pub fn commit(
        &self,
        message: &str,
        confirm_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<()> {
        let shared = &self.shared;

        let ctx = if overall_timeout.is_zero() {
            ApplyContext::background()
        } else {
            ApplyContext::with_timeout(overall_timeout)
        };

        let tx_id = Uuid::now_v7().to_string();

        let (changed, order) = {
            let mut inner = shared.lock_inner();

            if inner.state != TxState::Idle {
                return Err(Error::Busy {
                    state: inner.state.as_str().to_string(),
                });
            }
            if !shared.config.has_changes() {
                return Err(Error::NoChanges);
            }

            inner.state = TxState::InProgress;
            tracing::info!(tx_id = %tx_id, message = %message, "starting transaction");
            shared.bus.publish(Event::new(
                EventKind::TransactionStarted,
                json!({ "tx_id": &tx_id, "message": message }),
            ));

            let changed = shared.config.staged_names();

            // Snapshot before anything touches disk: a failure here is
            // pre-apply, nothing has changed, no rollback to run.
            let snapshot = match shared.snapshots.create(message, &changed) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    inner.state = TxState::Idle;
                    tracing::error!(error = %e, "failed to create snapshot");
                    return Err(e);
                }
            };
            shared
                .bus
                .publish(Event::new(EventKind::SnapshotCreated, json!(&snapshot.id)));
            inner.current_snapshot = Some(snapshot);

            (changed, inner.apply_order.clone())
        };

        // Flush staging and run the appliers without holding the engine
        // lock; `InProgress` excludes every competing transition.
        let result = shared.apply_changed(&ctx, &changed, &order);

        let mut inner = shared.lock_inner();
        if let Err(e) = result {
            tracing::error!(tx_id = %tx_id, error = %e, "commit failed, rolling back");
            return shared.fail_with_rollback(&mut inner, e);
        }

        shared
            .bus
            .publish(Event::new(EventKind::ConfigCommitted, json!(changed)));

        if !confirm_timeout.is_zero() {
            // Arm the confirm-or-revert window and hand the engine back
            inner.state = TxState::Pending;
            let snapshot_id = inner
                .current_snapshot
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default();
            inner.pending = Some(PendingConfirmation {
                snapshot_id,
                timeout: confirm_timeout,
                started: Instant::now(),
            });

            let (confirm_tx, confirm_rx) = mpsc::channel();
            inner.confirm_tx = Some(confirm_tx);

            let timer_shared = Arc::clone(shared);
            let handle = thread::spawn(move || {
                confirmation_timer(timer_shared, confirm_rx, confirm_timeout);
            });
            shared.timers.lock().expect("timer list poisoned").push(handle);

            tracing::info!(
                tx_id = %tx_id,
                timeout_secs = confirm_timeout.as_secs(),
                "transaction pending confirmation"
            );
            return Ok(());
        }

        inner.state = TxState::Completed;
        shared.bus.publish(Event::new(
            EventKind::TransactionCompleted,
            json!({ "tx_id": &tx_id }),
        ));

        // Completed collapses to Idle: the engine is ready for the next
        // transaction and the snapshot on disk remains the rollback target
        inner.state = TxState::Idle;
        inner.current_snapshot = None;

        tracing::info!(tx_id = %tx_id, "transaction completed");
        Ok(())
    }

    /// Confirm a pending transaction
    ///
    /// Once this returns Ok the timer can no longer roll back: the sender
    /// is dropped and the state leaves `Pending` under the same lock the
    /// timer must take before acting.
    pub fn confirm(&self) -> Result<()> {
        let mut inner = self.shared.lock_inner();

        if inner.state != TxState::Pending {
            return Err(Error::NoPending {
                state: inner.state.as_str().to_string(),
            });
        }

        inner.confirm_tx.take();
        inner.state = TxState::Completed;
        inner.pending = None;

        self.shared.bus.publish(Event::new(
            EventKind::TransactionCompleted,
            json!("confirmed"),
        ));

        inner.state = TxState::Idle;
        inner.current_snapshot = None;

        tracing::info!("transaction confirmed");
        Ok(())
    }

    /// Roll back to the current transaction's snapshot, or the most recent
    /// snapshot when no transaction is active
    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.shared.lock_inner();

        if inner.state == TxState::InProgress {
            return Err(Error::Busy {
                state: inner.state.as_str().to_string(),
            });
        }

        let ctx = ApplyContext::background();
        self.shared.rollback_locked(&mut inner, &ctx)
    }

    /// Join background timers and shut the event bus down
    pub fn close(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .shared
            .timers
            .lock()
            .expect("timer list poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.shared.bus.shutdown();
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("engine lock poisoned")
    }

    /// Flush the staging overlay, then apply and validate each changed
    /// config in order
    fn apply_changed(&self, ctx: &ApplyContext, changed: &[String], order: &[String]) -> Result<()> {
        self.config.commit()?;

        for name in order {
            ctx.check()?;
            if !changed.contains(name) {
                continue;
            }
            let Some(applier) = self.registry.get(name) else {
                continue; // unknown names in the order are skipped
            };

            let doc = self.config.load(name)?;
            let mut applier = applier.lock().expect("applier lock poisoned");

            tracing::info!(applier = %name, "applying configuration");
            applier.apply(ctx, &doc)?;

            tracing::info!(applier = %name, "validating configuration");
            applier.validate(ctx)?;
        }

        Ok(())
    }

    /// Roll back after a failed apply and report per the error contract:
    /// applied-and-rolled-back returns the original error; a rollback
    /// failure returns the composite and leaves the engine `Failed`.
    ///
    /// The rollback runs under a fresh context: the commit's context may
    /// already be expired or cancelled, and the restore must still happen.
    fn fail_with_rollback(&self, inner: &mut MutexGuard<'_, Inner>, cause: Error) -> Result<()> {
        let ctx = ApplyContext::background();
        match self.rollback_locked(inner, &ctx) {
            Ok(()) => Err(cause),
            Err(rollback_err) => {
                let mut details = vec![format!("commit: {cause}")];
                match rollback_err {
                    Error::Rollback { details: more } => details.extend(more),
                    other => details.push(other.to_string()),
                }
                Err(Error::Rollback { details })
            }
        }
    }

    /// Restore the snapshot and re-apply every config it contains
    ///
    /// Must be called with the engine lock held. On success the engine
    /// returns to `Idle`; on any failure it enters `Failed` and the
    /// on-disk configs may be a mixture requiring operator inspection.
    fn rollback_locked(&self, inner: &mut MutexGuard<'_, Inner>, ctx: &ApplyContext) -> Result<()> {
        if inner.current_snapshot.is_none() {
            inner.current_snapshot = match self.snapshots.latest()? {
                Some(snapshot) => Some(snapshot),
                None => return Err(not_found("snapshot to roll back to")),
            };
        }
        let snapshot = inner
            .current_snapshot
            .clone()
            .expect("snapshot resolved above");

        self.bus
            .publish(Event::new(EventKind::RollbackStarted, json!(&snapshot.id)));
        tracing::info!(snapshot_id = %snapshot.id, "rolling back to snapshot");

        if let Err(e) = self.snapshots.restore(&snapshot.id) {
            inner.state = TxState::Failed;
            self.bus.publish(Event::new(
                EventKind::TransactionFailed,
                json!({ "error": e.to_string() }),
            ));
            return Err(e);
        }

        // Re-apply every restored config, collecting per-config errors
        let mut details = Vec::new();
        for name in &snapshot.metadata.configs {
            if let Err(e) = ctx.check() {
                details.push(format!("{name}: {e}"));
                break;
            }
            let Some(applier) = self.registry.get(name) else {
                continue;
            };

            match self.config.load(name) {
                Ok(doc) => {
                    let mut applier = applier.lock().expect("applier lock poisoned");
                    if let Err(e) = applier.apply(ctx, &doc) {
                        details.push(format!("{name}: failed to apply: {e}"));
                    }
                }
                Err(e) => details.push(format!("{name}: failed to load: {e}")),
            }
        }

        if !details.is_empty() {
            inner.state = TxState::Failed;
            self.bus.publish(Event::new(
                EventKind::TransactionFailed,
                json!({ "details": details.clone() }),
            ));
            return Err(Error::Rollback { details });
        }

        inner.state = TxState::Idle;
        inner.current_snapshot = None;
        inner.pending = None;
        inner.confirm_tx = None;

        self.bus
            .publish(Event::new(EventKind::ConfigReverted, json!(&snapshot.id)));

        tracing::info!("rollback completed");
        Ok(())
    }
}

/// Wait out the confirm window; roll back unless confirmed first
///
/// `confirm` drops the sender under the engine lock, which wakes this
/// thread with `Disconnected`. On expiry the state is re-checked under the
/// lock so a confirm that won the race is never undone.
fn confirmation_timer(shared: Arc<Shared>, confirm_rx: mpsc::Receiver<()>, timeout: Duration) {
    match confirm_rx.recv_timeout(timeout) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        Err(RecvTimeoutError::Timeout) => {
            let mut inner = shared.lock_inner();
            if inner.state == TxState::Pending {
                tracing::warn!("confirmation timeout reached, rolling back changes");
                let ctx = ApplyContext::background();
                if let Err(e) = shared.rollback_locked(&mut inner, &ctx) {
                    tracing::error!(error = %e, "rollback after confirm timeout failed");
                }
            }
        }
    }
}
