//! In-process event bus
//!
//! Best-effort publish/subscribe for lifecycle events. Publishing never
//! blocks: events go onto a fixed-capacity queue and are dropped when it
//! is full. A single dispatcher thread drains the queue and invokes
//! subscriber callbacks behind a panic boundary, so one failing subscriber
//! cannot affect the others. Events from a single publisher reach each
//! subscriber in publish order; interleaving between subscribers is
//! unspecified. There is no replay and no durability.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Default capacity of the event queue
const DEFAULT_CAPACITY: usize = 100;

/// The fixed set of lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConfigChanged,
    ConfigCommitted,
    ConfigReverted,
    SnapshotCreated,
    TransactionStarted,
    TransactionCompleted,
    TransactionFailed,
    RollbackStarted,
}

impl EventKind {
    /// Dotted event name used in logs and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConfigChanged => "config.changed",
            EventKind::ConfigCommitted => "config.committed",
            EventKind::ConfigReverted => "config.reverted",
            EventKind::SnapshotCreated => "snapshot.created",
            EventKind::TransactionStarted => "transaction.started",
            EventKind::TransactionCompleted => "transaction.completed",
            EventKind::TransactionFailed => "transaction.failed",
            EventKind::RollbackStarted => "rollback.started",
        }
    }
}

/// A lifecycle event with a free-form payload
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl Event {
    /// Create an event
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Asynchronous publish/subscribe channel for lifecycle events
pub struct EventBus {
    handlers: Arc<Mutex<HashMap<EventKind, Vec<Handler>>>>,
    sender: Mutex<Option<SyncSender<Event>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus with the default queue capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit queue capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let handlers: Arc<Mutex<HashMap<EventKind, Vec<Handler>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (sender, receiver) = sync_channel::<Event>(capacity);

        let dispatch_handlers = Arc::clone(&handlers);
        let dispatcher = std::thread::spawn(move || {
            // Loop ends when the last sender is dropped on shutdown
            for event in receiver {
                let subscribers = {
                    let map = dispatch_handlers.lock().expect("handler map poisoned");
                    map.get(&event.kind).cloned().unwrap_or_default()
                };

                for handler in subscribers {
                    // Isolate each subscriber: a panic in one callback must
                    // not take down the dispatcher or the other subscribers.
                    let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
                    if result.is_err() {
                        tracing::warn!(event = event.kind.as_str(), "subscriber panicked");
                    }
                }
            }
        });

        Self {
            handlers,
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Register a callback for an event type
    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.handlers
            .lock()
            .expect("handler map poisoned")
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Publish an event; never blocks
    ///
    /// When the queue is full the event is dropped.
    pub fn publish(&self, event: Event) {
        let sender = self.sender.lock().expect("sender lock poisoned");
        let Some(sender) = sender.as_ref() else {
            return; // bus already shut down
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!(event = event.kind.as_str(), "event queue full, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Stop the dispatcher after draining queued events
    pub fn shutdown(&self) {
        // Dropping the sender ends the dispatcher's receive loop
        self.sender.lock().expect("sender lock poisoned").take();
        if let Some(handle) = self.dispatcher.lock().expect("dispatcher lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}
