use netforge_core::errors::{apply_error, validation, Result};
use netforge_core::model::ConfigDocument;
use netforge_engine::{Applier, ApplyContext, Engine, EventBus, EventKind, Registry};
use netforge_store::{ConfigStore, SnapshotStore};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Seed for the `network` config: a scripted control section plus a
/// realistic interface section
pub const NETWORK_SEED: &str = "\
config main 'main'
\toption 'behavior' 'ok'

config interface 'wan'
\toption 'ipaddr' '192.168.1.1'
\toption 'netmask' '255.255.255.0'
\toption 'proto' 'static'
";

/// Test applier scripted through the document it receives
///
/// The `main` section's `behavior` option selects the outcome:
/// - `ok` — apply and validate succeed
/// - `fail_apply` — apply returns an applier error
/// - `fail_validate` — apply succeeds, validate rejects
///
/// A `delay_ms` option makes apply sleep in slices, checking the context
/// between them the way real appliers do between external commands.
pub struct ScriptedApplier {
    name: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
    last_behavior: String,
}

impl ScriptedApplier {
    pub fn new(name: &'static str, calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            calls,
            last_behavior: "ok".to_string(),
        }
    }

    fn record(&self, what: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", self.name, what));
    }
}

impl Applier for ScriptedApplier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&mut self, ctx: &ApplyContext, doc: &ConfigDocument) -> Result<()> {
        self.record("apply");

        let main = doc.section("main", "main");
        self.last_behavior = main
            .and_then(|s| s.option("behavior"))
            .unwrap_or("ok")
            .to_string();

        if let Some(delay_ms) = main.and_then(|s| s.option("delay_ms")) {
            let total: u64 = delay_ms.parse().unwrap_or(0);
            let mut remaining = total;
            while remaining > 0 {
                ctx.check()?;
                let slice = remaining.min(10);
                std::thread::sleep(Duration::from_millis(slice));
                remaining -= slice;
            }
            ctx.check()?;
        }

        if self.last_behavior == "fail_apply" {
            return Err(apply_error(self.name, "scripted apply failure"));
        }
        Ok(())
    }

    fn validate(&mut self, _ctx: &ApplyContext) -> Result<()> {
        self.record("validate");
        if self.last_behavior == "fail_validate" {
            return Err(validation("behavior", "fail_validate"));
        }
        Ok(())
    }

    fn rollback(&mut self, _ctx: &ApplyContext) -> Result<()> {
        self.record("rollback");
        Ok(())
    }
}

/// An engine over temp directories with one scripted `network` applier and
/// an event recorder subscribed to every event kind
pub struct Harness {
    pub engine: Engine,
    pub config: Arc<ConfigStore>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub events: Arc<Mutex<Vec<&'static str>>>,
    _dir: TempDir,
}

pub const ALL_EVENT_KINDS: &[EventKind] = &[
    EventKind::ConfigChanged,
    EventKind::ConfigCommitted,
    EventKind::ConfigReverted,
    EventKind::SnapshotCreated,
    EventKind::TransactionStarted,
    EventKind::TransactionCompleted,
    EventKind::TransactionFailed,
    EventKind::RollbackStarted,
];

pub fn setup() -> Harness {
    let dir = TempDir::new().unwrap();
    let active = dir.path().join("config");
    fs::create_dir_all(&active).unwrap();
    fs::write(active.join("network"), NETWORK_SEED).unwrap();

    let config = Arc::new(ConfigStore::new(&active));
    let snapshots = Arc::new(
        SnapshotStore::new(dir.path().join("snapshots"), &active).with_min_free_bytes(0),
    );

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    registry.register(Box::new(ScriptedApplier::new("network", Arc::clone(&calls))));

    let bus = Arc::new(EventBus::new());
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    for kind in ALL_EVENT_KINDS {
        let sink = Arc::clone(&events);
        bus.subscribe(*kind, move |event| {
            sink.lock().unwrap().push(event.kind.as_str());
        });
    }

    let engine = Engine::new(config.clone(), snapshots, Arc::new(registry), bus);

    Harness {
        engine,
        config,
        calls,
        events,
        _dir: dir,
    }
}

/// Recorded event names after draining the bus
#[allow(dead_code)]
pub fn drained_events(harness: &Harness) -> Vec<&'static str> {
    harness.engine.close();
    harness.events.lock().unwrap().clone()
}

/// Recorded applier calls
#[allow(dead_code)]
pub fn calls(harness: &Harness) -> Vec<String> {
    harness.calls.lock().unwrap().clone()
}
