//! Apply context: cancellation signal and deadline
//!
//! A cheap-clone handle passed to every applier call. Appliers observe
//! cancellation cooperatively between external command invocations; the
//! command runner additionally kills in-flight children when the context
//! fires.

use netforge_core::errors::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation signal plus optional deadline for applier work
#[derive(Debug, Clone)]
pub struct ApplyContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl ApplyContext {
    /// A context that never cancels and has no deadline
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Signal cancellation; all clones observe it
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancelled explicitly (deadline expiry is separate)
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// True once the deadline has passed
    pub fn deadline_exceeded(&self) -> bool {
        matches!(self.inner.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Fail fast with `Timeout` or `Cancelled` when the context has fired
    ///
    /// Appliers call this between external command invocations.
    pub fn check(&self) -> Result<()> {
        if self.deadline_exceeded() {
            return Err(Error::Timeout);
        }
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
