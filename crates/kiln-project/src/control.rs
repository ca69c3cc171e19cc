//! Control surface for a running project loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable handle for posting pause, resume, and force-build requests
/// to a project loop. Requests are flags the loop observes at its own
/// phase boundaries; the handle never touches project state directly.
#[derive(Clone, Default)]
pub struct ProjectControl {
    inner: Arc<ControlInner>,
}

#[derive(Default)]
struct ControlInner {
    paused: AtomicBool,
    force: AtomicBool,
    wake: Notify,
}

impl ProjectControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend the loop at its next waiting boundary. A cycle already
    /// past that point runs to completion first.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Latch a build request and wake the loop if it is sleeping.
    pub fn force_build(&self) {
        self.inner.force.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub fn force_pending(&self) -> bool {
        self.inner.force.load(Ordering::SeqCst)
    }

    /// Consume the force latch. Returns true at most once per request.
    pub fn take_force(&self) -> bool {
        self.inner.force.swap(false, Ordering::SeqCst)
    }

    /// Wait until something posts a request worth re-checking.
    pub async fn woken(&self) {
        self.inner.wake.notified().await;
    }
}
