//! Hooking a runtime up to an external event source.
//!
//! With nothing attached, a top-level `join` parks its thread on a
//! condition variable and cross-thread wakes signal it. A thread that is
//! driven by an event loop or a serial work queue must never park like
//! that, so the runtime can route wake notifications through the source
//! instead:
//!
//! - an event loop registers a thread-safe [`LoopSignal`]; every wake
//!   signals it, and the host calls `drain_ready` on the owning thread when
//!   the loop dispatches. `mio::Waker` is the canonical signal: create one
//!   on the loop's registry, attach it here, and drain whenever its token
//!   comes out of `poll`.
//! - a serial work queue gets a drain closure posted per wake; the queue
//!   must run its closures serially on the owning thread.
//!
//! While a source is attached the runtime never blocks, and `join` may only
//! be called from inside a task. Attachment is per-thread and owner-only,
//! like everything except `wake`.

use std::sync::Arc;

use crate::sched::{set_notify, Notify};

/// A thread-safe nudge that gets an external event loop to run
/// `drain_ready` on the runtime's owning thread.
pub trait LoopSignal: Send + Sync + 'static {
    /// Deliverable from any thread; must not block. Failures have nowhere
    /// useful to go, so implementations log and carry on.
    fn signal(&self);
}

/// mio's cross-thread waker is exactly the right shape: `wake` forces the
/// owning `Poll` to return with the waker's token, at which point the host
/// drains.
impl LoopSignal for mio::Waker {
    fn signal(&self) {
        if let Err(err) = self.wake() {
            log::error!("failed to signal the attached event loop: {err:?}");
        }
    }
}

/// A serial work queue that runs posted closures on the runtime's owning
/// thread, in posting order.
pub trait WorkQueue: Send + Sync + 'static {
    fn post(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Route this thread's wake notifications to an event loop. Detaches any
/// prior source.
pub fn attach_event_loop(signal: Arc<dyn LoopSignal>) {
    set_notify(Notify::Loop(signal));
}

/// Route this thread's wake notifications to a serial work queue. Detaches
/// any prior source.
pub fn attach_work_queue(queue: Arc<dyn WorkQueue>) {
    set_notify(Notify::Queue(queue));
}

/// Drop any attached source and fall back to condition-variable
/// signalling.
///
/// Quiesce wakes first: a drain closure already in flight on a work queue
/// is harmless (it finds whatever is queued and runs it), but wakes issued
/// after detach will no longer reach the old source.
pub fn detach() {
    set_notify(Notify::Cond);
}
