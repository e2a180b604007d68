//! A per-thread stackful coroutine runtime.
//!
//! Tasks are coroutines with real machine stacks: [`call`] spawns one and
//! runs it immediately on a fresh mapping, [`suspend`] parks it,
//! [`TaskHandle::wake`] (safe from any thread) makes it runnable again, and
//! [`TaskHandle::join`] waits for its result and reaps it. Because a
//! suspended task keeps its whole stack, pointers to its locals stay valid
//! across suspensions and suspension depth is bounded only by the task's
//! own stack.
//!
//! Everything works on a per-thread basis: each thread that spawns tasks
//! has its own scheduler, tasks never migrate, and parallelism comes from
//! running several such threads. Within a thread at most one task's code
//! runs at a time and there is no preemption; yields happen only at
//! `suspend`, at a `join` of an unfinished task, and inside `call` when the
//! new task first suspends.
//!
//! Two things deserve reading twice:
//!
//! - A `join` at top level (outside any `call`) BLOCKS THE THREAD until
//!   the awaited task completes. Tasks of this thread that get woken in the
//!   meantime will run, but the top-level `join` itself stays put.
//!
//! - If the thread is driven by an event loop or a serial work queue,
//!   register it with [`attach_event_loop`] / [`attach_work_queue`]. Wakes
//!   are then delivered through the source and the runtime never blocks.
//!   In exchange, a top-level `join` is forbidden (asserted), because it
//!   would park the very thread the source dispatches on.
//!
//! ```no_run
//! use stackful::{call, suspend, DEFAULT_STACK_SIZE};
//!
//! let task = call(DEFAULT_STACK_SIZE, || {
//!     let x = 7;
//!     suspend();
//!     x + 1
//! });
//! assert!(!task.is_done());
//! task.wake();
//! assert_eq!(task.join(), 8);
//! ```

mod arch;
mod ffi;
mod notify;
mod sched;
mod task;

pub use notify::{attach_event_loop, attach_work_queue, detach, LoopSignal, WorkQueue};
pub use sched::{call, call_fn, current, drain_ready, suspend};
pub use task::TaskHandle;

/// Stack handed to a task when the caller has no better estimate.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
