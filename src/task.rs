//! The task object and the public handle to it.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::arch::Context;
use crate::ffi::Stack;
use crate::sched::Shared;

/// A task's entry closure. It owns everything the task depends on and is
/// consumed on first activation, so anything captured lives at least until
/// the task finishes.
pub(crate) type Entry = Box<dyn FnOnce() -> i64 + 'static>;

/// A coroutine with its own stack, entry closure, result slot and scheduler
/// linkage. Heap-allocated behind an `Arc`; the stack itself is released by
/// the reaping `join`, not by the last handle.
pub(crate) struct Task {
    /// False until the entry closure returns; flips exactly once.
    pub(crate) done: AtomicBool,
    /// True iff the task sits on its owner's ready queue. Mutated only under
    /// the owner's queue mutex.
    pub(crate) queued: AtomicBool,
    /// The cross-thread half of the owning runtime; `wake` is routed here.
    /// Immutable after creation.
    pub(crate) owner: Arc<Shared>,
    /// Marks the per-thread root sentinel, which stands in for the thread's
    /// native stack and has no mapping or entry of its own.
    pub(crate) root: bool,
    /// Return slot, written by the trampoline on fall-through.
    pub(crate) result: UnsafeCell<i64>,
    /// Saved machine context. Valid to resume whenever the task is neither
    /// current nor done.
    pub(crate) ctx: UnsafeCell<Context>,
    /// The mapped stack region; taken exactly once at reap.
    pub(crate) stack: UnsafeCell<Option<Stack>>,
    /// Entry closure; taken on first activation.
    pub(crate) entry: UnsafeCell<Option<Entry>>,
    /// The task that most recently resumed this one, i.e. where control
    /// falls back to on suspension or completion. Rewritten on every switch
    /// into the task.
    pub(crate) caller: Cell<*const Task>,
    /// The task blocked in `join` on this one, if any.
    pub(crate) awaiting: Cell<*const Task>,
}

// Handles cross threads; that is the whole point of `wake`. The discipline
// making this sound: `done` and `queued` are atomic (and `queued` is only
// mutated under the owner's queue mutex), `owner` is immutable, and every
// other field is touched exclusively by the owning thread.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    pub(crate) fn new(owner: Arc<Shared>, entry: Entry) -> Self {
        Task {
            done: AtomicBool::new(false),
            queued: AtomicBool::new(false),
            owner,
            root: false,
            result: UnsafeCell::new(0),
            ctx: UnsafeCell::new(Context::default()),
            stack: UnsafeCell::new(None),
            entry: UnsafeCell::new(Some(entry)),
            caller: Cell::new(ptr::null()),
            awaiting: Cell::new(ptr::null()),
        }
    }

    /// The sentinel standing in for the thread's native stack. Never done,
    /// never queued, never reaped; its context slot is where the thread's
    /// own continuation gets parked while tasks run.
    pub(crate) fn sentinel(owner: Arc<Shared>) -> Self {
        Task {
            done: AtomicBool::new(false),
            queued: AtomicBool::new(false),
            owner,
            root: true,
            result: UnsafeCell::new(0),
            ctx: UnsafeCell::new(Context::default()),
            stack: UnsafeCell::new(None),
            entry: UnsafeCell::new(None),
            caller: Cell::new(ptr::null()),
            awaiting: Cell::new(ptr::null()),
        }
    }
}

/// A clonable handle to a spawned task.
///
/// Handles are `Send + Sync` so that foreign threads can [`wake`] the task;
/// everything else ([`join`], and running the task at all) stays with the
/// thread that spawned it. Clones compare equal iff they name the same task.
///
/// [`wake`]: TaskHandle::wake
/// [`join`]: TaskHandle::join
pub struct TaskHandle {
    pub(crate) task: Arc<Task>,
}

impl TaskHandle {
    /// Has the task's entry function returned? Non-blocking observation.
    pub fn is_done(&self) -> bool {
        self.task.done.load(Ordering::Acquire)
    }
}

impl Clone for TaskHandle {
    fn clone(&self) -> Self {
        TaskHandle {
            task: self.task.clone(),
        }
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.task, &other.task)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &Arc::as_ptr(&self.task))
            .field("done", &self.is_done())
            .finish()
    }
}
