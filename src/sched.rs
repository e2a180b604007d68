//! The per-thread scheduler: spawning, structured await, suspension,
//! wake-ups and the ready-queue drains.
//!
//! Scheduling is single-threaded and cooperative. Each thread that touches
//! the runtime owns an independent scheduler in thread-local storage; its
//! tasks run only on that thread and never migrate. The one cross-thread
//! entry point is [`TaskHandle::wake`], which goes through the owner's
//! mutex-protected ready queue and a notification hook, never through task
//! state itself.
//!
//! Control transfer works like a call: every switch site parks the running
//! continuation in the outgoing task's context slot and updates `current`
//! to the target before switching, so a resumed frame always finds
//! `current` already naming itself. Falling off the end of an entry closure
//! lands in [`task_entry`]'s epilogue, which hands control to the joiner if
//! there is one, else back to whoever ran the task last.

use std::cell::Cell;
use std::collections::VecDeque;
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};

use crate::arch;
use crate::ffi::Stack;
use crate::notify::{LoopSignal, WorkQueue};
use crate::task::{Entry, Task, TaskHandle};

thread_local! {
    /// Lazily created on a thread's first call into the runtime, torn down
    /// (queue, condvar, sentinel) when the thread exits.
    static SCHED: Scheduler = Scheduler::new();
}

/// How the owning thread is told that its ready queue gained an entry.
pub(crate) enum Notify {
    /// No external source attached: signal the condition variable that a
    /// top-level `join` sleeps on.
    Cond,
    /// A serial work queue drives the thread: post a closure that drains.
    Queue(Arc<dyn WorkQueue>),
    /// A host event loop drives the thread: signal it awake; it calls
    /// `drain_ready` back on the owning thread.
    Loop(Arc<dyn LoopSignal>),
}

pub(crate) struct Inner {
    ready: VecDeque<Arc<Task>>,
    notify: Notify,
}

/// The half of a thread's runtime that foreign threads may reach: the FIFO
/// ready queue and the means of signalling the owner. Everything else lives
/// in the thread-local [`Scheduler`] and never leaves its thread.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    cond: Condvar,
}

/// Per-thread runtime state. Owner-thread only.
pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    /// The task whose stack is executing right now. Every pointer stored
    /// here is backed by a live `Arc`: the sentinel by `root`, a running
    /// task by its resumer's suspended frame.
    current: Cell<*const Task>,
    /// Keeps the sentinel alive for the life of the thread.
    root: Arc<Task>,
}

impl Scheduler {
    fn new() -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                ready: VecDeque::new(),
                notify: Notify::Cond,
            }),
            cond: Condvar::new(),
        });
        let root = Arc::new(Task::sentinel(shared.clone()));

        Scheduler {
            current: Cell::new(Arc::as_ptr(&root)),
            shared,
            root,
        }
    }

    /// Park the running continuation and resume `target`.
    ///
    /// Returns when something switches back into the parked continuation;
    /// by then `current` names us again, courtesy of the resumer.
    fn switch_to(&self, target: *const Task) {
        let me = self.current.get();
        self.current.set(target);
        unsafe { arch::cswap((*me).ctx.get(), (*target).ctx.get()) };
    }

    /// Spawn a task and run it immediately, until it first suspends or
    /// completes. Only then does control fall back here and return the
    /// handle.
    fn spawn(&self, stack_size: usize, entry: Entry) -> TaskHandle {
        let task = Arc::new(Task::new(self.shared.clone(), entry));
        let stack = Stack::map(stack_size);
        let top = stack.top();
        unsafe { *task.stack.get() = Some(stack) };

        log::trace!("spawning a task on a {stack_size} byte stack");

        let me = self.current.get();
        task.caller.set(me);
        self.current.set(Arc::as_ptr(&task));
        unsafe {
            arch::stack_call(
                (*me).ctx.get(),
                task_entry,
                Arc::as_ptr(&task) as *mut (),
                top,
            );
        }

        TaskHandle { task }
    }

    /// Wait for `task` to complete, then reap it: the stack mapping goes
    /// exactly once, the result comes out.
    fn join(&self, task: &Arc<Task>) -> i64 {
        assert!(
            Arc::ptr_eq(&task.owner, &self.shared),
            "a task can only be joined by the thread that spawned it"
        );

        while !task.done.load(Ordering::Acquire) {
            let me = self.current.get();
            debug_assert!(
                task.awaiting.get().is_null(),
                "two tasks joined on the same task"
            );
            task.awaiting.set(me);

            let caller = unsafe { (*me).caller.get() };
            if caller.is_null() {
                // Top level: there is no other task to yield to, so this
                // thread has to drive the ready queue itself. Under an
                // attached source that would park the one thread expected
                // to service the source.
                let attached = {
                    let inner = self.shared.inner.lock().unwrap();
                    !matches!(inner.notify, Notify::Cond)
                };
                assert!(
                    !attached,
                    "top-level join would starve the attached event source"
                );
                self.run_all_blocking();
            } else {
                self.switch_to(caller);
            }
            task.awaiting.set(ptr::null());
        }

        let stack = unsafe { (*task.stack.get()).take() };
        drop(stack);
        unsafe { *task.result.get() }
    }

    /// Pop the head of the ready queue, optionally sleeping on the condvar
    /// first when it is empty. A single wait only: a spurious wake falls
    /// out as `None` and the join loop comes straight back.
    fn pop_ready(&self, block: bool) -> Option<Arc<Task>> {
        let mut inner = self.shared.inner.lock().unwrap();
        if block && inner.ready.is_empty() {
            inner = self.shared.cond.wait(inner).unwrap();
        }
        let task = inner.ready.pop_front();
        if let Some(task) = &task {
            task.queued.store(false, Ordering::Relaxed);
        }
        task
    }

    /// Run the task at the head of the ready queue, if any. Returns true
    /// iff a queue entry was consumed.
    fn run_next(&self) -> bool {
        match self.pop_ready(false) {
            Some(task) => {
                self.activate(task);
                true
            }
            None => false,
        }
    }

    /// Like [`run_next`](Self::run_next), but waits for a wake when the
    /// queue is empty. Only ever reached from a top-level `join`.
    fn run_all_blocking(&self) -> bool {
        match self.pop_ready(true) {
            Some(task) => {
                self.activate(task);
                true
            }
            None => false,
        }
    }

    /// Switch into a task popped off the ready queue.
    fn activate(&self, task: Arc<Task>) {
        if task.done.load(Ordering::Acquire) {
            // A wake raced with completion and left a dead entry behind;
            // the task's context is stale and must not be resumed.
            log::trace!("dropping a ready-queue entry for a finished task");
            return;
        }
        log::trace!("draining into a ready task");
        task.caller.set(self.current.get());
        self.switch_to(Arc::as_ptr(&task));
    }
}

/// First (and only) frame on every task stack.
///
/// Runs the entry closure, publishes the result, and hands control onward:
/// to the task blocked in `join` on us if there is one, otherwise back to
/// whoever resumed us last. This frame is never returned to, so the jump
/// out does not save a context.
///
/// `extern "C"` also means a panicking entry closure aborts the process at
/// this boundary instead of unwinding across foreign stack frames.
extern "C" fn task_entry(raw: *mut ()) -> ! {
    let task = unsafe { &*(raw as *const Task) };
    let entry = unsafe { (*task.entry.get()).take() }.expect("task entered twice");

    let result = entry();

    unsafe { *task.result.get() = result };
    task.done.store(true, Ordering::Release);
    log::trace!("task finished with result {result}");

    let awaiting = task.awaiting.get();
    let target = if awaiting.is_null() {
        task.caller.get()
    } else {
        awaiting
    };

    SCHED.with(|sched| {
        sched.current.set(target);
        unsafe { arch::cjump((*target).ctx.get()) }
    })
}

impl TaskHandle {
    /// Wait for the task to complete, then free its stack and return its
    /// result.
    ///
    /// Called from inside another task, this yields to the caller and is
    /// resumed when the awaited task finishes. Called at top level (outside
    /// any task), it parks the thread and services this thread's ready
    /// queue until the task is done, which is why a top-level `join` is
    /// forbidden (asserted) while an event loop or work queue is attached.
    ///
    /// Owner-thread only (asserted).
    pub fn join(self) -> i64 {
        SCHED.with(|sched| sched.join(&self.task))
    }

    /// Make a suspended task runnable and notify its owning thread.
    ///
    /// The one operation that is safe from any thread. Waking a task that
    /// is already on the ready queue coalesces into the existing entry;
    /// waking a finished task is a no-op.
    pub fn wake(&self) {
        let task = &self.task;
        assert!(
            !task.root,
            "the thread root cannot be woken; it is never on a ready queue"
        );
        if task.done.load(Ordering::Acquire) {
            // Nothing left to run; a queue entry must never outlive the
            // task's reap.
            return;
        }

        let shared = &task.owner;
        let mut inner = shared.inner.lock().unwrap();
        if !task.queued.load(Ordering::Relaxed) {
            task.queued.store(true, Ordering::Relaxed);
            inner.ready.push_back(task.clone());
            log::trace!("task woken; ready queue depth {}", inner.ready.len());
        }
        match &inner.notify {
            Notify::Cond => shared.cond.notify_one(),
            Notify::Queue(queue) => queue.post(Box::new(drain_ready)),
            Notify::Loop(signal) => signal.signal(),
        }
    }
}

/// Spawn a task with the given entry closure on a fresh `stack_size`-byte
/// stack.
///
/// The task runs immediately on the new stack; `call` returns once it first
/// suspends or completes. The closure (and everything it captures) is kept
/// alive until the task finishes.
pub fn call<F>(stack_size: usize, entry: F) -> TaskHandle
where
    F: FnOnce() -> i64 + 'static,
{
    SCHED.with(|sched| sched.spawn(stack_size, Box::new(entry)))
}

/// [`call`] for a bare function pointer plus argument, for call sites that
/// have no closure to give.
pub fn call_fn(stack_size: usize, entry: fn(*mut ()) -> i64, arg: *mut ()) -> TaskHandle {
    SCHED.with(|sched| sched.spawn(stack_size, Box::new(move || entry(arg))))
}

/// Suspend the current task and yield to whoever resumed it.
///
/// The task stays off the ready queue until somebody wakes it; there is no
/// implicit rescheduling. Suspending at top level is a programmer error:
/// the thread root has no caller to yield to.
pub fn suspend() {
    SCHED.with(|sched| {
        let me = sched.current.get();
        let caller = unsafe { (*me).caller.get() };
        assert!(
            !caller.is_null(),
            "suspend called at top level; the thread root has no caller to yield to"
        );
        sched.switch_to(caller);
    });
}

/// A handle to the currently running task, or the root sentinel when
/// called outside any task.
pub fn current() -> TaskHandle {
    SCHED.with(|sched| {
        let ptr = sched.current.get();
        if ptr == Arc::as_ptr(&sched.root) {
            return TaskHandle {
                task: sched.root.clone(),
            };
        }
        // A running non-root task is backed by a live Arc in its resumer's
        // suspended frame (see the `current` field invariant), so minting
        // one more reference from the raw pointer is fine.
        unsafe {
            Arc::increment_strong_count(ptr);
            TaskHandle {
                task: Arc::from_raw(ptr),
            }
        }
    })
}

/// Run every currently runnable task, until the ready queue is empty.
///
/// This is the drain an attached event loop or work queue runs on the
/// owning thread when signalled; it never blocks. Tasks that suspend again
/// mid-drain are not re-run unless re-woken.
pub fn drain_ready() {
    SCHED.with(|sched| while sched.run_next() {})
}

/// Swap the notification hook. Owner-thread only by construction: the hook
/// being replaced belongs to the calling thread's own runtime.
pub(crate) fn set_notify(notify: Notify) {
    SCHED.with(|sched| sched.shared.inner.lock().unwrap().notify = notify)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk `current`'s caller chain to its root, panicking if it loops.
    fn caller_chain_hops() -> usize {
        SCHED.with(|sched| {
            let mut hops = 0;
            let mut cursor = sched.current.get();
            while !cursor.is_null() {
                hops += 1;
                assert!(hops < 64, "caller chain loops");
                cursor = unsafe { (*cursor).caller.get() };
            }
            hops
        })
    }

    #[test]
    fn nested_spawns_keep_the_caller_chain_acyclic() {
        let outer = call(96 * 1024, || {
            let inner = call(64 * 1024, || caller_chain_hops() as i64);
            inner.join()
        });
        // inner -> outer -> sentinel
        assert_eq!(outer.join(), 3);
        assert_eq!(caller_chain_hops(), 1);
    }

    #[test]
    fn queued_flag_tracks_ready_queue_membership() {
        let task = call(64 * 1024, || {
            suspend();
            0
        });
        assert!(!task.task.queued.load(Ordering::Relaxed));

        task.wake();
        assert!(task.task.queued.load(Ordering::Relaxed));

        // A second wake coalesces into the existing entry.
        task.wake();
        SCHED.with(|sched| {
            assert_eq!(sched.shared.inner.lock().unwrap().ready.len(), 1);
        });

        drain_ready();
        assert!(!task.task.queued.load(Ordering::Relaxed));
        assert_eq!(task.join(), 0);
    }

    #[test]
    fn self_wake_then_suspend_yields_to_the_back_of_the_queue() {
        let task = call(64 * 1024, || {
            current().wake();
            suspend();
            1
        });
        assert!(!task.is_done());
        drain_ready();
        assert!(task.is_done());
        assert_eq!(task.join(), 1);
    }
}
