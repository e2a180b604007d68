//! Scheduler behaviour on a single thread: spawn/join round trips,
//! suspension, FIFO wake order, coalescing, and the assertion paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use stackful::{call, call_fn, current, drain_ready, suspend, TaskHandle};

#[test]
fn synchronous_task_returns_its_value() {
    let task = call(64 * 1024, || 42);
    assert!(task.is_done());
    assert_eq!(task.join(), 42);
}

#[test]
fn suspend_then_wake_resumes_after_the_suspend() {
    let task = call(64 * 1024, || {
        let x = 7;
        suspend();
        x + 1
    });
    assert!(!task.is_done());
    task.wake();
    assert_eq!(task.join(), 8);
}

#[test]
fn stack_locals_keep_their_addresses_across_suspension() {
    let task = call(64 * 1024, || {
        let local = 1234u64;
        let addr = &local as *const u64 as usize;
        suspend();
        assert_eq!(&local as *const u64 as usize, addr);
        local as i64
    });
    task.wake();
    assert_eq!(task.join(), 1234);
}

#[test]
fn nested_join_returns_the_inner_result() {
    let inner_slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));

    let slot = inner_slot.clone();
    let outer = call(128 * 1024, move || {
        let inner = call(64 * 1024, || {
            suspend();
            100
        });
        *slot.lock().unwrap() = Some(inner.clone());
        inner.join() + 1
    });

    let inner = inner_slot.lock().unwrap().clone().unwrap();
    assert!(!outer.is_done());
    assert!(!inner.is_done());

    inner.wake();
    assert_eq!(outer.join(), 101);
}

#[test]
fn wakes_run_in_fifo_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let spawn_logger = |tag: i64| {
        let order = order.clone();
        call(64 * 1024, move || {
            suspend();
            order.lock().unwrap().push(tag);
            tag
        })
    };
    let a = spawn_logger(1);
    let b = spawn_logger(2);

    a.wake();
    b.wake();
    drain_ready();

    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    assert_eq!(a.join(), 1);
    assert_eq!(b.join(), 2);
}

#[test]
fn duplicate_wakes_coalesce_into_one_activation() {
    let activations = Arc::new(AtomicUsize::new(0));

    let counter = activations.clone();
    let task = call(64 * 1024, move || {
        let mut rounds = 0;
        while rounds < 2 {
            suspend();
            counter.fetch_add(1, Ordering::SeqCst);
            rounds += 1;
        }
        0
    });

    task.wake();
    task.wake();
    task.wake();
    drain_ready();

    // Three wakes of an already-queued task, one activation.
    assert_eq!(activations.load(Ordering::SeqCst), 1);
    assert!(!task.is_done());

    task.wake();
    assert_eq!(task.join(), 0);
    assert_eq!(activations.load(Ordering::SeqCst), 2);
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn entry_closure_state_is_released_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let guard = DropCounter(drops.clone());

    let task = call(64 * 1024, move || {
        let _guard = guard;
        suspend();
        5
    });
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    task.wake();
    assert_eq!(task.join(), 5);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

fn twice(arg: *mut ()) -> i64 {
    (arg as usize as i64) * 2
}

#[test]
fn fn_pointer_entry_receives_its_argument() {
    let task = call_fn(64 * 1024, twice, 21 as *mut ());
    assert_eq!(task.join(), 42);
}

#[test]
fn current_names_the_running_task() {
    let root = current();

    let seen: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let task = call(64 * 1024, move || {
        *slot.lock().unwrap() = Some(current());
        0
    });

    let inside = seen.lock().unwrap().take().unwrap();
    assert_eq!(inside, task);
    assert_ne!(inside, root);
    assert_eq!(current(), root);
    assert_eq!(task.join(), 0);
}

#[test]
fn waking_a_finished_task_is_a_no_op() {
    let task = call(64 * 1024, || 9);
    assert!(task.is_done());

    let stale = task.clone();
    stale.wake();
    drain_ready();

    assert_eq!(task.join(), 9);
    // Even after the reap the stale clone stays safe to poke.
    stale.wake();
    assert!(stale.is_done());
}

#[test]
fn joining_from_a_foreign_thread_panics() {
    let task = call(64 * 1024, || {
        suspend();
        0
    });

    let stolen = task.clone();
    let result = thread::spawn(move || stolen.join()).join();
    assert!(result.is_err());

    task.wake();
    assert_eq!(task.join(), 0);
}

#[test]
#[should_panic(expected = "top level")]
fn suspending_the_thread_root_panics() {
    suspend();
}

#[test]
#[should_panic(expected = "thread root")]
fn waking_the_thread_root_panics() {
    current().wake();
}
