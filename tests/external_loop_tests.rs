//! Cross-thread wakes and the external-source integrations: condvar
//! blocking, a mio event loop, and a serial work queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use mio::{Events, Poll, Token, Waker};

use stackful::{
    attach_event_loop, attach_work_queue, call, detach, drain_ready, suspend, TaskHandle,
    WorkQueue,
};

#[test]
fn wake_from_another_thread_completes_a_blocking_join() {
    let task = call(64 * 1024, || {
        suspend();
        77
    });

    let handle = task.clone();
    let remote = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.wake();
    });

    // Parks this thread on the runtime's condition variable until the wake
    // lands.
    assert_eq!(task.join(), 77);
    remote.join().unwrap();
}

#[test]
fn a_flock_of_tasks_survives_concurrent_wakes() {
    let tasks: Vec<TaskHandle> = (0..8i64)
        .map(|i| {
            call(64 * 1024, move || {
                suspend();
                suspend();
                i
            })
        })
        .collect();

    let stop = Arc::new(AtomicBool::new(false));
    let wakers: Vec<_> = (0..2)
        .map(|_| {
            let handles = tasks.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    for handle in &handles {
                        handle.wake();
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.join(), i as i64);
    }

    stop.store(true, Ordering::Relaxed);
    for waker in wakers {
        waker.join().unwrap();
    }
}

const WAKE_TOKEN: Token = Token(0);

#[test]
fn event_loop_drains_cross_thread_wakes() {
    let mut poll = Poll::new().unwrap();
    let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN).unwrap());
    attach_event_loop(waker.clone());

    let task = call(64 * 1024, || {
        suspend();
        11
    });

    let handle = task.clone();
    let remote = thread::spawn(move || handle.wake());

    // The loop, not a blocking drain, brings the task home.
    let mut events = Events::with_capacity(8);
    while !task.is_done() {
        poll.poll(&mut events, Some(Duration::from_secs(5))).unwrap();
        for event in events.iter() {
            assert_eq!(event.token(), WAKE_TOKEN);
        }
        drain_ready();
    }

    remote.join().unwrap();
    detach();
    assert_eq!(task.join(), 11);
}

#[test]
#[should_panic(expected = "top-level join")]
fn top_level_join_under_an_event_loop_panics() {
    let poll = Poll::new().unwrap();
    let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN).unwrap());
    attach_event_loop(waker);

    let task = call(64 * 1024, || {
        suspend();
        0
    });
    let _ = task.join();
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The simplest serial queue there is: an mpsc channel whose receiving end
/// the owning thread services in order.
struct ChannelQueue {
    jobs: Mutex<mpsc::Sender<Job>>,
}

impl WorkQueue for ChannelQueue {
    fn post(&self, job: Job) {
        let _ = self.jobs.lock().unwrap().send(job);
    }
}

#[test]
fn work_queue_receives_drain_jobs() {
    let (tx, rx) = mpsc::channel();
    attach_work_queue(Arc::new(ChannelQueue {
        jobs: Mutex::new(tx),
    }));

    let task = call(64 * 1024, || {
        suspend();
        3
    });

    let handle = task.clone();
    let remote = thread::spawn(move || handle.wake());

    // Play the part of the queue's owning thread: run posted jobs in order
    // until the task comes home.
    while !task.is_done() {
        let job = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        job();
    }

    remote.join().unwrap();
    detach();
    assert_eq!(task.join(), 3);
}
