//! Two tasks trading turns through `wake` + `drain_ready`, driven from the
//! thread root.
//!
//! ```bash
//! cargo run --bin ping-pong
//! ```

use stackful::{call, drain_ready, suspend, DEFAULT_STACK_SIZE};

fn main() {
    let ping = call(DEFAULT_STACK_SIZE, || {
        for i in 0..5 {
            println!("ping {i}");
            suspend();
        }
        5
    });

    let pong = call(DEFAULT_STACK_SIZE, || {
        for i in 0..5 {
            println!("pong {i}");
            suspend();
        }
        5
    });

    // Both tasks have already run up to their first suspension; keep waking
    // them until they fall through. Waking a finished task is a no-op.
    while !(ping.is_done() && pong.is_done()) {
        ping.wake();
        pong.wake();
        drain_ready();
    }

    println!("ping returned {}, pong returned {}", ping.join(), pong.join());
}
