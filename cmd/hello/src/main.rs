//! Hello world: one thread, one join
//!
//! # Environment Variables
//!
//! - `UTHREAD_LOG_LEVEL=debug` - Show runtime bookkeeping on stderr
//! - `UTHREAD_PREEMPT=0` - Run without the preemption timer

use uthread::{create, join, kinfo};

// UTHREAD_LOG_LEVEL=debug cargo run -p uthread-hello
fn main() {
    let send_val = 3;
    let tid = match create(move || {
        println!("Hello world!");
        send_val
    }) {
        Ok(tid) => tid,
        Err(e) => {
            eprintln!("create failed: {}", e);
            std::process::exit(1);
        }
    };

    let ret_val = join(tid).unwrap_or(0);
    kinfo!("thread {} returned {}", tid, ret_val);
    assert_eq!(ret_val, 3);
}
