//! Preemption demo
//!
//! Every thread spins forever without yielding. Only timer ticks move the
//! CPU between them, until thread 3 ends the process.
//!
//! ```text
//! thread1
//! thread2
//! thread3
//! ```

use uthread::{create, self_tid, PreemptGuard, RuntimeConfig};

fn say(msg: &str) {
    let _guard = PreemptGuard::new();
    println!("{}{}", msg, self_tid());
}

fn spin() -> ! {
    loop {
        std::hint::spin_loop();
    }
}

fn thread3() -> i32 {
    say("thread");
    std::process::exit(0);
}

fn thread2() -> i32 {
    let _ = create(thread3);
    say("thread");
    spin()
}

fn thread1() -> i32 {
    let _ = create(thread2);
    say("thread");
    spin()
}

fn main() {
    let config = RuntimeConfig::from_env().enable_preempt(true);
    if let Err(e) = uthread::init(config) {
        eprintln!("init failed: {}", e);
        std::process::exit(1);
    }
    if !uthread::preempt::is_armed() {
        eprintln!("preemption timer unavailable; this demo would spin forever");
        std::process::exit(1);
    }

    // Starts running on the first tick
    let _ = create(thread1);
    spin()
}
