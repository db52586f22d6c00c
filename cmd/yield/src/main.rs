//! Nested creation, yielding and joining
//!
//! Should print:
//!
//! ```text
//! thread1
//! thread2
//! thread3
//! return value7
//! ```

use uthread::{create, join, self_tid, yield_now, PreemptGuard, Tid};

/// Print a line with the tick masked so stdout's lock is never re-entered
fn say(args: std::fmt::Arguments<'_>) {
    let _guard = PreemptGuard::new();
    println!("{}", args);
}

fn thread3(arg: i32) -> i32 {
    yield_now();
    say(format_args!("thread{}", self_tid()));
    arg
}

fn thread2() -> i32 {
    let send_val = 7;
    let tid = create(move || thread3(send_val)).unwrap_or_else(|e| panic!("create: {}", e));

    assert!(join(Tid::ROOT).is_err());
    assert!(join(self_tid()).is_err());
    assert!(join(Tid::new(100)).is_err());
    say(format_args!("thread{}", self_tid()));
    yield_now();
    assert_eq!(self_tid(), Tid::new(2));

    let ret_val = join(tid).unwrap_or(0);
    assert!(join(tid).is_err());
    say(format_args!("return value{}", ret_val));
    5
}

fn thread1() -> i32 {
    if let Err(e) = create(thread2) {
        say(format_args!("create: {}", e));
    }
    say(format_args!("thread{}", self_tid()));
    yield_now();
    assert_eq!(self_tid(), Tid::new(1));
    yield_now();
    4
}

fn main() {
    let tid = create(thread1).unwrap_or_else(|e| panic!("create: {}", e));
    let ret_val = join(tid).unwrap_or(0);
    assert_eq!(ret_val, 4);

    // Let thread2 finish its checks
    let _ = join(Tid::new(2));
}
