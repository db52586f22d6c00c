//! # uthread - user-level threads
//!
//! Many threads multiplexed on one OS thread, switched by hand-written
//! assembly and preempted by a CPU-time timer.
//!
//! ## Features
//!
//! - **Round robin**: one FIFO ready queue; the front is the running thread
//! - **Preemption**: SIGVTALRM at a configurable rate (100 Hz by default)
//! - **Join**: collect another thread's exit value, blocking until it exits
//! - **Guard pages**: every thread stack has an inaccessible page below it
//!
//! ## Quick Start
//!
//! ```ignore
//! use uthread::{create, join, yield_now};
//!
//! fn main() {
//!     let tid = create(|| {
//!         println!("Hello from thread {}", uthread::self_tid());
//!         yield_now();
//!         3
//!     })
//!     .unwrap();
//!
//!     assert_eq!(join(tid), Ok(3));
//! }
//! ```
//!
//! The first call to [`create`] turns the calling flow of control into
//! thread 0 and starts the runtime with [`RuntimeConfig::from_env`]. Call
//! [`init`] first to pick the configuration explicitly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │          create(), yield_now(), join(), exit()              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │           ready / blocked / zombie queues                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Context  │      │   Stack   │      │  Preempt  │
//!    │  switch   │      │  + guard  │      │ SIGVTALRM │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

// Re-export core types
pub use uthread_core::{
    Tid,
    ThreadState,
    Queue,
    Identity,
    QueueError,
    QueueResult,
    MemoryError,
    SchedError,
    SchedResult,
};

// Re-export kprint macros for debug logging
pub use uthread_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use uthread_core::kprint::{LogLevel, init as init_logging, set_log_level};

// Re-export env utilities
pub use uthread_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use uthread_runtime::{
    RuntimeConfig,
    ConfigError,
    RuntimeStats,
    PreemptGuard,
    PreemptError,
    init,
    stats,
};

/// Preemption control for the calling OS thread
pub mod preempt {
    pub use uthread_runtime::preempt::{disable, enable, is_armed, is_masked, ticks, PreemptGuard};
}

use uthread_runtime::scheduler;

/// Create a thread running `f`
///
/// The new thread goes to the tail of the ready queue; the caller keeps
/// running. Its return value is the thread's exit value.
///
/// # Example
///
/// ```ignore
/// let tid = uthread::create(|| 42)?;
/// assert_eq!(uthread::join(tid)?, 42);
/// ```
#[inline]
pub fn create<F>(f: F) -> SchedResult<Tid>
where
    F: FnOnce() -> i32 + 'static,
{
    scheduler::create(f)
}

/// TID of the calling thread
#[inline]
pub fn self_tid() -> Tid {
    scheduler::self_tid()
}

/// Let the next ready thread run
#[inline]
pub fn yield_now() {
    scheduler::yield_now()
}

/// Terminate the calling thread
///
/// Ends the process with `retval` when no other thread can run.
#[inline]
pub fn exit(retval: i32) -> ! {
    scheduler::exit(retval)
}

/// Wait for `tid` to exit and return its exit value
#[inline]
pub fn join(tid: Tid) -> SchedResult<i32> {
    scheduler::join(tid)
}
