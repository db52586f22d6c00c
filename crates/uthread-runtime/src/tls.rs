//! Thread-local storage for the per-OS-thread runtime
//!
//! Each OS thread owns at most one scheduler. It is leaked on install and
//! lives until the process exits.

use crate::scheduler::Scheduler;
use std::cell::Cell;
use std::ptr;

thread_local! {
    static RUNTIME: Cell<*mut Scheduler> = const { Cell::new(ptr::null_mut()) };
}

/// Install this OS thread's scheduler
#[inline]
pub(crate) fn set_runtime(sched: *mut Scheduler) {
    RUNTIME.with(|cell| cell.set(sched));
}

/// This OS thread's scheduler, or null before init
///
/// Also called from the tick handler, hence `try_with`.
#[inline]
pub(crate) fn runtime() -> *mut Scheduler {
    RUNTIME.try_with(|cell| cell.get()).unwrap_or(ptr::null_mut())
}

/// Check if the runtime is initialized on this OS thread
#[inline]
pub fn has_runtime() -> bool {
    !runtime().is_null()
}
