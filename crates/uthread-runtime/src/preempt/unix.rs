//! Unix preemption using SIGVTALRM and ITIMER_VIRTUAL

use super::PreemptError;
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Signal delivered on every tick
pub const TICK_SIGNAL: Signal = Signal::SIGVTALRM;

static STARTED: AtomicBool = AtomicBool::new(false);
static ARMED: AtomicBool = AtomicBool::new(false);
static TICKS: AtomicU64 = AtomicU64::new(0);

fn tick_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(TICK_SIGNAL);
    set
}

/// Install the tick handler and arm the timer at `hz` ticks per second
///
/// May succeed once per process. The timer measures CPU time consumed by
/// the process, so blocked or sleeping threads are never preempted.
pub fn start(hz: u32) -> Result<(), PreemptError> {
    if hz == 0 {
        return Err(PreemptError::InvalidFrequency);
    }
    if STARTED.swap(true, Ordering::SeqCst) {
        return Err(PreemptError::AlreadyStarted);
    }

    let action = SigAction::new(
        SigHandler::Handler(on_tick),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { signal::sigaction(TICK_SIGNAL, &action) }.map_err(PreemptError::Signal)?;

    let period_us = (1_000_000 / hz).max(1);
    let interval = libc::timeval {
        tv_sec: (period_us / 1_000_000) as libc::time_t,
        tv_usec: (period_us % 1_000_000) as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: interval,
        it_value: interval,
    };

    let ret = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, ptr::null_mut()) };
    if ret != 0 {
        return Err(PreemptError::Timer(Errno::last()));
    }

    ARMED.store(true, Ordering::SeqCst);
    Ok(())
}

/// Check if [`start`] has been called in this process
#[inline]
pub fn is_started() -> bool {
    STARTED.load(Ordering::Relaxed)
}

/// Check if the timer is actually running
#[inline]
pub fn is_armed() -> bool {
    ARMED.load(Ordering::Relaxed)
}

/// Number of ticks delivered so far
#[inline]
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Block the tick on the calling OS thread
///
/// Ticks raised while blocked stay pending until [`enable`].
#[inline]
pub fn disable() {
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&tick_set()), None);
}

/// Unblock the tick on the calling OS thread
#[inline]
pub fn enable() {
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&tick_set()), None);
}

/// Block the tick and report whether it was already blocked
pub fn mask() -> bool {
    let mut old = SigSet::empty();
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&tick_set()), Some(&mut old));
    old.contains(TICK_SIGNAL)
}

/// Undo a [`mask`] call given its return value
pub fn restore(was_masked: bool) {
    if !was_masked {
        enable();
    }
}

/// Check if the tick is blocked on the calling OS thread
pub fn is_masked() -> bool {
    let mut old = SigSet::empty();
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, None, Some(&mut old));
    old.contains(TICK_SIGNAL)
}

extern "C" fn on_tick(_signum: libc::c_int) {
    let saved_errno = Errno::last_raw();
    TICKS.fetch_add(1, Ordering::Relaxed);

    // Ticks landing on OS threads without a runtime are dropped
    if crate::tls::has_runtime() {
        crate::scheduler::preempt_tick();
    }

    Errno::set_raw(saved_errno);
}
