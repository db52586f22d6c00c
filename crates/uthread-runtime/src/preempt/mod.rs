//! Timer-driven preemption
//!
//! A process-wide virtual interval timer raises SIGVTALRM at a fixed rate of
//! consumed CPU time. Each tick forces a yield on whichever OS thread it
//! lands on, provided that thread runs a scheduler.
//!
//! Scheduler bookkeeping runs with the tick masked via [`disable`] and
//! [`enable`] (or the scoped [`PreemptGuard`]), so a tick never observes a
//! half-updated queue.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    } else {
        compile_error!("uthread preemption requires a unix target");
    }
}

use core::fmt;
use core::marker::PhantomData;

/// Masks the preemption tick for its lifetime
///
/// Guards nest: dropping one restores the mask state seen at creation.
#[must_use = "preemption is re-enabled as soon as the guard is dropped"]
pub struct PreemptGuard {
    was_masked: bool,
    // Mask state is per OS thread
    _not_send: PhantomData<*const ()>,
}

impl PreemptGuard {
    pub fn new() -> Self {
        Self {
            was_masked: mask(),
            _not_send: PhantomData,
        }
    }
}

impl Default for PreemptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        restore(self.was_masked);
    }
}

/// Errors from [`start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptError {
    /// The timer has already been started in this process
    AlreadyStarted,

    /// Frequency of zero
    InvalidFrequency,

    /// Installing the tick handler failed
    Signal(nix::errno::Errno),

    /// Arming the interval timer failed
    Timer(nix::errno::Errno),
}

impl fmt::Display for PreemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreemptError::AlreadyStarted => write!(f, "preemption timer already started"),
            PreemptError::InvalidFrequency => write!(f, "preemption frequency must be > 0"),
            PreemptError::Signal(e) => write!(f, "failed to install tick handler: {}", e),
            PreemptError::Timer(e) => write!(f, "failed to arm virtual timer: {}", e),
        }
    }
}

impl std::error::Error for PreemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreemptError::Signal(e) | PreemptError::Timer(e) => Some(e),
            _ => None,
        }
    }
}
