//! Thread lifecycle states

use core::fmt;

/// State of a user-level thread
///
/// ```text
///   create ──► Ready ──yield──► Ready (tail)
///                │ ╲
///          join  │  ╲ exit
///                ▼   ▼
///           Blocked  Zombie ──join / reap──► Collected
///                │
///   target exits └──► Ready (tail)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Eligible to run; the front of the ready queue is the running thread
    Ready = 0,

    /// Suspended until a specific TID exits
    Blocked = 1,

    /// Exited, waiting for a joiner to observe it
    Zombie = 2,

    /// Exit observed; stack and record are being released
    Collected = 3,
}

impl ThreadState {
    /// Check if this state allows the thread to be scheduled
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ThreadState::Ready)
    }

    /// Check if the thread has exited (whether or not it was collected)
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, ThreadState::Zombie | ThreadState::Collected)
    }

    /// Check if moving from `self` to `next` is a legal transition
    pub const fn can_transition_to(&self, next: ThreadState) -> bool {
        matches!(
            (*self, next),
            (ThreadState::Ready, ThreadState::Ready)
                | (ThreadState::Ready, ThreadState::Blocked)
                | (ThreadState::Ready, ThreadState::Zombie)
                | (ThreadState::Blocked, ThreadState::Ready)
                | (ThreadState::Zombie, ThreadState::Collected)
        )
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
            ThreadState::Zombie => write!(f, "ZOMBIE"),
            ThreadState::Collected => write!(f, "COLLECTED"),
        }
    }
}
