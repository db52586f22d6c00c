//! Thread identifier type

use core::fmt;

/// Identifier of a user-level thread
///
/// TIDs are positive integers handed out by the scheduler. The value 0 is
/// reserved for the implicit initial thread: the flow of control that first
/// touched the runtime.
///
/// TIDs are allocated as one more than the largest TID still alive, so a
/// value may be handed out again once its holder and every larger TID have
/// been collected.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Tid(u32);

impl Tid {
    /// The implicit initial thread
    pub const ROOT: Tid = Tid(0);

    /// Create a new Tid from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        Tid(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the implicit initial thread
    #[inline]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    /// The TID following this one, `None` once the space is used up
    #[inline]
    pub const fn next(self) -> Option<Tid> {
        match self.0.checked_add(1) {
            Some(id) => Some(Tid(id)),
            None => None,
        }
    }
}

impl From<u32> for Tid {
    #[inline]
    fn from(id: u32) -> Self {
        Tid(id)
    }
}

impl From<Tid> for u32 {
    #[inline]
    fn from(id: Tid) -> Self {
        id.0
    }
}

impl fmt::Debug for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "Tid(ROOT)")
        } else {
            write!(f, "Tid({})", self.0)
        }
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
