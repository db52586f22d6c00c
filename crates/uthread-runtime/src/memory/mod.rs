//! Thread stack management
//!
//! Platform-specific implementations handle virtual memory allocation.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
    } else {
        compile_error!("uthread stacks require a unix target");
    }
}

use core::fmt;
use core::ptr::NonNull;
use uthread_core::constants::GUARD_SIZE;

/// A thread stack with an inaccessible guard page below it
///
/// The mapping is released when the stack is dropped, so a stack must
/// outlive every context that runs on it.
pub struct Stack {
    /// Lowest mapped address (start of the guard page)
    base: NonNull<u8>,

    /// Total mapped length, guard included
    len: usize,
}

impl Stack {
    /// Highest address of the stack (stack grows down)
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.len) }
    }

    /// Lowest usable address, just above the guard page
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(GUARD_SIZE) }
    }

    /// Start of the guard page
    #[inline]
    pub fn guard(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Usable bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.len - GUARD_SIZE
    }

    /// Check whether `addr` lies in the usable part of the stack
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr < self.top() as usize
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("size", &self.size())
            .finish()
    }
}
