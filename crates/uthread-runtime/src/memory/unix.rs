//! Unix stack implementation using mmap

use super::Stack;
use core::ptr::{self, NonNull};
use uthread_core::constants::{GUARD_SIZE, MIN_STACK_SIZE, PAGE_SIZE};
use uthread_core::error::MemoryError;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        const MAP_FLAGS: libc::c_int =
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE | libc::MAP_STACK;
    } else {
        const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    }
}

impl Stack {
    /// Map a stack of at least `size` usable bytes
    ///
    /// The size is rounded up to whole pages and one PROT_NONE guard page is
    /// placed below it, so an overflow faults instead of corrupting memory.
    pub fn allocate(size: usize) -> Result<Stack, MemoryError> {
        if size < MIN_STACK_SIZE {
            return Err(MemoryError::InvalidSize);
        }

        let usable = size
            .checked_add(PAGE_SIZE - 1)
            .map(|s| s & !(PAGE_SIZE - 1))
            .ok_or(MemoryError::InvalidSize)?;
        let len = usable
            .checked_add(GUARD_SIZE)
            .ok_or(MemoryError::InvalidSize)?;

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                MAP_FLAGS,
                -1,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed);
        }

        // Guard page at the low end
        let ret = unsafe { libc::mprotect(addr, GUARD_SIZE, libc::PROT_NONE) };
        if ret != 0 {
            unsafe { libc::munmap(addr, len) };
            return Err(MemoryError::ProtectionFailed);
        }

        let base = NonNull::new(addr as *mut u8).ok_or(MemoryError::AllocationFailed)?;
        Ok(Stack { base, len })
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_rounds_to_pages() {
        let stack = Stack::allocate(MIN_STACK_SIZE + 1).unwrap();
        assert_eq!(stack.size() % PAGE_SIZE, 0);
        assert!(stack.size() > MIN_STACK_SIZE);
        assert_eq!(stack.top() as usize % PAGE_SIZE, 0);
        assert_eq!(stack.bottom() as usize - stack.guard() as usize, GUARD_SIZE);
    }

    #[test]
    fn test_stack_is_writable() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        unsafe {
            ptr::write_bytes(stack.bottom(), 0xAB, stack.size());
            assert_eq!(*stack.top().sub(1), 0xAB);
            assert_eq!(*stack.bottom(), 0xAB);
        }
    }

    #[test]
    fn test_contains() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        assert!(stack.contains(stack.bottom() as usize));
        assert!(stack.contains(stack.top() as usize - 1));
        assert!(!stack.contains(stack.top() as usize));
        assert!(!stack.contains(stack.guard() as usize));
    }

    #[test]
    fn test_invalid_sizes() {
        assert_eq!(Stack::allocate(0).unwrap_err(), MemoryError::InvalidSize);
        assert_eq!(
            Stack::allocate(MIN_STACK_SIZE - 1).unwrap_err(),
            MemoryError::InvalidSize
        );
        assert_eq!(Stack::allocate(usize::MAX).unwrap_err(), MemoryError::InvalidSize);
    }
}
