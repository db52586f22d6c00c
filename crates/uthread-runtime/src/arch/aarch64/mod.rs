//! aarch64 context switching implementation
//!
//! Saves x19-x30, sp and the low halves of v8-v15 (d8-d15), the
//! callee-saved set of AAPCS64.

use std::arch::naked_asm;

use uthread_core::constants::STACK_ALIGN;

/// Callee-saved registers (AAPCS64)
///
/// Field offsets are hard-coded in [`context_switch`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    /// x19..=x30 (x29 = fp, x30 = lr); 0x00
    pub x: [u64; 12],
    /// 0x60
    pub sp: u64,
    /// d8..=d15; 0x68
    pub d: [u64; 8],
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        Self { x: [0; 12], sp: 0, d: [0; 8] }
    }
}

/// Initialize a new thread's context
///
/// The first switch "returns" through x30 into the trampoline with the
/// entry function in x19 and its argument in x20.
///
/// # Safety
///
/// `regs` must point to valid SavedRegs memory.
/// `stack_top` must be the top of a mapped, writable stack.
#[inline]
pub unsafe fn init_context(
    regs: *mut SavedRegs,
    stack_top: *mut u8,
    entry_fn: usize,
    entry_arg: usize,
) {
    let regs = &mut *regs;
    *regs = SavedRegs::zeroed();
    regs.sp = ((stack_top as usize) & !(STACK_ALIGN - 1)) as u64;
    regs.x[0] = entry_fn as u64;
    regs.x[1] = entry_arg as u64;
    regs.x[11] = entry_trampoline as usize as u64;
}

/// First code run on a new stack: `entry_fn(entry_arg)`, which never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #0x1",
    );
}

/// Save callee-saved registers to `old_regs` and resume `new_regs`
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(
    _old_regs: *mut SavedRegs,
    _new_regs: *const SavedRegs,
) {
    naked_asm!(
        // Save to old_regs (x0)
        "stp x19, x20, [x0, #0x00]",
        "stp x21, x22, [x0, #0x10]",
        "stp x23, x24, [x0, #0x20]",
        "stp x25, x26, [x0, #0x30]",
        "stp x27, x28, [x0, #0x40]",
        "stp x29, x30, [x0, #0x50]",
        "mov x9, sp",
        "str x9, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new_regs (x1)
        "ldp x19, x20, [x1, #0x00]",
        "ldp x21, x22, [x1, #0x10]",
        "ldp x23, x24, [x1, #0x20]",
        "ldp x25, x26, [x1, #0x30]",
        "ldp x27, x28, [x1, #0x40]",
        "ldp x29, x30, [x1, #0x50]",
        "ldr x9, [x1, #0x60]",
        "mov sp, x9",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        // Continue at the restored lr
        "ret",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<SavedRegs>(), 0xA8);
        assert_eq!(core::mem::offset_of!(SavedRegs, sp), 0x60);
        assert_eq!(core::mem::offset_of!(SavedRegs, d), 0x68);
    }

    #[test]
    fn test_init_context_alignment() {
        let mut regs = SavedRegs::default();
        let mut fake_stack = [0u8; 64];
        let top = unsafe { fake_stack.as_mut_ptr().add(61) };
        unsafe { init_context(&mut regs, top, 0x1000, 0x2000) };

        assert_eq!(regs.sp % STACK_ALIGN as u64, 0);
        assert!(regs.sp <= top as u64);
        assert_eq!(regs.x[0], 0x1000);
        assert_eq!(regs.x[1], 0x2000);
        assert_eq!(regs.x[11], entry_trampoline as usize as u64);
    }
}
