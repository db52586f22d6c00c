//! x86_64 context switching implementation
//!
//! Naked functions with `naked_asm!`, stable since Rust 1.88.

use std::arch::naked_asm;

use uthread_core::constants::STACK_ALIGN;

/// Callee-saved registers (System V AMD64 ABI)
///
/// Field offsets are hard-coded in [`context_switch`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        Self { rsp: 0, rip: 0, rbx: 0, rbp: 0, r12: 0, r13: 0, r14: 0, r15: 0 }
    }
}

/// Initialize a new thread's context
///
/// Sets up the registers so that when switched to, execution begins in the
/// trampoline, which calls `entry_fn(entry_arg)`.
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
    // The trampoline's `call` pushes the return address, leaving the entry
    // function with rsp % 16 == 8 as the ABI expects.
    let aligned_sp = (stack_top as usize) & !(STACK_ALIGN - 1);

    let regs = &mut *regs;
    *regs = SavedRegs::zeroed();
    regs.rsp = aligned_sp as u64;
    regs.rip = entry_trampoline as usize as u64;
    regs.r12 = entry_fn as u64;
    regs.r13 = entry_arg as u64;
}

/// First code run on a new stack: `entry_fn(entry_arg)`, which never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Save callee-saved registers to `old_regs` and resume `new_regs`
///
/// Returns when some later switch resumes `old_regs`.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(
    _old_regs: *mut SavedRegs,
    _new_regs: *const SavedRegs,
) {
    naked_asm!(
        // Save callee-saved registers to old_regs (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from new_regs (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for a saved context
        "1:",
        "ret",
    );
}
