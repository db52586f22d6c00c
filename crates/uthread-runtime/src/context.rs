//! Execution contexts
//!
//! A [`Context`] is the saved register set of a suspended thread. Contexts
//! of created threads are bound to a [`Stack`]; the initial thread's context
//! starts empty and is filled in the first time it switches away.

use crate::current_arch::{self, SavedRegs};
use crate::memory::Stack;

/// Entry point of a new context; receives the argument given to [`Context::new`]
pub type EntryFn = extern "C" fn(usize) -> !;

#[repr(transparent)]
#[derive(Debug, Clone, Copy)]
pub struct Context {
    regs: SavedRegs,
}

impl Context {
    /// A context that has not been saved yet
    pub const fn empty() -> Self {
        Self { regs: SavedRegs::zeroed() }
    }

    /// A context that starts running `entry(arg)` on `stack`
    pub fn new(stack: &Stack, entry: EntryFn, arg: usize) -> Self {
        let mut ctx = Self::empty();
        unsafe {
            current_arch::init_context(&mut ctx.regs, stack.top(), entry as usize, arg);
        }
        ctx
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

/// Save the running flow of control into `save` and resume `resume`
///
/// Returns when another switch resumes `save`.
///
/// # Safety
///
/// `resume` must come from [`Context::new`] or an earlier save, and its
/// stack must still be mapped. `save` must stay valid until it is resumed.
#[inline]
pub unsafe fn switch(save: *mut Context, resume: *const Context) {
    current_arch::context_switch(save.cast::<SavedRegs>(), resume.cast::<SavedRegs>());
}
