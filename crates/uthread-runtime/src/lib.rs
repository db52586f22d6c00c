//! # uthread-runtime
//!
//! Platform-specific runtime implementation for the uthread scheduler.
//!
//! This crate provides:
//! - Stack management (mmap with a guard page)
//! - Context switching (architecture-specific assembly)
//! - Timer preemption (SIGVTALRM driven by ITIMER_VIRTUAL)
//! - The per-OS-thread scheduler: create, yield, exit, join

pub mod config;
pub mod memory;
pub mod arch;
pub mod context;
pub mod preempt;
pub mod scheduler;
pub mod tls;

// Re-exports
pub use config::{ConfigError, RuntimeConfig};
pub use context::Context;
pub use memory::Stack;
pub use preempt::{PreemptError, PreemptGuard};
pub use scheduler::{create, exit, init, join, self_tid, stats, yield_now, RuntimeStats, Scheduler};

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
