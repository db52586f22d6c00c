//! # uthread-core
//!
//! Core types for the uthread (user-level thread) runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! All platform-specific implementations are in `uthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - Thread identifier type
//! - `state` - Thread lifecycle states
//! - `queue` - Generic FIFO queue used for all scheduler bookkeeping
//! - `error` - Error types
//! - `kprint` - Leveled stderr logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod queue;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::Tid;
pub use state::ThreadState;
pub use queue::{Queue, Identity, Iter, AllocError, NotEmpty};
pub use error::{QueueError, QueueResult, MemoryError, SchedError, SchedResult};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants for memory layout
pub mod constants {
    cfg_if::cfg_if! {
        if #[cfg(all(target_os = "macos", target_arch = "aarch64"))] {
            /// Page size (Apple Silicon uses 16 KB pages)
            pub const PAGE_SIZE: usize = 16 * 1024;
        } else {
            /// Page size (4 KB)
            pub const PAGE_SIZE: usize = 4096;
        }
    }

    /// Guard page below every thread stack
    pub const GUARD_SIZE: usize = PAGE_SIZE;

    /// Smallest stack the runtime will hand out
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Stack alignment required by both supported ABIs
    pub const STACK_ALIGN: usize = 16;
}
