//! Runtime configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's config file named by `UTHREAD_CONFIG_RS` (compile-time)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::RuntimeConfig;
//!
//! // Use defaults with env overrides
//! let config = RuntimeConfig::from_env();
//!
//! // Or customize programmatically
//! let config = RuntimeConfig::from_env()
//!     .enable_preempt(false)
//!     .stack_size(64 * 1024);
//! ```

pub mod defaults;

use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::env::{env_get, env_get_bool};
use uthread_core::error::SchedError;
use uthread_core::kprintln;

/// Largest accepted preemption frequency (one tick per microsecond)
pub const MAX_PREEMPT_HZ: u32 = 1_000_000;

/// Largest accepted per-thread stack size
pub const MAX_STACK_SIZE: usize = 1 << 30;

/// Runtime configuration with builder pattern.
///
/// Use `from_env()` to start with compile-time defaults and apply
/// any environment variable overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Preemption ticks per second of consumed CPU time
    pub preempt_hz: u32,
    /// Arm the virtual timer at init
    pub enable_preempt: bool,
    /// Usable stack bytes per created thread (guard page not included)
    pub stack_size: usize,
    /// Raise the log level to debug at init
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTHREAD_PREEMPT_HZ` - Preemption frequency
    /// - `UTHREAD_PREEMPT` - Enable timer preemption (0/1)
    /// - `UTHREAD_STACK_SIZE` - Stack size per thread
    /// - `UTHREAD_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            preempt_hz: env_get("UTHREAD_PREEMPT_HZ", base.preempt_hz),
            enable_preempt: env_get_bool("UTHREAD_PREEMPT", base.enable_preempt),
            stack_size: env_get("UTHREAD_STACK_SIZE", base.stack_size),
            debug_logging: env_get_bool("UTHREAD_DEBUG", base.debug_logging),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            preempt_hz: defaults::PREEMPT_HZ,
            enable_preempt: defaults::ENABLE_PREEMPT,
            stack_size: defaults::STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING || cfg!(feature = "debug-logging"),
        }
    }

    // Builder methods

    pub fn preempt_hz(mut self, hz: u32) -> Self {
        self.preempt_hz = hz;
        self
    }

    pub fn enable_preempt(mut self, enable: bool) -> Self {
        self.enable_preempt = enable;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preempt_hz == 0 {
            return Err(ConfigError::InvalidValue("preempt_hz must be > 0"));
        }
        if self.preempt_hz > MAX_PREEMPT_HZ {
            return Err(ConfigError::InvalidValue("preempt_hz must be <= 1000000"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.stack_size > MAX_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be <= 1GB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("uthread Configuration:");
        kprintln!("  preempt_hz:       {}", self.preempt_hz);
        kprintln!("  enable_preempt:   {}", self.enable_preempt);
        kprintln!("  stack_size:       {}", self.stack_size);
        kprintln!("  debug_logging:    {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => SchedError::InvalidArgument(msg),
        }
    }
}
