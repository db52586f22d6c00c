//! Leveled stderr logging
//!
//! Level and flushing come from the environment on first use:
//!
//! - `UTHREAD_LOG_LEVEL` - `off`, `error`, `warn`, `info` (default), `debug`,
//!   `trace`, or the matching number 0-5
//! - `UTHREAD_FLUSH_EPRINT=1` - flush stderr after every line
//!
//! Writes are bracketed by the [`OutputGuard`] the runtime installs, which
//! keeps the preemption tick masked while the stderr lock is held.
//!
//! ```ignore
//! use uthread_core::{kdebug, kwarn};
//!
//! kdebug!("created thread {}", tid);
//! kwarn!("timer unavailable: {}", err);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Once, OnceLock};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Off,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Parse a level name or number; unknown values give `None`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::ALL.get(n).copied();
        }
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

/// Hooks bracketing every write: `enter` returns a token passed to `exit`
#[derive(Clone, Copy)]
pub struct OutputGuard {
    pub enter: fn() -> bool,
    pub exit: fn(bool),
}

static ENV_READ: Once = Once::new();
static FLUSH: AtomicBool = AtomicBool::new(false);
static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static GUARD: OnceLock<OutputGuard> = OnceLock::new();

/// Read the logging environment variables; later calls do nothing
pub fn init() {
    ENV_READ.call_once(|| {
        if let Ok(val) = std::env::var("UTHREAD_FLUSH_EPRINT") {
            FLUSH.store(matches!(val.as_str(), "1" | "true" | "yes" | "on"), Ordering::Relaxed);
        }
        if let Some(level) = std::env::var("UTHREAD_LOG_LEVEL").ok().and_then(|v| LogLevel::parse(&v)) {
            LEVEL.store(level as u8, Ordering::Relaxed);
        }
    });
}

/// Install the write guard. Only the first call takes effect.
pub fn set_output_guard(guard: OutputGuard) {
    let _ = GUARD.set(guard);
}

pub fn log_level() -> LogLevel {
    init();
    let raw = LEVEL.load(Ordering::Relaxed) as usize;
    LogLevel::ALL.get(raw).copied().unwrap_or(LogLevel::Trace)
}

/// Override the level; takes precedence over `UTHREAD_LOG_LEVEL`
pub fn set_log_level(level: LogLevel) {
    init();
    LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

fn write_line(tag: &str, args: std::fmt::Arguments<'_>) {
    let guard = GUARD.get().copied();
    let token = guard.map(|g| (g.enter)());

    {
        let mut err = std::io::stderr().lock();
        if !tag.is_empty() {
            let _ = write!(err, "{} ", tag);
        }
        let _ = err.write_fmt(args);
        let _ = err.write_all(b"\n");
        if FLUSH.load(Ordering::Relaxed) {
            let _ = err.flush();
        }
    }

    if let (Some(g), Some(token)) = (guard, token) {
        (g.exit)(token);
    }
}

#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    init();
    write_line("", args);
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if level_enabled(level) {
        write_line(level.tag(), args);
    }
}

/// Unconditional line on stderr, masked against preemption
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint::_kprintln_impl(format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::kprint::_kprintln_impl(format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::$level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!(Info, $($arg)*) };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!(Debug, $($arg)*) };
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!(Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("0"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("6"), None);
        assert_eq!(LogLevel::parse("chatty"), None);
    }

    #[test]
    fn test_set_level_filters() {
        set_log_level(LogLevel::Warn);
        assert!(level_enabled(LogLevel::Error));
        assert!(!level_enabled(LogLevel::Info));

        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));
        assert!(!level_enabled(LogLevel::Off));

        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
