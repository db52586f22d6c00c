//! Environment variable utilities
//!
//! Typed lookups with defaults, used by the runtime configuration and the
//! logging layer.
//!
//! ```ignore
//! use uthread_core::env::{env_get, env_get_bool};
//!
//! let hz: u32 = env_get("UTHREAD_PREEMPT_HZ", 100);
//! let preempt = env_get_bool("UTHREAD_PREEMPT", true);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// An unset variable and one that fails to parse both yield `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true, "0", "false",
/// "no", "off" are false. Anything else, including unset, gives `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__UTHREAD_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        let val: Option<u32> = env_get_opt("__UTHREAD_TEST_UNSET__");
        assert!(val.is_none());
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__UTHREAD_TEST_NUM__", " 123 ");
        let val: usize = env_get("__UTHREAD_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__UTHREAD_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__UTHREAD_TEST_INVALID__", "not_a_number");
        let val: usize = env_get("__UTHREAD_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__UTHREAD_TEST_INVALID__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for on in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__UTHREAD_TEST_BOOL__", on);
            assert!(env_get_bool("__UTHREAD_TEST_BOOL__", false), "{}", on);
        }
        for off in ["0", "false", "no", "OFF"] {
            std::env::set_var("__UTHREAD_TEST_BOOL__", off);
            assert!(!env_get_bool("__UTHREAD_TEST_BOOL__", true), "{}", off);
        }
        std::env::set_var("__UTHREAD_TEST_BOOL__", "garbage");
        assert!(env_get_bool("__UTHREAD_TEST_BOOL__", true));
        assert!(!env_get_bool("__UTHREAD_TEST_BOOL__", false));
        std::env::remove_var("__UTHREAD_TEST_BOOL__");

        assert!(env_get_bool("__UTHREAD_TEST_UNSET__", true));
    }
}
