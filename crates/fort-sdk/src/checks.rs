//! Contract checks for mirrored layouts.
//!
//! A failed [`check!`](crate::check) means a mirrored structure no longer
//! agrees with what the foreign runtime wrote (an index past `Num`, non-zero
//! slack bits, a free list that disagrees with its counter). Execution never
//! continues past one: the failure is logged and the thread panics, which
//! aborts the process in release builds (`panic = "abort"`).
//!
//! [`ensure_msgf!`](crate::ensure_msgf) is the advisory variant. It reports the
//! first failure of each call site and lets execution continue.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

#[doc(hidden)]
#[cold]
#[inline(never)]
pub fn check_failed(expr: &str, file: &str, line: u32, message: Option<fmt::Arguments<'_>>) -> ! {
    match message {
        Some(message) => {
            error!("CHECK FAILED: ({}) at {}:{} - {}", expr, file, line, message);
            panic!("CHECK FAILED: ({expr}) at {file}:{line} - {message}");
        }
        None => {
            error!("CHECK FAILED: ({}) at {}:{}", expr, file, line);
            panic!("CHECK FAILED: ({expr}) at {file}:{line}");
        }
    }
}

#[doc(hidden)]
#[cold]
#[inline(never)]
pub fn ensure_failed(
    expr: &str,
    file: &str,
    line: u32,
    message: fmt::Arguments<'_>,
    triggered: &AtomicBool,
) -> bool {
    if !triggered.swap(true, Ordering::Relaxed) {
        warn!("ENSURE FAILED: ({}) at {}:{} - {}", expr, file, line, message);
    }
    false
}

/// Fails hard when `expr` is false.
#[macro_export]
macro_rules! check {
    ($expr:expr $(,)?) => {
        if !($expr) {
            $crate::checks::check_failed(stringify!($expr), file!(), line!(), None)
        }
    };
}

/// Like [`check!`] with a formatted message.
#[macro_export]
macro_rules! checkf {
    ($expr:expr, $($arg:tt)+) => {
        if !($expr) {
            $crate::checks::check_failed(
                stringify!($expr),
                file!(),
                line!(),
                Some(format_args!($($arg)+)),
            )
        }
    };
}

/// [`check!`] that only runs in builds with debug assertions.
#[macro_export]
macro_rules! check_slow {
    ($expr:expr $(,)?) => {
        if cfg!(debug_assertions) {
            $crate::check!($expr);
        }
    };
}

/// Evaluates to `expr`. The first time a call site sees `false` it logs a
/// warning; later failures at the same site are silent.
#[macro_export]
macro_rules! ensure_msgf {
    ($expr:expr, $($arg:tt)+) => {{
        static TRIGGERED: ::std::sync::atomic::AtomicBool =
            ::std::sync::atomic::AtomicBool::new(false);
        if $expr {
            true
        } else {
            $crate::checks::ensure_failed(
                stringify!($expr),
                file!(),
                line!(),
                format_args!($($arg)+),
                &TRIGGERED,
            )
        }
    }};
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[test]
    fn test_check_passes() {
        let num = 3;
        crate::check!(num >= 0);
        crate::checkf!(num < 4, "num was {}", num);
        crate::check_slow!(num == 3);
    }

    #[test]
    #[should_panic(expected = "CHECK FAILED: (num > 10)")]
    fn test_check_fails() {
        let num = 3;
        crate::check!(num > 10);
    }

    #[test]
    #[should_panic(expected = "- num was 3")]
    fn test_checkf_includes_message() {
        let num = 3;
        crate::checkf!(num > 10, "num was {}", num);
    }

    #[test]
    fn test_ensure_returns_condition() {
        assert!(crate::ensure_msgf!(1 + 1 == 2, "math"));
        for _ in 0..3 {
            assert!(!crate::ensure_msgf!(1 + 1 == 3, "still false"));
        }
    }

    #[test]
    fn test_ensure_failed_sets_flag_once() {
        let triggered = AtomicBool::new(false);
        assert!(!ensure_failed("x", "file.rs", 1, format_args!("first"), &triggered));
        assert!(triggered.load(Ordering::Relaxed));
        assert!(!ensure_failed("x", "file.rs", 1, format_args!("second"), &triggered));
    }
}
