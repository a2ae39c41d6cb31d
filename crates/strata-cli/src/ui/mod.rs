//! Terminal output: status messages and build summaries.
//!
//! Everything is written to stderr. `--quiet` silences all but errors;
//! `--no-color`, `NO_COLOR` and non-terminal stderr disable colors.

mod format;
mod messages;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{error, info, success, warning};

static QUIET: AtomicBool = AtomicBool::new(false);

pub(crate) fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Whether colors should be used, from `NO_COLOR`, `FORCE_COLOR` and the
/// terminal.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the global output flags. Call once, early in `main`.
pub fn init_colors(no_color: bool, quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);

    let enabled = !no_color && should_use_color();
    owo_colors::set_override(enabled);
    console::set_colors_enabled_stderr(enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard(&'static str);

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            // SAFETY: tests touching the environment are #[serial].
            unsafe { std::env::set_var(key, value) };
            Self(key)
        }

        fn unset(key: &'static str) -> Self {
            // SAFETY: see `EnvGuard::set`.
            unsafe { std::env::remove_var(key) };
            Self(key)
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: see `EnvGuard::set`.
            unsafe { std::env::remove_var(self.0) };
        }
    }

    #[test]
    #[serial]
    fn test_no_color_wins() {
        let _no_color = EnvGuard::set("NO_COLOR", "1");
        let _force = EnvGuard::set("FORCE_COLOR", "1");
        assert!(!should_use_color());
    }

    #[test]
    #[serial]
    fn test_force_color_without_terminal() {
        let _no_color = EnvGuard::unset("NO_COLOR");
        let _force = EnvGuard::set("FORCE_COLOR", "1");
        assert!(should_use_color());
    }

    #[test]
    #[serial]
    fn test_quiet_flag_is_recorded() {
        let _no_color = EnvGuard::set("NO_COLOR", "1");
        init_colors(false, true);
        assert!(is_quiet());
        init_colors(true, false);
        assert!(!is_quiet());
    }
}
