//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Chatty modules (the tracking loop, the reconciler) declare the flag once
//! and can be silenced without touching `RUST_LOG`:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("tracking started");
//! ```

/// `log::trace!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::trace!($($arg)*);
        }
    };
}

/// `log::debug!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::info!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
