//! Error types for the Car engine
//!
//! This module defines the error types used throughout the engine,
//! including device creation, resource management and usage errors,
//! plus the `engine_err!` / `engine_bail!` helpers that log an error
//! at the point where it is raised.

use std::fmt;

/// Result type for Car engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Car engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (context, renderer, subsystems)
    InitializationFailed(String),

    /// API misuse: wrong lifecycle state, out-of-range binding, static buffer growth
    UsageError(String),

    /// Asset could not be read from disk
    Io(String),

    /// Malformed binary or image data
    Format(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UsageError(msg) => write!(f, "Usage error: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Format(msg) => write!(f, "Format error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

// ===== ERROR MACROS =====

/// Log an ERROR (with file:line) and evaluate to `Error::BackendError`
///
/// # Example
///
/// ```no_run
/// # use car_engine::engine_err;
/// let err = engine_err!("car::vulkan", "vkCreateBuffer failed: {}", -2);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::car::Engine::log_detailed(
            $crate::car::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::car::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError)` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and evaluate to `Error::UsageError`
///
/// Used for recoverable API misuse: the caller gets an error value
/// but nothing was torn down.
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::car::Engine::log_detailed(
            $crate::car::log::LogSeverity::Warn,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::car::Error::UsageError(message)
    }};
}

/// Log a WARN and return `Err(Error::UsageError)` from the current function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
