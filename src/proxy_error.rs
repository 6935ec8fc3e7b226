// src/proxy_error.rs
//! Error type for the cache and worker pool.
//!
//! Mirrors [`crate::error::BufferError`]'s shape (manual `Display`/`Error`
//! impls, `io`/`anyhow` conversions, a `ResultExt` trait, and a pair of
//! convenience macros) but carries the closed error set the reference
//! implementation uses for cache and pool operations: `{SUCCESS, ERROR,
//! NOT_FOUND}`. `Ok` stands in for `SUCCESS`; [`ProxyError`] carries the other
//! two.

use std::fmt;

/// Errors that can occur in the cache or worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Requested fingerprint is absent (cache `get`/`delete`).
    NotFound,
    /// Allocation failure, invalid argument, or invariant violation.
    Generic(String),
    /// I/O error (for compatibility with upstream/client socket errors).
    Io(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Generic(msg) => write!(f, "generic error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}

/// Convert `ProxyError` to `std::io::Error`.
impl From<ProxyError> for std::io::Error {
    fn from(err: ProxyError) -> Self {
        use std::io::ErrorKind;
        match err {
            ProxyError::NotFound => std::io::Error::new(ErrorKind::NotFound, err),
            ProxyError::Io(msg) => std::io::Error::new(ErrorKind::Other, msg),
            ProxyError::Generic(_) => std::io::Error::new(ErrorKind::Other, err),
        }
    }
}

/// Convert `std::io::Error` to `ProxyError`.
impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(err.to_string())
    }
}

/// Convert `ProxyError` to `anyhow::Error`.
#[cfg(feature = "anyhow")]
impl From<ProxyError> for anyhow::Error {
    fn from(err: ProxyError) -> Self {
        anyhow::anyhow!("{}", err)
    }
}

/// Allow using `?` with `anyhow::Error`.
#[cfg(feature = "anyhow")]
impl From<anyhow::Error> for ProxyError {
    fn from(err: anyhow::Error) -> Self {
        ProxyError::Generic(err.to_string())
    }
}

/// Result type alias used throughout the cache and pool.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Extension trait for converting `Result<T, ProxyError>` into other Result types.
pub trait ResultExt<T> {
    /// Convert to `anyhow::Result`.
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T>;

    /// Convert to `io::Result`.
    fn into_io(self) -> std::io::Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
    }

    fn into_io(self) -> std::io::Result<T> {
        self.map_err(|e| e.into())
    }
}

/// Convenience macro for converting a `ProxyError` result to any target error type.
#[macro_export]
macro_rules! proxy_op {
    ($expr:expr, $target:ty) => {
        $expr.map_err(|e: $crate::proxy_error::ProxyError| -> $target { e.into() })
    };
    ($expr:expr) => {
        $expr.map_err(|e: $crate::proxy_error::ProxyError| -> std::io::Error { e.into() })
    };
}

/// Try a fallible operation, converting its error with `From` on early return.
#[macro_export]
macro_rules! proxy_try {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => return Err(e.into()),
        }
    };
}
