//! Error types for dispatching.

use std::fmt;

use thiserror::Error;

/// Dispatch-specific errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Named navigation target does not exist.
    #[error("no route found named {0:?}")]
    RouteNotFound(String),

    /// Path generation was missing a required parameter.
    #[error("missing required parameter {param:?} for path {pattern}")]
    MissingParameter { pattern: String, param: String },

    /// A middleware step failed.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    /// A hook was referenced by name but never registered.
    #[error("no hook found named {0:?}")]
    HookNotFound(String),

    /// Invalid path pattern.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(String),

    /// A route with the same name is already registered.
    #[error("route named {0:?} already exists")]
    DuplicateRoute(String),

    /// Route table configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Route table file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    /// Returns the HTTP status attached to a middleware failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Middleware(err) => err.status,
            _ => None,
        }
    }
}

/// Failure raised by a middleware step.
///
/// The optional status code is used by the server when writing the error
/// response; without one the server falls back to 500.
#[derive(Debug)]
pub struct MiddlewareError {
    /// Human readable message.
    pub message: String,
    /// HTTP status to respond with.
    pub status: Option<u16>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl MiddlewareError {
    /// Creates a new middleware error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Attaches an HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the message followed by every cause in the chain, one per line.
    ///
    /// This is what the server writes in development mode.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut out = format!("Error: {}", self.message);
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str("\n    caused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MiddlewareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middleware_error_status() {
        let err: DispatchError = MiddlewareError::new("boom").with_status(403).into();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_detail_includes_causes() {
        let io = std::io::Error::other("disk gone");
        let err = MiddlewareError::new("boom").with_source(io);
        let detail = err.detail();
        assert!(detail.starts_with("Error: boom"));
        assert!(detail.contains("caused by: disk gone"));
    }
}
