//! Error types for the lumigrid core.
//!
//! The long-running daemon must never die because of a misbehaving plugin or
//! a flaky bus, so most variants here are recovered close to where they occur
//! and only surface as status fields. Initial bus acquisition is the one
//! place a `Transport` error is treated as fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lumigrid operations.
#[derive(Debug, Error)]
pub enum LumigridError {
    // Plugin errors
    #[error("Animation not found: {0}")]
    PluginNotFound(String),

    #[error("Animation '{animation}' failed: {message}")]
    Plugin { animation: String, message: String },

    #[error("No animation is currently running")]
    NoActiveAnimation,

    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for lumigrid operations.
pub type Result<T> = std::result::Result<T, LumigridError>;

impl From<std::io::Error> for LumigridError {
    fn from(err: std::io::Error) -> Self {
        LumigridError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LumigridError {
    fn from(err: serde_json::Error) -> Self {
        LumigridError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LumigridError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LumigridError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a transport error from a bus write failure.
    pub fn bus(err: std::io::Error) -> Self {
        LumigridError::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a plugin error for the given animation.
    pub fn plugin(animation: impl Into<String>, message: impl Into<String>) -> Self {
        LumigridError::Plugin {
            animation: animation.into(),
            message: message.into(),
        }
    }

    /// Whether the error is recoverable inside the frame loop.
    ///
    /// Plugin and transport failures are absorbed by the loop (skip a frame,
    /// retry on the next); everything else is reported to the caller.
    pub fn is_frame_recoverable(&self) -> bool {
        matches!(
            self,
            LumigridError::Plugin { .. } | LumigridError::Transport { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LumigridError::PluginNotFound("rainbow".into());
        assert_eq!(err.to_string(), "Animation not found: rainbow");
    }

    #[test]
    fn test_frame_recoverable() {
        assert!(LumigridError::plugin("rainbow", "bad frame").is_frame_recoverable());
        assert!(LumigridError::Transport {
            message: "write failed".into(),
            source: None,
        }
        .is_frame_recoverable());
        assert!(!LumigridError::NoActiveAnimation.is_frame_recoverable());
    }
}
