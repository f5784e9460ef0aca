//! Error types for the log tail library.

use thiserror::Error;

/// The main error type for tailing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when opening, reading or stat-ing the followed file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The platform refused to report which file a handle refers to.
    #[error("File identity unavailable: {source}")]
    IdentityUnavailable {
        #[source]
        source: std::io::Error,
    },

    /// The configuration passed to `start` is not usable.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// File does not exist and the configuration does not allow waiting for it.
    #[error("File no longer exists: {path}")]
    FileNotFound { path: String },

    /// The tailer was asked to stop.
    #[error("Tailer stopped")]
    Cancelled,

    /// Stream has been closed or dropped.
    #[error("Stream closed")]
    StreamClosed,

    /// The background task panicked.
    #[error("Tail task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` if the error ends the follow loop instead of being
    /// reported on the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::StreamClosed)
    }

    /// Returns `true` for I/O errors of kind `NotFound`.
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// A convenient Result type for log tail operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => {}
            _ => panic!("Expected Error::Io variant"),
        }

        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_watcher_error_conversion() {
        let notify_error = notify::Error::generic("Test watcher error");
        let error: Error = notify_error.into();

        match error {
            Error::Watcher(_) => {}
            _ => panic!("Expected Error::Watcher variant"),
        }

        assert!(error.to_string().contains("File watcher error"));
        assert!(error.to_string().contains("Test watcher error"));
    }

    #[test]
    fn test_identity_unavailable_keeps_source() {
        let error = Error::IdentityUnavailable {
            source: IoError::new(ErrorKind::InvalidInput, "bad handle"),
        };

        assert_eq!(error.to_string(), "File identity unavailable: bad handle");
        let source = std::error::Error::source(&error).expect("source should be set");
        assert_eq!(source.to_string(), "bad handle");
    }

    #[test]
    fn test_invalid_config_error() {
        let error = Error::invalid_config("reopen requires follow");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: reopen requires follow"
        );
    }

    #[test]
    fn test_file_not_found_error() {
        let error = Error::FileNotFound {
            path: "/path/to/missing/file.log".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "File no longer exists: /path/to/missing/file.log"
        );
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(Error::Cancelled.is_terminal());
        assert!(Error::StreamClosed.is_terminal());
        assert!(!Error::Io(IoError::other("disk on fire")).is_terminal());
        assert!(!Error::FileNotFound { path: "a".into() }.is_terminal());
    }

    #[test]
    fn test_error_debug_format() {
        let error = Error::StreamClosed;
        let debug_str = format!("{:?}", error);
        assert_eq!(debug_str, "StreamClosed");
    }

    #[test]
    fn test_error_chain_with_io_error() {
        let io_error = IoError::new(ErrorKind::PermissionDenied, "Access denied");
        let error: Error = io_error.into();

        match &error {
            Error::Io(inner) => {
                assert_eq!(inner.kind(), ErrorKind::PermissionDenied);
                assert_eq!(inner.to_string(), "Access denied");
            }
            _ => panic!("Expected Error::Io variant"),
        }
    }

    #[test]
    fn test_error_send_sync_traits() {
        // Lines carry errors across the task boundary.
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
