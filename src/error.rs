//! Error types for the frame transport pipeline.
//!
//! Every fallible operation in the crate returns [`StreamError`]. The variants
//! fall into three groups that drive how the pipeline reacts:
//!
//! - **Connection lifecycle**: refused/timed out connects, closed sessions,
//!   malformed framing. These end a session (or, at startup, the process).
//! - **Frame local**: acquisition, compression and decompression failures.
//!   The stage that hit them skips the frame and keeps going.
//! - **Startup**: bind and configuration failures. Always fatal.
//!
//! ```rust
//! use framecast::StreamError;
//!
//! let error = StreamError::connection_closed("peer reset during payload");
//! assert!(error.is_session_ending());
//! assert!(!error.is_frame_local());
//!
//! let error = StreamError::decompression_corrupt("truncated deflate stream");
//! assert!(error.is_frame_local());
//! ```

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for streaming operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for streaming operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Connection to {addr} refused")]
    ConnectionRefused {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connecting to {addr} timed out after {duration:?}")]
    ConnectTimeout { addr: String, duration: Duration },

    #[error("Gave up connecting to {addr} after {attempts} attempts")]
    RetriesExhausted {
        addr: String,
        attempts: u32,
        #[source]
        last_error: Box<StreamError>,
    },

    #[error("Connection closed: {context}")]
    ConnectionClosed {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Malformed wire header: {details}")]
    MalformedHeader { details: String },

    #[error("Failed to listen on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame acquisition unavailable: {reason}")]
    AcquisitionUnavailable { reason: String },

    #[error("Compression rejected frame: {reason}")]
    CompressionRejected { reason: String },

    #[error("Corrupt frame could not be decompressed: {reason}")]
    DecompressionCorrupt { reason: String },

    #[error("Invalid configuration for '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("Failed to load configuration from {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Operation cancelled by shutdown")]
    Cancelled,

    #[error("I/O error during {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Returns whether a fresh attempt at the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::ConnectionRefused { .. } => true,
            StreamError::ConnectTimeout { .. } => true,
            StreamError::Timeout { .. } => true,
            StreamError::AcquisitionUnavailable { .. } => true,
            StreamError::RetriesExhausted { .. } => false,
            StreamError::ConnectionClosed { .. } => false,
            StreamError::MalformedHeader { .. } => false,
            StreamError::Bind { .. } => false,
            StreamError::CompressionRejected { .. } => false,
            StreamError::DecompressionCorrupt { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::ConfigFile { .. } => false,
            StreamError::Cancelled => false,
            StreamError::Io { .. } => false,
        }
    }

    /// Returns whether this error tears down the current connection session.
    ///
    /// Malformed framing counts as session-ending: once the length prefix
    /// can't be trusted, nothing after it can be either.
    pub fn is_session_ending(&self) -> bool {
        matches!(
            self,
            StreamError::ConnectionClosed { .. }
                | StreamError::MalformedHeader { .. }
                | StreamError::Timeout { .. }
                | StreamError::Io { .. }
        )
    }

    /// Returns whether this error only affects a single frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            StreamError::AcquisitionUnavailable { .. }
                | StreamError::CompressionRejected { .. }
                | StreamError::DecompressionCorrupt { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::ConnectionRefused { .. } | StreamError::RetriesExhausted { .. } => vec![
                "Make sure the sender is running first",
                "Check the peer address and port",
                "Check that no firewall blocks the port",
            ],
            StreamError::ConnectTimeout { .. } | StreamError::Timeout { .. } => vec![
                "Check network reachability of the peer",
                "Increase the configured timeout",
            ],
            StreamError::ConnectionClosed { .. } => vec![
                "The peer went away; restart the receiver to open a new session",
                "Check the sender logs for write failures",
            ],
            StreamError::MalformedHeader { .. } => vec![
                "Make sure both ends speak the same wire protocol",
                "Raise the maximum frame length if frames are legitimately large",
            ],
            StreamError::Bind { .. } => vec![
                "Check that the port is not already in use",
                "Use a port above 1024 or run with sufficient privileges",
            ],
            StreamError::AcquisitionUnavailable { .. } => vec![
                "Check that the capture device is connected",
                "Try a different device index",
            ],
            StreamError::CompressionRejected { .. } => vec![
                "Check the image dimensions and pixel format",
                "Try a different quality setting",
            ],
            StreamError::DecompressionCorrupt { .. } => vec![
                "Check that sender and receiver use the same codec",
                "Inspect the network path for corruption",
            ],
            StreamError::Config { .. } | StreamError::ConfigFile { .. } => vec![
                "Check the configuration file syntax",
                "Run with --help to see accepted values",
            ],
            StreamError::Cancelled => vec!["No action needed; shutdown was requested"],
            StreamError::Io { .. } => vec![
                "Check system resources (file descriptors, memory)",
                "Retry the operation",
            ],
        }
    }

    /// Helper constructor for closed sessions without an underlying I/O error.
    pub fn connection_closed(context: impl Into<String>) -> Self {
        StreamError::ConnectionClosed { context: context.into(), source: None }
    }

    /// Helper constructor for malformed wire headers.
    pub fn malformed_header(details: impl Into<String>) -> Self {
        StreamError::MalformedHeader { details: details.into() }
    }

    /// Helper constructor for acquisition failures.
    pub fn acquisition_unavailable(reason: impl Into<String>) -> Self {
        StreamError::AcquisitionUnavailable { reason: reason.into() }
    }

    /// Helper constructor for compression failures.
    pub fn compression_rejected(reason: impl Into<String>) -> Self {
        StreamError::CompressionRejected { reason: reason.into() }
    }

    /// Helper constructor for decompression failures.
    pub fn decompression_corrupt(reason: impl Into<String>) -> Self {
        StreamError::DecompressionCorrupt { reason: reason.into() }
    }

    /// Helper constructor for configuration validation failures.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Config { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for I/O errors with operation context.
    ///
    /// Disconnect-style error kinds are folded into [`StreamError::ConnectionClosed`]
    /// so callers only have to match one variant for "the peer went away".
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        let operation = operation.into();
        if is_disconnect(source.kind()) {
            StreamError::ConnectionClosed { context: operation, source: Some(source) }
        } else {
            StreamError::Io { operation, source }
        }
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::io("socket operation", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn messages_carry_their_context(reason in ".*", field in "\\w+", attempts in 1u32..100) {
            let closed = StreamError::connection_closed(reason.clone());
            prop_assert!(closed.to_string().contains(&reason));

            let config = StreamError::config(field.clone(), reason.clone());
            let msg = config.to_string();
            prop_assert!(msg.contains(&field));
            prop_assert!(msg.contains(&reason));

            let exhausted = StreamError::RetriesExhausted {
                addr: "127.0.0.1:9999".to_string(),
                attempts,
                last_error: Box::new(closed),
            };
            prop_assert!(exhausted.to_string().contains(&attempts.to_string()));
        }
    }

    #[test]
    fn disconnect_kinds_map_to_connection_closed() {
        for kind in [
            ErrorKind::UnexpectedEof,
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionAborted,
            ErrorKind::BrokenPipe,
            ErrorKind::NotConnected,
        ] {
            let err: StreamError = std::io::Error::new(kind, "gone").into();
            assert!(
                matches!(err, StreamError::ConnectionClosed { source: Some(_), .. }),
                "{kind:?} should map to ConnectionClosed"
            );
            assert!(err.is_session_ending());
        }

        let err: StreamError = std::io::Error::other("disk on fire").into();
        assert!(matches!(err, StreamError::Io { .. }));
    }

    #[test]
    fn classification_is_disjoint_for_frame_local_errors() {
        let errors = [
            StreamError::acquisition_unavailable("camera unplugged"),
            StreamError::compression_rejected("zero-sized image"),
            StreamError::decompression_corrupt("bad magic"),
        ];
        for error in &errors {
            assert!(error.is_frame_local());
            assert!(!error.is_session_ending());
        }

        assert!(StreamError::malformed_header("length too large").is_session_ending());
        assert!(!StreamError::malformed_header("length too large").is_retryable());
    }

    #[test]
    fn retries_exhausted_keeps_last_error_as_source() {
        let refused = StreamError::ConnectionRefused {
            addr: "127.0.0.1:1".to_string(),
            source: std::io::Error::new(ErrorKind::ConnectionRefused, "refused"),
        };
        let exhausted = StreamError::RetriesExhausted {
            addr: "127.0.0.1:1".to_string(),
            attempts: 4,
            last_error: Box::new(refused),
        };

        let source = std::error::Error::source(&exhausted).expect("source should be set");
        assert!(source.to_string().contains("refused"));
        assert!(!exhausted.recovery_suggestions().is_empty());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();
    }
}
