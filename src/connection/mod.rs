//! Network endpoints of the pipeline
//!
//! The producer side runs a [`NetworkSender`]: it listens, serves one
//! consumer at a time and goes back to accepting when that consumer leaves.
//! The consumer side runs a [`NetworkReceiver`]: it connects with bounded
//! retries, fills the local buffer until the session ends, and stops.
//!
//! Both publish their state on a `tokio::sync::watch` channel so callers can
//! observe transitions as a stream.

use std::fmt;

use crate::StreamError;

pub mod receiver;
pub mod retry;
pub mod sender;


pub use receiver::{NetworkReceiver, ReceiverOptions, ReceiverState};
pub use retry::{ConnectOutcome, RetryPolicy, connect_with_retry};
pub use sender::{NetworkSender, SenderOptions, SenderState};

/// Identifier of one accepted producer session, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a streaming session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer went away or the byte stream became unusable
    Disconnected(StreamError),
    /// Local shutdown was requested
    Cancelled,
    /// The local buffer was closed underneath the session
    BufferClosed,
}

impl SessionEnd {
    /// The session-ending error, if the peer side caused it
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            SessionEnd::Disconnected(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Disconnected(e) => write!(f, "disconnected: {}", e),
            SessionEnd::Cancelled => f.write_str("cancelled"),
            SessionEnd::BufferClosed => f.write_str("buffer closed"),
        }
    }
}
