//! Length-prefixed stream codec.
//!
//! TCP delivers an ordered byte stream with no message boundaries, so every
//! frame is wrapped in a wire message:
//!
//! ```text
//! ┌───────────────────────────┬──────────────────────────┐
//! │ Length (8 bytes)          │ Payload (Length bytes)   │
//! │ u64, big-endian           │ compressed image         │
//! └───────────────────────────┴──────────────────────────┘
//! ```
//!
//! There is no handshake, version byte or checksum: the first byte after
//! connect is the first length header. Decoding is all-or-nothing per
//! message. A peer that closes mid-header or mid-payload yields
//! [`StreamError::ConnectionClosed`](crate::StreamError::ConnectionClosed), never a truncated frame.
//!
//! Two decoding front-ends share the header rules:
//!
//! - [`read_frame`] pulls from any [`tokio::io::AsyncRead`], tolerating short reads.
//! - [`FrameDecoder`] is push-based and does no I/O.
//!
//! ```rust
//! use framecast::types::Frame;
//! use framecast::wire::{FrameDecoder, encode};
//!
//! let bytes = encode(&Frame::from(b"jpeg".to_vec()));
//! assert_eq!(&bytes[..8], &4u64.to_be_bytes());
//!
//! let mut decoder = FrameDecoder::new();
//! for byte in &bytes {
//!     decoder.push(std::slice::from_ref(byte));
//! }
//! let frame = decoder.next_frame().unwrap().expect("complete frame");
//! assert_eq!(frame.as_bytes(), b"jpeg");
//! ```

mod decoder;
mod io;

pub use decoder::FrameDecoder;
pub use io::{read_frame, write_frame};

use crate::types::Frame;
use crate::{Result, StreamError};

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 8;

/// Default upper bound on a single payload (64 MiB)
pub const DEFAULT_MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Hard ceiling on any configured frame limit (1 GiB)
pub const MAX_FRAME_LEN_LIMIT: u64 = 1024 * 1024 * 1024;

/// Encode the length prefix for a payload of `len` bytes
pub fn encode_header(len: usize) -> [u8; HEADER_LEN] {
    (len as u64).to_be_bytes()
}

/// Parse a length prefix, rejecting lengths above `max_frame_len`.
///
/// `max_frame_len` is clamped to [`MAX_FRAME_LEN_LIMIT`].
pub fn parse_header(header: [u8; HEADER_LEN], max_frame_len: u64) -> Result<usize> {
    let len = u64::from_be_bytes(header);
    let limit = max_frame_len.min(MAX_FRAME_LEN_LIMIT);
    if len > limit {
        return Err(StreamError::malformed_header(format!(
            "claimed payload of {} bytes exceeds limit of {} bytes",
            len, limit
        )));
    }
    usize::try_from(len).map_err(|_| {
        StreamError::malformed_header(format!("claimed payload of {} bytes is not addressable", len))
    })
}

/// Encode a frame into a complete wire message
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut message = Vec::with_capacity(frame.len() + HEADER_LEN);
    message.extend_from_slice(&encode_header(frame.len()));
    message.extend_from_slice(frame.as_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian() {
        assert_eq!(encode_header(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(encode_header(0x0102), [0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn empty_frame_encodes_to_bare_header() {
        assert_eq!(encode(&Frame::new(Vec::new())), vec![0u8; 8]);
    }

    #[test]
    fn oversized_header_is_malformed() {
        let header = (DEFAULT_MAX_FRAME_LEN + 1).to_be_bytes();
        let err = parse_header(header, DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, StreamError::MalformedHeader { .. }));

        let header = DEFAULT_MAX_FRAME_LEN.to_be_bytes();
        assert_eq!(parse_header(header, DEFAULT_MAX_FRAME_LEN).unwrap() as u64, DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn unbounded_limit_is_clamped() {
        let err = parse_header((1u64 << 62).to_be_bytes(), u64::MAX).unwrap_err();
        assert!(matches!(err, StreamError::MalformedHeader { .. }));

        let header = MAX_FRAME_LEN_LIMIT.to_be_bytes();
        assert_eq!(parse_header(header, u64::MAX).unwrap() as u64, MAX_FRAME_LEN_LIMIT);
    }
}
