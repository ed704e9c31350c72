//! Push-based incremental decoder

use super::{DEFAULT_MAX_FRAME_LEN, HEADER_LEN, parse_header};
use crate::types::Frame;
use crate::{Result, StreamError};

/// Incremental wire message decoder with no I/O.
///
/// Feed it bytes in chunks of any size with [`push`](Self::push) and pull
/// complete frames with [`next_frame`](Self::next_frame). Partial messages stay
/// buffered until the rest arrives.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_len: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: u64) -> Self {
        Self { buf: Vec::new(), max_frame_len }
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// Fails with `MalformedHeader` as soon as a header exceeding the limit
    /// is visible, without waiting for its payload.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(header) = self.buf.first_chunk::<HEADER_LEN>() else {
            return Ok(None);
        };
        let len = parse_header(*header, self.max_frame_len)?;

        let total = HEADER_LEN.checked_add(len).ok_or_else(|| {
            StreamError::malformed_header(format!("claimed payload of {} bytes overflows", len))
        })?;
        if self.buf.len() < total {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(Frame::from(payload)))
    }

    /// Signal end of stream; fails if a partial message is still buffered.
    pub fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else if self.buf.len() < HEADER_LEN {
            Err(StreamError::connection_closed(format!(
                "stream ended inside length header ({} of {} bytes)",
                self.buf.len(),
                HEADER_LEN
            )))
        } else {
            Err(StreamError::connection_closed(format!(
                "stream ended inside payload ({} bytes buffered)",
                self.buf.len() - HEADER_LEN
            )))
        }
    }
}
