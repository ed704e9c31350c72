//! Compressed frame type that flows through the transport pipeline

use crate::wire::HEADER_LEN;

/// One compressed image moving through the pipeline.
///
/// A frame is an opaque, immutable byte block. It is deliberately not `Clone`:
/// exactly one stage owns a frame at a time, and handing it to the buffer or
/// the socket moves it.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    payload: Box<[u8]>,
}

impl Frame {
    /// Create a frame from a compressed payload
    pub fn new(payload: impl Into<Box<[u8]>>) -> Self {
        Self { payload: payload.into() }
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Bytes this frame occupies on the wire, length header included
    pub fn wire_len(&self) -> u64 {
        (self.payload.len() + HEADER_LEN) as u64
    }

    /// Take back ownership of the payload
    pub fn into_inner(self) -> Box<[u8]> {
        self.payload
    }
}

impl From<Vec<u8>> for Frame {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_len_includes_header() {
        assert_eq!(Frame::new(Vec::new()).wire_len(), 8);
        assert_eq!(Frame::from(vec![0u8; 1000]).wire_len(), 1008);
    }

    #[test]
    fn into_inner_returns_payload() {
        let frame = Frame::from(vec![1, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert_eq!(&*frame.into_inner(), &[1, 2, 3]);
    }
}
