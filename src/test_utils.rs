//! Test utilities shared by unit tests, in-crate integration tests and benches
//!
//! Frames built by [`numbered_frame`] carry their index in the first eight
//! bytes and a pattern derived from it in the rest, so a test can tell a
//! complete frame from a spliced or truncated one.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::stage::{FrameSource, Overlay, Presenter, PresenterControl};
use crate::types::{Frame, PixelFormat, RawImage};
use crate::{Result, StreamError};

/// Reader that hands out at most `chunk` bytes per poll, then reports EOF.
///
/// Exercises the "a single read may return fewer bytes than requested" path
/// of the wire reader.
#[derive(Debug)]
pub struct TrickleReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl TrickleReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self { data, pos: 0, chunk: chunk.max(1) }
    }
}

impl AsyncRead for TrickleReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = self.data.len() - self.pos;
        let n = remaining.min(self.chunk).min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// A loopback port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

fn pattern_byte(index: u64, offset: usize) -> u8 {
    (index as usize).wrapping_mul(31).wrapping_add(offset) as u8
}

/// Frame of `len` bytes (at least 8) identifying itself as number `index`
pub fn numbered_frame(index: u64, len: usize) -> Frame {
    let len = len.max(8);
    let mut payload = Vec::with_capacity(len);
    payload.extend_from_slice(&index.to_be_bytes());
    payload.extend((8..len).map(|offset| pattern_byte(index, offset)));
    Frame::from(payload)
}

/// Index of a frame built by [`numbered_frame`], or `None` if its content
/// does not match the pattern for that index
pub fn frame_index(frame: &Frame) -> Option<u64> {
    let (head, rest) = frame.as_bytes().split_first_chunk::<8>()?;
    let index = u64::from_be_bytes(*head);
    rest.iter()
        .enumerate()
        .all(|(i, &b)| b == pattern_byte(index, i + 8))
        .then_some(index)
}

/// Small grayscale image whose pixels all equal `value`
pub fn solid_image(width: u32, height: u32, value: u8) -> RawImage {
    let len = (width * height) as usize;
    RawImage::new(width, height, PixelFormat::Gray8, vec![value; len]).expect("valid image")
}

/// Source that replays a fixed script of capture results, then reports
/// acquisition unavailable forever.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<RawImage>>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<RawImage>>) -> Self {
        Self { script: script.into_iter().collect() }
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn capture_frame(&mut self) -> Result<RawImage> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(StreamError::acquisition_unavailable("script exhausted")))
    }

    fn describe(&self) -> String {
        format!("scripted source ({} steps left)", self.script.len())
    }
}

/// What a [`RecordingPresenter`] has seen
#[derive(Debug, Default)]
pub struct Recorded {
    pub images: Vec<RawImage>,
    pub overlays: Vec<Overlay>,
    pub closed: bool,
}

/// Presenter that records every call and can quit after N frames
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    recorded: Arc<Mutex<Recorded>>,
    quit_after: Option<usize>,
}

impl RecordingPresenter {
    pub fn new(quit_after: Option<usize>) -> Self {
        Self { recorded: Arc::default(), quit_after }
    }

    /// Shared handle to the recording, usable after the presenter is moved
    pub fn recorded(&self) -> Arc<Mutex<Recorded>> {
        Arc::clone(&self.recorded)
    }
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, image: &RawImage, overlay: &Overlay) -> Result<PresenterControl> {
        let mut recorded = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        recorded.images.push(image.clone());
        recorded.overlays.push(*overlay);
        match self.quit_after {
            Some(n) if recorded.images.len() >= n => Ok(PresenterControl::Quit),
            _ => Ok(PresenterControl::Continue),
        }
    }

    fn close(&mut self) {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_frames_identify_themselves() {
        let frame = numbered_frame(42, 100);
        assert_eq!(frame.len(), 100);
        assert_eq!(frame_index(&frame), Some(42));

        let mut bytes = frame.into_inner().into_vec();
        bytes[50] ^= 0xFF;
        assert_eq!(frame_index(&Frame::from(bytes)), None);
    }

    #[test]
    fn closed_port_refuses() {
        let port = closed_port();
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
    }
}
