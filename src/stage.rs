//! Traits for the external collaborators at the pipeline edges
//!
//! The transport core never captures, encodes, decodes or draws images itself.
//! It calls out through these traits, and each call's failures stay local to
//! the calling stage: a bad frame is skipped, never propagated as a
//! stream-ending error.

use std::fmt;

use crate::Result;
use crate::types::{Frame, Quality, RawImage};

/// Source of raw images (a camera in production)
///
/// Implementations may block for up to one frame interval. An
/// `AcquisitionUnavailable` error means "no frame this time"; the caller backs
/// off briefly and asks again.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Capture the next raw image
    async fn capture_frame(&mut self) -> Result<RawImage>;

    /// Human-readable description for startup logs
    fn describe(&self) -> String;
}

/// Turns raw images into compressed frames
pub trait Compressor: Send + Sync + 'static {
    /// Compress an image; `CompressionRejected` skips this frame only.
    fn compress(&self, image: &RawImage, quality: Quality) -> Result<Frame>;
}

/// Turns compressed frames back into raw images
pub trait Decompressor: Send + Sync + 'static {
    /// Decompress a frame; `DecompressionCorrupt` skips this frame only.
    fn decompress(&self, frame: &Frame) -> Result<RawImage>;
}

/// What the presentation loop should do after rendering a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterControl {
    Continue,
    /// Local quit request (the "quit key")
    Quit,
}

/// Statistics drawn over each displayed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub display_fps: f64,
    pub buffered: usize,
    pub capacity: usize,
    pub frames_displayed: u64,
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {:.1} | Buffer: {}/{} | Frames: {}",
            self.display_fps, self.buffered, self.capacity, self.frames_displayed
        )
    }
}

/// Displays decompressed images
///
/// Called once per displayed frame from the foreground activity. Must not
/// block beyond a single-frame vertical-sync wait.
pub trait Presenter: Send {
    fn render(&mut self, image: &RawImage, overlay: &Overlay) -> Result<PresenterControl>;

    /// Called once when presentation ends, for window teardown and the like
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_text_matches_display_format() {
        let overlay =
            Overlay { display_fps: 29.96, buffered: 3, capacity: 10, frames_displayed: 1234 };
        assert_eq!(overlay.to_string(), "FPS: 30.0 | Buffer: 3/10 | Frames: 1234");
    }
}
