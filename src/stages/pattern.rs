//! Synthetic test-pattern source standing in for a camera

use crate::Result;
use crate::stage::FrameSource;
use crate::types::{PixelFormat, RawImage};

/// Pattern drawn by a [`TestPatternSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Diagonal gradient sliding one pixel per frame
    Gradient,
    /// Vertical colour bars scrolling sideways
    Bars,
    /// Checkerboard drifting down-right
    Checker,
}

impl Pattern {
    /// Pattern for a device index; indices wrap around the available patterns
    pub fn for_device(device: u32) -> Self {
        match device % 3 {
            0 => Pattern::Gradient,
            1 => Pattern::Bars,
            _ => Pattern::Checker,
        }
    }
}

const BARS: [[u8; 3]; 7] = [
    [255, 255, 255],
    [0, 255, 255],
    [255, 255, 0],
    [0, 255, 0],
    [255, 0, 255],
    [0, 0, 255],
    [255, 0, 0],
];

/// Generates moving BGR test images at a fixed resolution
#[derive(Debug)]
pub struct TestPatternSource {
    device: u32,
    pattern: Pattern,
    width: u32,
    height: u32,
    frame: u64,
}

impl TestPatternSource {
    pub fn new(device: u32, width: u32, height: u32) -> Self {
        Self { device, pattern: Pattern::for_device(device), width, height, frame: 0 }
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = self.frame as usize;
        let mut pixels = Vec::with_capacity(w * h * 3);

        for y in 0..h {
            for x in 0..w {
                let bgr = match self.pattern {
                    Pattern::Gradient => {
                        let v = ((x + y + shift) % 256) as u8;
                        [v, 255 - v, ((y * 255) / h.max(1)) as u8]
                    }
                    Pattern::Bars => {
                        let bar = ((x + shift) * BARS.len() / w.max(1)) % BARS.len();
                        BARS[bar]
                    }
                    Pattern::Checker => {
                        let on = (((x + shift) / 32) + ((y + shift) / 32)) % 2 == 0;
                        if on { [230, 230, 230] } else { [25, 25, 25] }
                    }
                };
                pixels.extend_from_slice(&bgr);
            }
        }
        pixels
    }
}

#[async_trait::async_trait]
impl FrameSource for TestPatternSource {
    async fn capture_frame(&mut self) -> Result<RawImage> {
        let pixels = self.render();
        self.frame = self.frame.wrapping_add(1);
        RawImage::new(self.width, self.height, PixelFormat::Bgr8, pixels)
    }

    fn describe(&self) -> String {
        format!(
            "test pattern {:?} (device {}) at {}x{}",
            self.pattern, self.device, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_have_configured_size_and_move() {
        let mut source = TestPatternSource::new(0, 64, 48);
        let first = source.capture_frame().await.unwrap();
        let second = source.capture_frame().await.unwrap();

        assert_eq!(first.width(), 64);
        assert_eq!(first.height(), 48);
        assert_eq!(first.pixels().len(), 64 * 48 * 3);
        assert_ne!(first.pixels(), second.pixels());
    }

    #[test]
    fn device_selects_pattern() {
        assert_eq!(Pattern::for_device(0), Pattern::Gradient);
        assert_eq!(Pattern::for_device(1), Pattern::Bars);
        assert_eq!(Pattern::for_device(2), Pattern::Checker);
        assert_eq!(Pattern::for_device(3), Pattern::Gradient);
    }
}
