//! Uncompressed image type at the acquisition and presentation boundaries

use crate::{Result, StreamError};

/// Pixel layout of a [`RawImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit blue, green, red triplets
    Bgr8,
    /// 8-bit luminance
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Wire tag used by codecs
    pub fn tag(self) -> u8 {
        match self {
            PixelFormat::Bgr8 => 1,
            PixelFormat::Gray8 => 2,
        }
    }

    /// Inverse of [`PixelFormat::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PixelFormat::Bgr8),
            2 => Some(PixelFormat::Gray8),
            _ => None,
        }
    }
}

/// Raw pixel buffer produced by acquisition and consumed by presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl RawImage {
    /// Create an image, checking the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = Self::expected_len(width, height, format)?;
        if pixels.len() != expected {
            return Err(StreamError::compression_rejected(format!(
                "{}x{} {:?} image needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, format, pixels })
    }

    /// Byte length a `width` x `height` image of `format` must have
    pub fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| {
                StreamError::compression_rejected(format!("{}x{} image is too large", width, height))
            })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let err = RawImage::new(4, 4, PixelFormat::Bgr8, vec![0; 47]).unwrap_err();
        assert!(err.is_frame_local());

        let image = RawImage::new(4, 4, PixelFormat::Bgr8, vec![0; 48]).unwrap();
        assert_eq!(image.pixels().len(), 48);
    }

    #[test]
    fn format_tags_round_trip() {
        for format in [PixelFormat::Bgr8, PixelFormat::Gray8] {
            assert_eq!(PixelFormat::from_tag(format.tag()), Some(format));
        }
        assert_eq!(PixelFormat::from_tag(0), None);
    }
}
