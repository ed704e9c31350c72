//! Deflate-based reference codec
//!
//! Frame payload layout:
//!
//! ```text
//! magic "FCZ1" | width u32 BE | height u32 BE | format tag u8 | bits u8 | zlib stream
//! ```
//!
//! Quality is applied by masking each channel down to
//! [`Quality::significant_bits`] before deflating, which trades precision for
//! a better compression ratio the same way a JPEG quality knob does.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::borrow::Cow;
use std::io::{Read, Write};

use crate::stage::{Compressor, Decompressor};
use crate::types::{Frame, PixelFormat, Quality, RawImage};
use crate::{Result, StreamError};

const MAGIC: [u8; 4] = *b"FCZ1";
const HEADER_LEN: usize = 14;

/// Lossy-by-quantisation deflate codec
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: Compression::fast() }
    }
}

impl DeflateCodec {
    /// Codec with an explicit zlib effort level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }
}

fn quantize(pixels: &[u8], bits: u8) -> Cow<'_, [u8]> {
    if bits >= 8 {
        return Cow::Borrowed(pixels);
    }
    let mask = 0xFFu8 << (8 - bits);
    Cow::Owned(pixels.iter().map(|p| p & mask).collect())
}

impl Compressor for DeflateCodec {
    fn compress(&self, image: &RawImage, quality: Quality) -> Result<Frame> {
        if image.width() == 0 || image.height() == 0 {
            return Err(StreamError::compression_rejected("image has zero area"));
        }

        let bits = quality.significant_bits();
        let mut out = Vec::with_capacity(HEADER_LEN + image.pixels().len() / 4);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&image.width().to_be_bytes());
        out.extend_from_slice(&image.height().to_be_bytes());
        out.push(image.format().tag());
        out.push(bits);

        let mut encoder = ZlibEncoder::new(out, self.level);
        encoder
            .write_all(&quantize(image.pixels(), bits))
            .map_err(|e| StreamError::compression_rejected(e.to_string()))?;
        let out = encoder.finish().map_err(|e| StreamError::compression_rejected(e.to_string()))?;
        Ok(Frame::from(out))
    }
}

impl Decompressor for DeflateCodec {
    fn decompress(&self, frame: &Frame) -> Result<RawImage> {
        let payload = frame.as_bytes();
        let Some((header, body)) = payload.split_first_chunk::<HEADER_LEN>() else {
            return Err(StreamError::decompression_corrupt(format!(
                "{} byte payload is shorter than the {} byte codec header",
                payload.len(),
                HEADER_LEN
            )));
        };

        if header[..4] != MAGIC {
            return Err(StreamError::decompression_corrupt("bad codec magic"));
        }
        let width = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let height = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        let format = PixelFormat::from_tag(header[12]).ok_or_else(|| {
            StreamError::decompression_corrupt(format!("unknown pixel format tag {}", header[12]))
        })?;

        let expected = RawImage::expected_len(width, height, format)
            .map_err(|e| StreamError::decompression_corrupt(e.to_string()))?;

        // One extra byte reveals a stream that inflates past the declared size.
        let mut pixels = Vec::with_capacity(expected);
        ZlibDecoder::new(body)
            .take(expected as u64 + 1)
            .read_to_end(&mut pixels)
            .map_err(|e| StreamError::decompression_corrupt(e.to_string()))?;
        if pixels.len() != expected {
            return Err(StreamError::decompression_corrupt(format!(
                "inflated to {} bytes, header declares {}",
                pixels.len(),
                expected
            )));
        }

        RawImage::new(width, height, format, pixels)
            .map_err(|e| StreamError::decompression_corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RawImage {
        let pixels = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        RawImage::new(width, height, PixelFormat::Bgr8, pixels).unwrap()
    }

    #[test]
    fn max_quality_is_lossless() {
        let codec = DeflateCodec::default();
        let image = gradient(32, 16);
        let frame = codec.compress(&image, Quality::MAX).unwrap();
        assert_eq!(codec.decompress(&frame).unwrap(), image);
    }

    #[test]
    fn lower_quality_quantizes_channels() {
        let codec = DeflateCodec::default();
        let image = gradient(32, 16);
        let frame = codec.compress(&image, Quality::MIN).unwrap();
        let decoded = codec.decompress(&frame).unwrap();

        assert_eq!(decoded.width(), 32);
        assert!(decoded.pixels().iter().all(|p| p & 0x0F == 0));
    }

    #[test]
    fn lower_quality_compresses_smaller() {
        let codec = DeflateCodec::with_level(6);
        let pixels = (0..64 * 64 * 3u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8);
        let image = RawImage::new(64, 64, PixelFormat::Bgr8, pixels.collect()).unwrap();

        let high = codec.compress(&image, Quality::MAX).unwrap();
        let low = codec.compress(&image, Quality::MIN).unwrap();
        assert!(low.len() < high.len(), "low={} high={}", low.len(), high.len());
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        let codec = DeflateCodec::default();

        let short = Frame::from(vec![b'F', b'C']);
        assert!(matches!(codec.decompress(&short), Err(StreamError::DecompressionCorrupt { .. })));

        let mut frame = codec.compress(&gradient(8, 8), Quality::MAX).unwrap().into_inner().into_vec();
        frame[0] = b'X';
        let err = codec.decompress(&Frame::from(frame)).unwrap_err();
        assert!(err.to_string().contains("magic"));

        let mut frame = codec.compress(&gradient(8, 8), Quality::MAX).unwrap().into_inner().into_vec();
        let len = frame.len();
        frame.truncate(len - 4);
        assert!(codec.decompress(&Frame::from(frame)).unwrap_err().is_frame_local());
    }

    #[test]
    fn declared_size_mismatch_is_corrupt() {
        let codec = DeflateCodec::default();
        let mut frame = codec.compress(&gradient(8, 8), Quality::MAX).unwrap().into_inner().into_vec();
        // Claim a larger image than the stream inflates to.
        frame[4..8].copy_from_slice(&16u32.to_be_bytes());
        let err = codec.decompress(&Frame::from(frame)).unwrap_err();
        assert!(matches!(err, StreamError::DecompressionCorrupt { .. }));
    }
}
