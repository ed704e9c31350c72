//! Core data types that cross stage boundaries.
//!
//! - [`Frame`] is the compressed unit carried by the buffer and the wire.
//! - [`RawImage`] is the uncompressed pixel buffer at the acquisition and
//!   presentation edges of the pipeline.
//! - [`Quality`] is the bounded compression quality knob.
//!
//! ```rust
//! use framecast::types::{Frame, PixelFormat, RawImage};
//!
//! let image = RawImage::new(2, 2, PixelFormat::Gray8, vec![0, 64, 128, 255]).unwrap();
//! assert_eq!(image.pixels().len(), 4);
//!
//! let frame = Frame::from(vec![0xAB; 16]);
//! assert_eq!(frame.wire_len(), 24);
//! ```

mod frame;
mod image;
mod quality;

pub use frame::Frame;
pub use image::{PixelFormat, RawImage};
pub use quality::Quality;
