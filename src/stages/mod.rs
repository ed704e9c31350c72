//! Reference implementations of the collaborator traits
//!
//! - [`TestPatternSource`]: synthetic frames in place of a camera
//! - [`DeflateCodec`]: quality-quantised zlib in place of JPEG
//! - [`LogPresenter`]: overlay reporting in place of a window

pub mod deflate;
pub mod log_presenter;
pub mod pattern;

pub use deflate::DeflateCodec;
pub use log_presenter::LogPresenter;
pub use pattern::{Pattern, TestPatternSource};
