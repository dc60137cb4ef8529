//! Pure Rust VP8 still image decoder
//!
//! This crate provides a safe, sandboxed decoder for single VP8 key
//! frames (the lossy payload of WebP files) without any C/C++
//! dependencies.
//!
//! # Example
//!
//! ```ignore
//! use vp8_decoder::Vp8Decoder;
//!
//! let data = std::fs::read("frame.vp8")?;
//! let decoder = Vp8Decoder::new();
//! let frame = decoder.decode(&data)?;
//! println!("Decoded {}x{} frame", frame.width, frame.height);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

mod error;
mod vp8;

pub use error::{Result, Vp8Error};
pub use vp8::{FrameInfo, YuvFrame};

use core::sync::atomic::AtomicBool;

/// VP8 key frame decoder
#[derive(Debug, Default)]
pub struct Vp8Decoder {
    _private: (),
}

impl Vp8Decoder {
    /// Create a new VP8 decoder
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Decode a VP8 key frame payload into planar YUV 4:2:0.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a valid VP8 key frame or if
    /// decoding fails.
    pub fn decode(&self, data: &[u8]) -> Result<YuvFrame> {
        vp8::decode(data, None)
    }

    /// Decode a VP8 key frame with a cooperative cancellation flag.
    ///
    /// The flag is checked once per macroblock row. Raising it makes the
    /// decode return [`Vp8Error::Cancelled`] instead of a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a valid VP8 key frame, if
    /// decoding fails, or if `stop` was raised.
    pub fn decode_with_stop(&self, data: &[u8], stop: &AtomicBool) -> Result<YuvFrame> {
        vp8::decode(data, Some(stop))
    }

    /// Get frame info without full decoding.
    ///
    /// Only the uncompressed header is inspected, so this never touches
    /// the entropy-coded partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the data does not start with a VP8 key frame
    /// header.
    pub fn get_info(&self, data: &[u8]) -> Result<FrameInfo> {
        vp8::get_info(data)
    }
}
