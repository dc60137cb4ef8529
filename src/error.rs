//! Error types for VP8 key frame decoding.
//!
//! The crate exposes a single top-level [`Vp8Error`]. Every failure is
//! fatal: no partial frame is ever returned alongside an error. Bitstream
//! failures carry the byte offset within the supplied payload at which the
//! problem was detected.

use core::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Vp8Error>;

/// Errors produced while decoding a VP8 key frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Vp8Error {
    /// The payload is not a key frame (inter frames are not supported).
    #[error("unsupported frame type: {0}")]
    UnsupportedFrameType(&'static str),

    /// The frame uses a legal but unsupported feature, such as a reserved
    /// bitstream version or a non-zero color space.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// The bitstream violates the format.
    #[error("corrupt bitstream at byte {offset}: {reason}")]
    CorruptBitstream {
        /// What the decoder found wrong.
        reason: &'static str,
        /// Byte offset within the supplied payload.
        offset: usize,
    },

    /// Decoding was aborted through the caller-supplied stop flag.
    #[error("decode cancelled")]
    Cancelled,
}

impl Vp8Error {
    pub(crate) fn corrupt(reason: &'static str, offset: usize) -> Vp8Error {
        Vp8Error::CorruptBitstream { reason, offset }
    }
}

/// Returns `Err(Vp8Error::Cancelled)` if the stop flag has been raised.
///
/// Called between macroblock rows so cancellation latency stays bounded
/// without a per-pixel cost.
pub(crate) fn check_stop(stop: Option<&AtomicBool>) -> Result<()> {
    match stop {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(Vp8Error::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = Vp8Error::corrupt("bad start code", 3);
        let msg = alloc::format!("{e}");
        assert!(msg.contains("byte 3"), "unexpected message: {msg}");
        assert!(msg.contains("bad start code"), "unexpected message: {msg}");
    }

    #[test]
    fn stop_flag_cancels() {
        let flag = AtomicBool::new(false);
        assert!(check_stop(Some(&flag)).is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(check_stop(Some(&flag)), Err(Vp8Error::Cancelled));
        assert!(check_stop(None).is_ok());
    }
}
