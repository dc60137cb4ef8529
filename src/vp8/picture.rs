//! Decoded frame storage.

use alloc::vec;
use alloc::vec::Vec;

/// A decoded key frame as planar 4:2:0 YUV.
///
/// Planes are tightly packed at their declared dimensions; strides equal
/// the plane widths. No colorspace conversion is performed, that is left
/// to the caller.
#[derive(Debug, Clone)]
pub struct YuvFrame {
    /// Luma plane, `width * height` samples.
    pub y: Vec<u8>,
    /// Chroma U plane, `chroma_width() * chroma_height()` samples.
    pub u: Vec<u8>,
    /// Chroma V plane, same dimensions as U.
    pub v: Vec<u8>,
    /// Luma width in pixels.
    pub width: u16,
    /// Luma height in pixels.
    pub height: u16,
}

impl YuvFrame {
    pub(crate) fn new(width: u16, height: u16) -> YuvFrame {
        let (w, h) = (usize::from(width), usize::from(height));
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

        YuvFrame {
            y: vec![0; w * h],
            u: vec![0; cw * ch],
            v: vec![0; cw * ch],
            width,
            height,
        }
    }

    /// Chroma plane width, the luma width halved and rounded up.
    #[inline]
    pub fn chroma_width(&self) -> u16 {
        self.width.div_ceil(2)
    }

    /// Chroma plane height, the luma height halved and rounded up.
    #[inline]
    pub fn chroma_height(&self) -> u16 {
        self.height.div_ceil(2)
    }

    /// Row stride of the luma plane in samples.
    #[inline]
    pub fn y_stride(&self) -> usize {
        usize::from(self.width)
    }

    /// Row stride of the chroma planes in samples.
    #[inline]
    pub fn c_stride(&self) -> usize {
        usize::from(self.chroma_width())
    }

    /// Fetches a luma sample; coordinates must be in bounds.
    #[inline]
    pub fn get_y(&self, x: usize, y: usize) -> u8 {
        self.y[y * self.y_stride() + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_sizes_match_declared_dimensions() {
        let f = YuvFrame::new(17, 9);
        assert_eq!(f.y.len(), 17 * 9);
        assert_eq!(f.chroma_width(), 9);
        assert_eq!(f.chroma_height(), 5);
        assert_eq!(f.u.len(), 9 * 5);
        assert_eq!(f.v.len(), 9 * 5);
        assert_eq!(f.y_stride(), 17);
        assert_eq!(f.c_stride(), 9);
    }
}
