//! Boolean (range) decoder for VP8 entropy-coded partitions.
//!
//! An explicit cursor over a borrowed partition slice. Reads past the end
//! of the slice shift in zero bits instead of failing, as the reference
//! decoder does (RFC 6386 p.135); truncation is diagnosed where partition
//! sizes are validated, not here.

use crate::vp8::tables::Prob;

pub struct BoolDecoder<'a> {
    buf: &'a [u8],
    index: usize,

    range: u32,
    value: u32,
    bit_count: u8,
}

impl<'a> BoolDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> BoolDecoder<'a> {
        let mut value = 0u32;
        for i in 0..2 {
            value <<= 8;
            if let Some(&b) = buf.get(i) {
                value |= u32::from(b);
            }
        }

        BoolDecoder {
            buf,
            index: 2.min(buf.len()),
            range: 255,
            value,
            bit_count: 0,
        }
    }

    pub fn read_bool(&mut self, probability: Prob) -> bool {
        let split = 1 + (((self.range - 1) * u32::from(probability)) >> 8);
        let bigsplit = split << 8;

        let retval = if self.value >= bigsplit {
            self.range -= split;
            self.value -= bigsplit;
            true
        } else {
            self.range = split;
            false
        };

        while self.range < 128 {
            self.value <<= 1;
            self.range <<= 1;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bit_count = 0;

                if self.index < self.buf.len() {
                    self.value |= u32::from(self.buf[self.index]);
                    self.index += 1;
                }
            }
        }

        retval
    }

    /// Reads `n` bits MSB first, each at probability one half.
    pub fn read_literal(&mut self, n: u8) -> u8 {
        let mut v = 0u8;

        for _ in 0..n {
            v = (v << 1) + self.read_bool(128) as u8;
        }

        v
    }

    /// Reads an `n`-bit magnitude followed by a sign bit.
    pub fn read_magnitude_and_sign(&mut self, n: u8) -> i32 {
        let magnitude = self.read_literal(n);
        let sign = self.read_literal(1);

        if sign == 1 {
            -i32::from(magnitude)
        } else {
            i32::from(magnitude)
        }
    }

    /// Walks a flat token tree; leaves are non-positive entries whose
    /// negation is the decoded value.
    pub fn read_with_tree(&mut self, tree: &[i8], probs: &[Prob], start: isize) -> i8 {
        let mut index = start;

        loop {
            let a = self.read_bool(probs[index as usize >> 1]);
            index = tree[(index + a as isize) as usize] as isize;

            if index <= 0 {
                break;
            }
        }

        -index as i8
    }

    pub fn read_flag(&mut self) -> bool {
        0 != self.read_literal(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vp8::tables::{B_PRED, KEYFRAME_YMODE_PROBS, KEYFRAME_YMODE_TREE};

    #[test]
    fn zero_bytes_decode_to_false_bits() {
        let data = [0u8; 4];
        let mut d = BoolDecoder::new(&data);
        for _ in 0..24 {
            assert!(!d.read_bool(128));
        }
    }

    #[test]
    fn leading_high_bit_decodes_true() {
        // value starts at 0x8000, split for prob 128 is 0x80, bigsplit 0x8000.
        let data = [0x80u8, 0x00, 0x00];
        let mut d = BoolDecoder::new(&data);
        assert!(d.read_bool(128));
        assert!(!d.read_bool(128));
    }

    #[test]
    fn all_ones_decode_true_bits() {
        let data = [0xFFu8; 4];
        let mut d = BoolDecoder::new(&data);
        for _ in 0..16 {
            assert!(d.read_bool(128));
        }
    }

    #[test]
    fn literals_are_msb_first() {
        let data = [0xFFu8, 0xFF, 0xFF, 0xFF];
        let mut d = BoolDecoder::new(&data);
        assert_eq!(d.read_literal(3), 0b111);

        let data = [0u8; 4];
        let mut d = BoolDecoder::new(&data);
        assert_eq!(d.read_literal(7), 0);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut d = BoolDecoder::new(&[]);
        for _ in 0..32 {
            assert!(!d.read_bool(128));
        }

        let mut d = BoolDecoder::new(&[0x80]);
        assert!(d.read_bool(128));
    }

    #[test]
    fn tree_walk_follows_false_branches_to_first_leaf() {
        // All-false bits walk the luma mode tree straight to its first leaf.
        let data = [0u8; 4];
        let mut d = BoolDecoder::new(&data);
        let mode = d.read_with_tree(&KEYFRAME_YMODE_TREE, &KEYFRAME_YMODE_PROBS, 0);
        assert_eq!(mode, B_PRED);
    }

    #[test]
    fn magnitude_and_sign() {
        // 4 ones then a set sign bit: magnitude 15, negative.
        let data = [0b1111_1000u8, 0x00, 0x00, 0x00];
        let mut d = BoolDecoder::new(&data);
        assert_eq!(d.read_magnitude_and_sign(4), -15);
    }
}
