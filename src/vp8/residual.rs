//! DCT coefficient token decoding (RFC 6386 13).
//!
//! Coefficients are decoded per 4x4 block from the token partitions,
//! dequantized during placement and inverse transformed in place. The
//! "complexity" context (whether the above and left blocks held any
//! coefficients) selects the probability table for the first token.

use crate::vp8::bool_decoder::BoolDecoder;
use crate::vp8::header::Segment;
use crate::vp8::tables::{
    TokenProbTables, COEFF_BANDS, DCT_CAT1, DCT_CAT_BASE, DCT_EOB, DCT_TOKEN_TREE, DCT_0, DCT_1,
    DCT_4, PROB_DCT_CAT, ZIGZAG,
};
use crate::vp8::transform;

/// Per-macroblock above/left coefficient context. Slot 0 is the Y2
/// block, 1..=4 the luma columns or rows, 5..=6 the U blocks, 7..=8 the
/// V blocks.
pub type Complexity = [u8; 9];

/// Decoded residuals for one macroblock: 24 blocks of 16 samples
/// (16 luma, 4 U, 4 V; the Y2 contribution is folded into the luma DC
/// slots before the luma IDCT).
pub type ResidualBlocks = [i32; 384];

/// Decodes one 4x4 coefficient block. Returns true when any token was
/// present before the end-of-block.
pub fn read_coefficients(
    b: &mut BoolDecoder<'_>,
    probs: &TokenProbTables,
    block: &mut [i32],
    plane: usize,
    complexity: usize,
    dcq: i16,
    acq: i16,
) -> bool {
    // Plane 0 is luma with its DC carried by the Y2 block.
    let first = if plane == 0 { 1usize } else { 0usize };
    let probs = &probs[plane];

    let mut complexity = complexity;
    let mut has_coefficients = false;
    let mut skip = false;

    for i in first..16usize {
        let table = &probs[COEFF_BANDS[i] as usize][complexity];

        // After a zero token the tree is entered past the EOB branch.
        let start = if skip { 2 } else { 0 };
        let token = b.read_with_tree(&DCT_TOKEN_TREE, table, start);

        let mut abs_value = i32::from(match token {
            DCT_EOB => break,

            DCT_0 => {
                skip = true;
                has_coefficients = true;
                complexity = 0;
                continue;
            }

            literal @ DCT_1..=DCT_4 => i16::from(literal),

            category => {
                let cat = (category - DCT_CAT1) as usize;
                let t = &PROB_DCT_CAT[cat];

                let mut extra = 0i16;
                let mut j = 0;
                while t[j] > 0 {
                    extra = extra + extra + b.read_bool(t[j]) as i16;
                    j += 1;
                }

                i16::from(DCT_CAT_BASE[cat]) + extra
            }
        });

        skip = false;

        complexity = match abs_value {
            0 => 0,
            1 => 1,
            _ => 2,
        };

        if b.read_bool(128) {
            abs_value = -abs_value;
        }

        block[ZIGZAG[i] as usize] = abs_value * i32::from(if ZIGZAG[i] > 0 { acq } else { dcq });

        has_coefficients = true;
    }

    has_coefficients
}

/// Decodes all residual blocks of one macroblock and applies the inverse
/// transforms. Returns the spatial residuals and whether any block held
/// coefficients.
pub fn read_macroblock_residuals(
    b: &mut BoolDecoder<'_>,
    probs: &TokenProbTables,
    luma_is_bpred: bool,
    top_complexity: &mut Complexity,
    left_complexity: &mut Complexity,
    segment: &Segment,
) -> (ResidualBlocks, bool) {
    let mut blocks = [0i32; 384];
    let mut nonzero = false;
    let mut plane = if luma_is_bpred { 3usize } else { 1usize };

    if plane == 1 {
        let complexity = top_complexity[0] + left_complexity[0];
        let mut block = [0i32; 16];
        let n = read_coefficients(
            b,
            probs,
            &mut block,
            plane,
            complexity as usize,
            segment.y2dc,
            segment.y2ac,
        );

        top_complexity[0] = n as u8;
        left_complexity[0] = n as u8;
        nonzero |= n;

        transform::iwht4x4(&mut block);

        for (k, &v) in block.iter().enumerate() {
            blocks[16 * k] = v;
        }

        plane = 0;
    }

    for y in 0usize..4 {
        let mut left = left_complexity[y + 1];
        for x in 0usize..4 {
            let i = x + y * 4;
            let block = &mut blocks[i * 16..i * 16 + 16];

            let complexity = top_complexity[x + 1] + left;
            let n = read_coefficients(
                b,
                probs,
                block,
                plane,
                complexity as usize,
                segment.ydc,
                segment.yac,
            );

            if n {
                transform::idct4x4(block);
            } else if block[0] != 0 {
                // Only the DC carried over from the Y2 block.
                transform::idct4x4_dc(block);
            }

            left = n as u8;
            top_complexity[x + 1] = n as u8;
            nonzero |= n;
        }

        left_complexity[y + 1] = left;
    }

    for &j in &[5usize, 7usize] {
        for y in 0usize..2 {
            let mut left = left_complexity[y + j];

            for x in 0usize..2 {
                let i = x + y * 2 + if j == 5 { 16 } else { 20 };
                let block = &mut blocks[i * 16..i * 16 + 16];

                let complexity = top_complexity[x + j] + left;
                let n = read_coefficients(
                    b,
                    probs,
                    block,
                    2,
                    complexity as usize,
                    segment.uvdc,
                    segment.uvac,
                );

                if n {
                    transform::idct4x4(block);
                }

                left = n as u8;
                top_complexity[x + j] = n as u8;
                nonzero |= n;
            }

            left_complexity[y + j] = left;
        }
    }

    (blocks, nonzero)
}
