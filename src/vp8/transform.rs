//! Inverse transforms for residual reconstruction (RFC 6386 14.3, 14.4).

/// 16 bit fixed point version of cos(PI/8) * sqrt(2) - 1.
const CONST1: i64 = 20091;
/// 16 bit fixed point version of sin(PI/8) * sqrt(2).
const CONST2: i64 = 35468;

/// DC-only shortcut: fills the block with (DC+4)>>3, matching a full
/// IDCT of a block whose AC coefficients are all zero.
pub fn idct4x4_dc(block: &mut [i32]) {
    assert!(block.len() >= 16);
    let dc = (block[0] + 4) >> 3;
    block[..16].fill(dc);
}

/// Two-pass 4x4 inverse DCT, columns then rows, rounding on the second
/// pass.
pub fn idct4x4(block: &mut [i32]) {
    // Intermediates can outgrow i32, so the passes work in i64.
    fn fetch(block: &[i32], idx: usize) -> i64 {
        i64::from(block[idx])
    }

    assert!(block.len() >= 16);

    for i in 0usize..4 {
        let a1 = fetch(block, i) + fetch(block, 8 + i);
        let b1 = fetch(block, i) - fetch(block, 8 + i);

        let t1 = (fetch(block, 4 + i) * CONST2) >> 16;
        let t2 = fetch(block, 12 + i) + ((fetch(block, 12 + i) * CONST1) >> 16);
        let c1 = t1 - t2;

        let t1 = fetch(block, 4 + i) + ((fetch(block, 4 + i) * CONST1) >> 16);
        let t2 = (fetch(block, 12 + i) * CONST2) >> 16;
        let d1 = t1 + t2;

        block[i] = (a1 + d1) as i32;
        block[4 + i] = (b1 + c1) as i32;
        block[4 * 2 + i] = (b1 - c1) as i32;
        block[4 * 3 + i] = (a1 - d1) as i32;
    }

    for i in 0usize..4 {
        let a1 = fetch(block, 4 * i) + fetch(block, 4 * i + 2);
        let b1 = fetch(block, 4 * i) - fetch(block, 4 * i + 2);

        let t1 = (fetch(block, 4 * i + 1) * CONST2) >> 16;
        let t2 = fetch(block, 4 * i + 3) + ((fetch(block, 4 * i + 3) * CONST1) >> 16);
        let c1 = t1 - t2;

        let t1 = fetch(block, 4 * i + 1) + ((fetch(block, 4 * i + 1) * CONST1) >> 16);
        let t2 = (fetch(block, 4 * i + 3) * CONST2) >> 16;
        let d1 = t1 + t2;

        block[4 * i] = ((a1 + d1 + 4) >> 3) as i32;
        block[4 * i + 1] = ((b1 + c1 + 4) >> 3) as i32;
        block[4 * i + 2] = ((b1 - c1 + 4) >> 3) as i32;
        block[4 * i + 3] = ((a1 - d1 + 4) >> 3) as i32;
    }
}

/// 4x4 inverse Walsh-Hadamard transform for the Y2 block.
pub fn iwht4x4(block: &mut [i32]) {
    assert!(block.len() >= 16);

    for i in 0usize..4 {
        let a1 = block[i] + block[12 + i];
        let b1 = block[4 + i] + block[8 + i];
        let c1 = block[4 + i] - block[8 + i];
        let d1 = block[i] - block[12 + i];

        block[i] = a1 + b1;
        block[4 + i] = c1 + d1;
        block[8 + i] = a1 - b1;
        block[12 + i] = d1 - c1;
    }

    for row in block[..16].chunks_exact_mut(4) {
        let a1 = row[0] + row[3];
        let b1 = row[1] + row[2];
        let c1 = row[1] - row[2];
        let d1 = row[0] - row[3];

        row[0] = (a1 + b1 + 3) >> 3;
        row[1] = (c1 + d1 + 3) >> 3;
        row[2] = (a1 - b1 + 3) >> 3;
        row[3] = (d1 - c1 + 3) >> 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idct_dc_only_is_uniform() {
        let mut block = [0i32; 16];
        block[0] = 8;
        idct4x4(&mut block);
        assert_eq!(block, [1i32; 16]);

        let mut shortcut = [0i32; 16];
        shortcut[0] = 8;
        idct4x4_dc(&mut shortcut);
        assert_eq!(shortcut, [1i32; 16]);
    }

    #[test]
    fn idct_zero_block_stays_zero() {
        let mut block = [0i32; 16];
        idct4x4(&mut block);
        assert_eq!(block, [0i32; 16]);
    }

    #[test]
    fn iwht_dc_only_is_uniform() {
        let mut block = [0i32; 16];
        block[0] = 8;
        iwht4x4(&mut block);
        assert_eq!(block, [1i32; 16]);
    }

    #[test]
    fn iwht_negative_dc() {
        let mut block = [0i32; 16];
        block[0] = -16;
        iwht4x4(&mut block);
        // (-16 + 3) >> 3 with arithmetic shift.
        assert_eq!(block, [-2i32; 16]);
    }
}
