//! Intra prediction and macroblock reconstruction (RFC 6386 11, 12).
//!
//! Each macroblock is reconstructed in an edge-extended workspace: one
//! border row above, one border column to the left, and for luma four
//! extra above-right pixels used by the diagonal 4x4 modes. Missing
//! borders at the frame edge take the fixed values 127 (above) and 129
//! (left).

use alloc::vec;
use alloc::vec::Vec;

use crate::vp8::picture::YuvFrame;
use crate::vp8::{ChromaMode, IntraMode, LumaMode};

pub const LUMA_STRIDE: usize = 1 + 16 + 4;
const LUMA_WS_SIZE: usize = (1 + 16) * LUMA_STRIDE;
pub const CHROMA_STRIDE: usize = 1 + 8;
const CHROMA_WS_SIZE: usize = (1 + 8) * CHROMA_STRIDE;

/// Running reconstruction borders: the row of pixels above each
/// macroblock column and the column of pixels left of the current
/// macroblock, per plane.
pub struct Borders {
    pub top_y: Vec<u8>,
    pub left_y: [u8; 17],
    pub top_u: Vec<u8>,
    pub left_u: [u8; 9],
    pub top_v: Vec<u8>,
    pub left_v: [u8; 9],
}

impl Borders {
    pub fn new(mb_width: usize) -> Borders {
        Borders {
            top_y: vec![127; mb_width * 16],
            left_y: [129; 17],
            top_u: vec![127; mb_width * 8],
            left_u: [129; 9],
            top_v: vec![127; mb_width * 8],
            left_v: [129; 9],
        }
    }
}

fn create_border_luma(mbx: usize, mby: usize, mbw: usize, top: &[u8], left: &[u8]) -> [u8; LUMA_WS_SIZE] {
    let stride = LUMA_STRIDE;
    let mut ws = [0u8; LUMA_WS_SIZE];

    // Above row, including four above-right pixels. At the rightmost
    // macroblock the above-right pixels replicate the last above pixel.
    {
        let above = &mut ws[1..stride];
        if mby == 0 {
            for above in above.iter_mut() {
                *above = 127;
            }
        } else {
            for i in 0usize..16 {
                above[i] = top[mbx * 16 + i];
            }

            if mbx == mbw - 1 {
                for above in above.iter_mut().skip(16) {
                    *above = top[mbx * 16 + 15];
                }
            } else {
                for i in 16usize..above.len() {
                    above[i] = top[mbx * 16 + i];
                }
            }
        }
    }

    // The diagonal modes of rows below the first read above-right pixels
    // from these replicated positions.
    for i in 17usize..stride {
        ws[4 * stride + i] = ws[i];
        ws[8 * stride + i] = ws[i];
        ws[12 * stride + i] = ws[i];
    }

    // Left column.
    if mbx == 0 {
        for i in 0usize..16 {
            ws[(i + 1) * stride] = 129;
        }
    } else {
        for i in 0usize..16 {
            ws[(i + 1) * stride] = left[i + 1];
        }
    }

    // Corner.
    ws[0] = if mby == 0 {
        127
    } else if mbx == 0 {
        129
    } else {
        left[0]
    };

    ws
}

fn create_border_chroma(mbx: usize, mby: usize, top: &[u8], left: &[u8]) -> [u8; CHROMA_WS_SIZE] {
    let stride = CHROMA_STRIDE;
    let mut ws = [0u8; CHROMA_WS_SIZE];

    {
        let above = &mut ws[1..stride];
        if mby == 0 {
            for above in above.iter_mut() {
                *above = 127;
            }
        } else {
            for (above, &top) in above.iter_mut().zip(&top[mbx * 8..]) {
                *above = top;
            }
        }
    }

    if mbx == 0 {
        for y in 0usize..8 {
            ws[(y + 1) * stride] = 129;
        }
    } else {
        for (y, &left) in (0usize..8).zip(&left[1..]) {
            ws[(y + 1) * stride] = left;
        }
    }

    ws[0] = if mby == 0 {
        127
    } else if mbx == 0 {
        129
    } else {
        left[0]
    };

    ws
}

fn avg3(left: u8, this: u8, right: u8) -> u8 {
    ((u16::from(left) + 2 * u16::from(this) + u16::from(right) + 2) >> 2) as u8
}

fn avg2(this: u8, right: u8) -> u8 {
    ((u16::from(this) + u16::from(right) + 1) >> 1) as u8
}

fn add_residue(pblock: &mut [u8], rblock: &[i32], y0: usize, x0: usize, stride: usize) {
    for y in 0usize..4 {
        for x in 0usize..4 {
            let a = rblock[x + y * 4];
            let b = pblock[(y0 + y) * stride + x0 + x];
            pblock[(y0 + y) * stride + x0 + x] = (a + i32::from(b)).clamp(0, 255) as u8;
        }
    }
}

/// B_PRED: each luma subblock is predicted from its own reconstructed
/// neighbours, so prediction and residual addition interleave.
fn predict_4x4(ws: &mut [u8], stride: usize, modes: &[IntraMode; 16], resdata: &[i32]) {
    for sby in 0usize..4 {
        for sbx in 0usize..4 {
            let i = sbx + sby * 4;
            let y0 = sby * 4 + 1;
            let x0 = sbx * 4 + 1;
            let rb = &resdata[i * 16..i * 16 + 16];

            match modes[i] {
                IntraMode::TM => predict_tmpred(ws, 4, x0, y0, stride),
                IntraMode::VE => predict_bvepred(ws, x0, y0, stride),
                IntraMode::HE => predict_bhepred(ws, x0, y0, stride),
                IntraMode::DC => predict_bdcpred(ws, x0, y0, stride),
                IntraMode::LD => predict_bldpred(ws, x0, y0, stride),
                IntraMode::RD => predict_brdpred(ws, x0, y0, stride),
                IntraMode::VR => predict_bvrpred(ws, x0, y0, stride),
                IntraMode::VL => predict_bvlpred(ws, x0, y0, stride),
                IntraMode::HD => predict_bhdpred(ws, x0, y0, stride),
                IntraMode::HU => predict_bhupred(ws, x0, y0, stride),
            }

            add_residue(ws, rb, y0, x0, stride);
        }
    }
}

fn predict_vpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    for y in 0usize..size {
        for x in 0usize..size {
            a[(x + x0) + stride * (y + y0)] = a[(x + x0) + stride * (y0 + y - 1)];
        }
    }
}

fn predict_hpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    for y in 0usize..size {
        for x in 0usize..size {
            a[(x + x0) + stride * (y + y0)] = a[(x + x0 - 1) + stride * (y0 + y)];
        }
    }
}

fn predict_dcpred(a: &mut [u8], size: usize, stride: usize, above: bool, left: bool) {
    let mut sum = 0;
    let mut shf = if size == 8 { 2 } else { 3 };

    if left {
        for y in 0usize..size {
            sum += u32::from(a[(y + 1) * stride]);
        }
        shf += 1;
    }

    if above {
        for x in 0usize..size {
            sum += u32::from(a[x + 1]);
        }
        shf += 1;
    }

    let dcval = if !left && !above {
        128
    } else {
        (sum + (1 << (shf - 1))) >> shf
    };

    for y in 0usize..size {
        for x in 0usize..size {
            a[(x + 1) + stride * (y + 1)] = dcval as u8;
        }
    }
}

fn predict_tmpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    for y in 0usize..size {
        for x in 0usize..size {
            let pred = i32::from(a[(y0 + y) * stride + x0 - 1])
                + i32::from(a[(y0 - 1) * stride + x0 + x])
                - i32::from(a[(y0 - 1) * stride + x0 - 1]);

            a[(x + x0) + stride * (y + y0)] = pred.clamp(0, 255) as u8;
        }
    }
}

fn predict_bdcpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let mut v = 4;
    for i in 0usize..4 {
        v += u32::from(a[(y0 + i) * stride + x0 - 1]) + u32::from(a[(y0 - 1) * stride + x0 + i]);
    }

    v >>= 3;
    for y in 0usize..4 {
        for x in 0usize..4 {
            a[x + x0 + stride * (y + y0)] = v as u8;
        }
    }
}

fn topleft_pixel(a: &[u8], x0: usize, y0: usize, stride: usize) -> u8 {
    a[(y0 - 1) * stride + x0 - 1]
}

#[allow(clippy::type_complexity)]
fn top_pixels(a: &[u8], x0: usize, y0: usize, stride: usize) -> (u8, u8, u8, u8, u8, u8, u8, u8) {
    let pos = (y0 - 1) * stride + x0;
    (
        a[pos],
        a[pos + 1],
        a[pos + 2],
        a[pos + 3],
        a[pos + 4],
        a[pos + 5],
        a[pos + 6],
        a[pos + 7],
    )
}

fn left_pixels(a: &[u8], x0: usize, y0: usize, stride: usize) -> (u8, u8, u8, u8) {
    (
        a[y0 * stride + x0 - 1],
        a[(y0 + 1) * stride + x0 - 1],
        a[(y0 + 2) * stride + x0 - 1],
        a[(y0 + 3) * stride + x0 - 1],
    )
}

/// The nine edge pixels around a subblock, counter-clockwise from the
/// bottom of the left column to the end of the above row.
#[allow(clippy::type_complexity)]
fn edge_pixels(
    a: &[u8],
    x0: usize,
    y0: usize,
    stride: usize,
) -> (u8, u8, u8, u8, u8, u8, u8, u8, u8) {
    (
        a[(y0 + 3) * stride + x0 - 1],
        a[(y0 + 2) * stride + x0 - 1],
        a[(y0 + 1) * stride + x0 - 1],
        a[y0 * stride + x0 - 1],
        a[(y0 - 1) * stride + x0 - 1],
        a[(y0 - 1) * stride + x0],
        a[(y0 - 1) * stride + x0 + 1],
        a[(y0 - 1) * stride + x0 + 2],
        a[(y0 - 1) * stride + x0 + 3],
    )
}

fn predict_bvepred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let p = topleft_pixel(a, x0, y0, stride);
    let (a0, a1, a2, a3, a4, _, _, _) = top_pixels(a, x0, y0, stride);
    let cols = [avg3(p, a0, a1), avg3(a0, a1, a2), avg3(a1, a2, a3), avg3(a2, a3, a4)];

    for y in 0usize..4 {
        for (x, &v) in cols.iter().enumerate() {
            a[(y0 + y) * stride + x0 + x] = v;
        }
    }
}

fn predict_bhepred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let p = topleft_pixel(a, x0, y0, stride);
    let (l0, l1, l2, l3) = left_pixels(a, x0, y0, stride);
    let rows = [avg3(p, l0, l1), avg3(l0, l1, l2), avg3(l1, l2, l3), avg3(l2, l3, l3)];

    for (y, &v) in rows.iter().enumerate() {
        for x in 0usize..4 {
            a[(y0 + y) * stride + x0 + x] = v;
        }
    }
}

fn predict_bldpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (a0, a1, a2, a3, a4, a5, a6, a7) = top_pixels(a, x0, y0, stride);
    let diag = [
        avg3(a0, a1, a2),
        avg3(a1, a2, a3),
        avg3(a2, a3, a4),
        avg3(a3, a4, a5),
        avg3(a4, a5, a6),
        avg3(a5, a6, a7),
        avg3(a6, a7, a7),
    ];

    // Each down-left diagonal shares one predicted value.
    for y in 0usize..4 {
        for x in 0usize..4 {
            a[(y0 + y) * stride + x0 + x] = diag[x + y];
        }
    }
}

fn predict_brdpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (e0, e1, e2, e3, e4, e5, e6, e7, e8) = edge_pixels(a, x0, y0, stride);
    let diag = [
        avg3(e0, e1, e2),
        avg3(e1, e2, e3),
        avg3(e2, e3, e4),
        avg3(e3, e4, e5),
        avg3(e4, e5, e6),
        avg3(e5, e6, e7),
        avg3(e6, e7, e8),
    ];

    // Down-right diagonals, from the bottom-left corner up.
    for y in 0usize..4 {
        for x in 0usize..4 {
            a[(y0 + y) * stride + x0 + x] = diag[3 + x - y];
        }
    }
}

fn predict_bvrpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (_, e1, e2, e3, e4, e5, e6, e7, e8) = edge_pixels(a, x0, y0, stride);

    a[(y0 + 3) * stride + x0] = avg3(e1, e2, e3);
    a[(y0 + 2) * stride + x0] = avg3(e2, e3, e4);
    a[(y0 + 3) * stride + x0 + 1] = avg3(e3, e4, e5);
    a[(y0 + 1) * stride + x0] = avg3(e3, e4, e5);
    a[(y0 + 2) * stride + x0 + 1] = avg2(e4, e5);
    a[y0 * stride + x0] = avg2(e4, e5);
    a[(y0 + 3) * stride + x0 + 2] = avg3(e4, e5, e6);
    a[(y0 + 1) * stride + x0 + 1] = avg3(e4, e5, e6);
    a[(y0 + 2) * stride + x0 + 2] = avg2(e5, e6);
    a[y0 * stride + x0 + 1] = avg2(e5, e6);
    a[(y0 + 3) * stride + x0 + 3] = avg3(e5, e6, e7);
    a[(y0 + 1) * stride + x0 + 2] = avg3(e5, e6, e7);
    a[(y0 + 2) * stride + x0 + 3] = avg2(e6, e7);
    a[y0 * stride + x0 + 2] = avg2(e6, e7);
    a[(y0 + 1) * stride + x0 + 3] = avg3(e6, e7, e8);
    a[y0 * stride + x0 + 3] = avg2(e7, e8);
}

fn predict_bvlpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (a0, a1, a2, a3, a4, a5, a6, a7) = top_pixels(a, x0, y0, stride);

    a[y0 * stride + x0] = avg2(a0, a1);
    a[(y0 + 1) * stride + x0] = avg3(a0, a1, a2);
    a[(y0 + 2) * stride + x0] = avg2(a1, a2);
    a[y0 * stride + x0 + 1] = avg2(a1, a2);
    a[(y0 + 1) * stride + x0 + 1] = avg3(a1, a2, a3);
    a[(y0 + 3) * stride + x0] = avg3(a1, a2, a3);
    a[(y0 + 2) * stride + x0 + 1] = avg2(a2, a3);
    a[y0 * stride + x0 + 2] = avg2(a2, a3);
    a[(y0 + 3) * stride + x0 + 1] = avg3(a2, a3, a4);
    a[(y0 + 1) * stride + x0 + 2] = avg3(a2, a3, a4);
    a[(y0 + 2) * stride + x0 + 2] = avg2(a3, a4);
    a[y0 * stride + x0 + 3] = avg2(a3, a4);
    a[(y0 + 3) * stride + x0 + 2] = avg3(a3, a4, a5);
    a[(y0 + 1) * stride + x0 + 3] = avg3(a3, a4, a5);
    a[(y0 + 2) * stride + x0 + 3] = avg3(a4, a5, a6);
    a[(y0 + 3) * stride + x0 + 3] = avg3(a5, a6, a7);
}

fn predict_bhdpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (e0, e1, e2, e3, e4, e5, e6, e7, _) = edge_pixels(a, x0, y0, stride);

    a[(y0 + 3) * stride + x0] = avg2(e0, e1);
    a[(y0 + 3) * stride + x0 + 1] = avg3(e0, e1, e2);
    a[(y0 + 2) * stride + x0] = avg2(e1, e2);
    a[(y0 + 3) * stride + x0 + 2] = avg2(e1, e2);
    a[(y0 + 2) * stride + x0 + 1] = avg3(e1, e2, e3);
    a[(y0 + 3) * stride + x0 + 3] = avg3(e1, e2, e3);
    a[(y0 + 2) * stride + x0 + 2] = avg2(e2, e3);
    a[(y0 + 1) * stride + x0] = avg2(e2, e3);
    a[(y0 + 2) * stride + x0 + 3] = avg3(e2, e3, e4);
    a[(y0 + 1) * stride + x0 + 1] = avg3(e2, e3, e4);
    a[(y0 + 1) * stride + x0 + 2] = avg2(e3, e4);
    a[y0 * stride + x0] = avg2(e3, e4);
    a[(y0 + 1) * stride + x0 + 3] = avg3(e3, e4, e5);
    a[y0 * stride + x0 + 1] = avg3(e3, e4, e5);
    a[y0 * stride + x0 + 2] = avg3(e4, e5, e6);
    a[y0 * stride + x0 + 3] = avg3(e5, e6, e7);
}

fn predict_bhupred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (l0, l1, l2, l3) = left_pixels(a, x0, y0, stride);

    a[y0 * stride + x0] = avg2(l0, l1);
    a[y0 * stride + x0 + 1] = avg3(l0, l1, l2);
    a[y0 * stride + x0 + 2] = avg2(l1, l2);
    a[(y0 + 1) * stride + x0] = avg2(l1, l2);
    a[y0 * stride + x0 + 3] = avg3(l1, l2, l3);
    a[(y0 + 1) * stride + x0 + 1] = avg3(l1, l2, l3);
    a[(y0 + 1) * stride + x0 + 2] = avg2(l2, l3);
    a[(y0 + 2) * stride + x0] = avg2(l2, l3);
    a[(y0 + 1) * stride + x0 + 3] = avg3(l2, l3, l3);
    a[(y0 + 2) * stride + x0 + 1] = avg3(l2, l3, l3);
    a[(y0 + 2) * stride + x0 + 2] = l3;
    a[(y0 + 2) * stride + x0 + 3] = l3;
    a[(y0 + 3) * stride + x0] = l3;
    a[(y0 + 3) * stride + x0 + 1] = l3;
    a[(y0 + 3) * stride + x0 + 2] = l3;
    a[(y0 + 3) * stride + x0 + 3] = l3;
}

/// Predicts and reconstructs the luma macroblock at (mbx, mby), carrying
/// the reconstruction borders forward and cropping into the frame plane.
#[allow(clippy::too_many_arguments)]
pub fn predict_luma(
    frame: &mut YuvFrame,
    borders: &mut Borders,
    mbx: usize,
    mby: usize,
    mbw: usize,
    luma_mode: LumaMode,
    bpred: &[IntraMode; 16],
    resdata: &[i32],
) {
    let stride = LUMA_STRIDE;
    let w = usize::from(frame.width);
    let mut ws = create_border_luma(mbx, mby, mbw, &borders.top_y, &borders.left_y);

    match luma_mode {
        LumaMode::V => predict_vpred(&mut ws, 16, 1, 1, stride),
        LumaMode::H => predict_hpred(&mut ws, 16, 1, 1, stride),
        LumaMode::TM => predict_tmpred(&mut ws, 16, 1, 1, stride),
        LumaMode::DC => predict_dcpred(&mut ws, 16, stride, mby != 0, mbx != 0),
        LumaMode::B => predict_4x4(&mut ws, stride, bpred, resdata),
    }

    if luma_mode != LumaMode::B {
        for y in 0usize..4 {
            for x in 0usize..4 {
                let i = x + y * 4;
                let rb = &resdata[i * 16..i * 16 + 16];
                add_residue(&mut ws, rb, 1 + y * 4, 1 + x * 4, stride);
            }
        }
    }

    borders.left_y[0] = ws[16];
    for i in 0usize..16 {
        borders.top_y[mbx * 16 + i] = ws[16 * stride + 1 + i];
        borders.left_y[i + 1] = ws[(i + 1) * stride + 16];
    }

    let ylength = (usize::from(frame.height) - mby * 16).min(16);
    let xlength = (w - mbx * 16).min(16);

    for y in 0usize..ylength {
        let row = &ws[(1 + y) * stride + 1..][..xlength];
        frame.y[(mby * 16 + y) * w + mbx * 16..][..xlength].copy_from_slice(row);
    }
}

fn set_chroma_border(left_border: &mut [u8; 9], top_border: &mut [u8], ws: &[u8], mbx: usize) {
    let stride = CHROMA_STRIDE;

    // The corner for the next macroblock is this block's top-right pixel.
    left_border[0] = ws[8];

    for (i, left) in left_border[1..].iter_mut().enumerate() {
        *left = ws[(i + 1) * stride + 8];
    }

    for (top, &w) in top_border[mbx * 8..][..8]
        .iter_mut()
        .zip(&ws[8 * stride + 1..][..8])
    {
        *top = w;
    }
}

/// Predicts and reconstructs both chroma blocks of the macroblock at
/// (mbx, mby).
pub fn predict_chroma(
    frame: &mut YuvFrame,
    borders: &mut Borders,
    mbx: usize,
    mby: usize,
    chroma_mode: ChromaMode,
    resdata: &[i32],
) {
    let stride = CHROMA_STRIDE;
    let w = usize::from(frame.chroma_width());

    let mut uws = create_border_chroma(mbx, mby, &borders.top_u, &borders.left_u);
    let mut vws = create_border_chroma(mbx, mby, &borders.top_v, &borders.left_v);

    match chroma_mode {
        ChromaMode::DC => {
            predict_dcpred(&mut uws, 8, stride, mby != 0, mbx != 0);
            predict_dcpred(&mut vws, 8, stride, mby != 0, mbx != 0);
        }
        ChromaMode::V => {
            predict_vpred(&mut uws, 8, 1, 1, stride);
            predict_vpred(&mut vws, 8, 1, 1, stride);
        }
        ChromaMode::H => {
            predict_hpred(&mut uws, 8, 1, 1, stride);
            predict_hpred(&mut vws, 8, 1, 1, stride);
        }
        ChromaMode::TM => {
            predict_tmpred(&mut uws, 8, 1, 1, stride);
            predict_tmpred(&mut vws, 8, 1, 1, stride);
        }
    }

    for y in 0usize..2 {
        for x in 0usize..2 {
            let i = x + y * 2;
            let y0 = 1 + y * 4;
            let x0 = 1 + x * 4;

            add_residue(&mut uws, &resdata[16 * 16 + i * 16..][..16], y0, x0, stride);
            add_residue(&mut vws, &resdata[20 * 16 + i * 16..][..16], y0, x0, stride);
        }
    }

    set_chroma_border(&mut borders.left_u, &mut borders.top_u, &uws, mbx);
    set_chroma_border(&mut borders.left_v, &mut borders.top_v, &vws, mbx);

    let ylength = (usize::from(frame.chroma_height()) - mby * 8).min(8);
    let xlength = (w - mbx * 8).min(8);

    for y in 0usize..ylength {
        let ws_index = (1 + y) * stride + 1;
        let buf_index = (mby * 8 + y) * w + mbx * 8;

        frame.u[buf_index..][..xlength].copy_from_slice(&uws[ws_index..][..xlength]);
        frame.v[buf_index..][..xlength].copy_from_slice(&vws[ws_index..][..xlength]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_left_macroblock_borders_use_defaults() {
        let borders = Borders::new(2);
        let ws = create_border_luma(0, 0, 2, &borders.top_y, &borders.left_y);

        assert_eq!(ws[0], 127);
        assert!(ws[1..LUMA_STRIDE].iter().all(|&p| p == 127));
        for y in 1..17 {
            assert_eq!(ws[y * LUMA_STRIDE], 129);
        }
    }

    #[test]
    fn dc_prediction_without_neighbours_is_mid_grey() {
        let mut ws = [0u8; LUMA_WS_SIZE];
        predict_dcpred(&mut ws, 16, LUMA_STRIDE, false, false);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(ws[(y + 1) * LUMA_STRIDE + x + 1], 128);
            }
        }
    }

    #[test]
    fn dc_prediction_averages_with_rounding() {
        let mut ws = [0u8; CHROMA_WS_SIZE];
        // Above row 100s, left column 104s: average 102.
        for x in 0..8 {
            ws[1 + x] = 100;
        }
        for y in 0..8 {
            ws[(y + 1) * CHROMA_STRIDE] = 104;
        }
        predict_dcpred(&mut ws, 8, CHROMA_STRIDE, true, true);
        assert_eq!(ws[CHROMA_STRIDE + 1], 102);
    }

    #[test]
    fn tm_prediction_propagates_gradient() {
        let mut ws = [0u8; LUMA_WS_SIZE];
        ws[0] = 100; // corner
        for x in 0..16 {
            ws[1 + x] = 110; // above
        }
        for y in 0..16 {
            ws[(y + 1) * LUMA_STRIDE] = 120; // left
        }
        predict_tmpred(&mut ws, 16, 1, 1, LUMA_STRIDE);
        // left + above - corner = 120 + 110 - 100.
        assert_eq!(ws[LUMA_STRIDE + 1], 130);
    }

    #[test]
    fn add_residue_saturates() {
        let mut block = [200u8; 5 * 5];
        let residue = [100i32; 16];
        add_residue(&mut block, &residue, 1, 1, 5);
        assert_eq!(block[5 + 1], 255);

        let mut block = [10u8; 5 * 5];
        let residue = [-100i32; 16];
        add_residue(&mut block, &residue, 1, 1, 5);
        assert_eq!(block[5 + 1], 0);
    }

    #[test]
    fn averaging_helpers_round_up() {
        assert_eq!(avg2(1, 2), 2);
        assert_eq!(avg3(1, 2, 3), 2);
        assert_eq!(avg3(255, 255, 255), 255);
    }
}
