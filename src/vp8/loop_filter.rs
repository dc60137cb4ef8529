//! In-loop deblocking filter (RFC 6386 15).
//!
//! Runs as a separate pass once the whole frame is reconstructed, walking
//! macroblocks in raster order and smoothing macroblock and subblock
//! edges. Pixel windows are addressed by the position of the first sample
//! past the edge and a step, so the same kernels serve vertical edges
//! (step 1) and horizontal edges (step = row stride).

use crate::vp8::header::{LoopFilterHeader, Segment, Segmentation};
use crate::vp8::picture::YuvFrame;
use crate::vp8::tables::MAX_SEGMENTS;

/// Per-macroblock facts the filter pass needs from reconstruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroblockFilterInfo {
    pub segmentid: u8,
    pub is_bpred: bool,
    /// Interior subblock edges are only filtered for B_PRED macroblocks
    /// or when the macroblock carried coefficients.
    pub has_coefficients: bool,
}

fn c(val: i32) -> i32 {
    val.clamp(-128, 127)
}

fn u2s(val: u8) -> i32 {
    i32::from(val) - 128
}

fn s2u(val: i32) -> u8 {
    (c(val) + 128) as u8
}

/// Adjusts the two samples either side of the edge and returns the
/// filter value for the outer tap decision.
fn common_adjust(use_outer_taps: bool, pixels: &mut [u8], point: usize, step: usize) -> i32 {
    let p1 = u2s(pixels[point - 2 * step]);
    let p0 = u2s(pixels[point - step]);
    let q0 = u2s(pixels[point]);
    let q1 = u2s(pixels[point + step]);

    let outer = if use_outer_taps { c(p1 - q1) } else { 0 };
    let a = c(outer + 3 * (q0 - p0));

    let f = c(a + 4) >> 3;
    pixels[point] = s2u(q0 - f);
    pixels[point - step] = s2u(p0 + (c(a + 3) >> 3));

    f
}

fn simple_threshold(filter_limit: i32, pixels: &[u8], point: usize, step: usize) -> bool {
    let p1 = i32::from(pixels[point - 2 * step]);
    let p0 = i32::from(pixels[point - step]);
    let q0 = i32::from(pixels[point]);
    let q1 = i32::from(pixels[point + step]);

    (p0 - q0).abs() * 2 + (p1 - q1).abs() / 2 <= filter_limit
}

fn should_filter(interior_limit: i32, edge_limit: i32, pixels: &[u8], point: usize, step: usize) -> bool {
    let p3 = i32::from(pixels[point - 4 * step]);
    let p2 = i32::from(pixels[point - 3 * step]);
    let p1 = i32::from(pixels[point - 2 * step]);
    let p0 = i32::from(pixels[point - step]);
    let q0 = i32::from(pixels[point]);
    let q1 = i32::from(pixels[point + step]);
    let q2 = i32::from(pixels[point + 2 * step]);
    let q3 = i32::from(pixels[point + 3 * step]);

    simple_threshold(edge_limit, pixels, point, step)
        && (p3 - p2).abs() <= interior_limit
        && (p2 - p1).abs() <= interior_limit
        && (p1 - p0).abs() <= interior_limit
        && (q3 - q2).abs() <= interior_limit
        && (q2 - q1).abs() <= interior_limit
        && (q1 - q0).abs() <= interior_limit
}

fn high_edge_variance(threshold: i32, pixels: &[u8], point: usize, step: usize) -> bool {
    let p1 = i32::from(pixels[point - 2 * step]);
    let p0 = i32::from(pixels[point - step]);
    let q0 = i32::from(pixels[point]);
    let q1 = i32::from(pixels[point + step]);

    (p1 - p0).abs() > threshold || (q1 - q0).abs() > threshold
}

/// Simple filter: two-tap adjustment on the samples either side of the
/// edge, luma only.
pub fn simple_segment(edge_limit: u8, pixels: &mut [u8], point: usize, step: usize) {
    if simple_threshold(i32::from(edge_limit), pixels, point, step) {
        common_adjust(true, pixels, point, step);
    }
}

/// Normal filter for interior subblock edges.
pub fn subblock_filter(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    pixels: &mut [u8],
    point: usize,
    step: usize,
) {
    if should_filter(
        i32::from(interior_limit),
        i32::from(edge_limit),
        pixels,
        point,
        step,
    ) {
        let hev = high_edge_variance(i32::from(hev_threshold), pixels, point, step);
        let f = common_adjust(hev, pixels, point, step);

        if !hev {
            let a = (f + 1) >> 1;
            let q1 = u2s(pixels[point + step]);
            let p1 = u2s(pixels[point - 2 * step]);
            pixels[point + step] = s2u(q1 - a);
            pixels[point - 2 * step] = s2u(p1 + a);
        }
    }
}

/// Normal filter for macroblock edges: wider taps reaching three samples
/// either side when the edge is smooth.
pub fn macroblock_filter(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    pixels: &mut [u8],
    point: usize,
    step: usize,
) {
    if should_filter(
        i32::from(interior_limit),
        i32::from(edge_limit),
        pixels,
        point,
        step,
    ) {
        if high_edge_variance(i32::from(hev_threshold), pixels, point, step) {
            common_adjust(true, pixels, point, step);
            return;
        }

        let p2 = u2s(pixels[point - 3 * step]);
        let p1 = u2s(pixels[point - 2 * step]);
        let p0 = u2s(pixels[point - step]);
        let q0 = u2s(pixels[point]);
        let q1 = u2s(pixels[point + step]);
        let q2 = u2s(pixels[point + 2 * step]);

        let w = c(c(p1 - q1) + 3 * (q0 - p0));

        let a = c((27 * w + 63) >> 7);
        pixels[point] = s2u(q0 - a);
        pixels[point - step] = s2u(p0 + a);

        let a = c((18 * w + 63) >> 7);
        pixels[point + step] = s2u(q1 - a);
        pixels[point - 2 * step] = s2u(p1 + a);

        let a = c((9 * w + 63) >> 7);
        pixels[point + 2 * step] = s2u(q2 - a);
        pixels[point - 3 * step] = s2u(p2 + a);
    }
}

/// Resolves the filter level, interior limit and high edge variance
/// threshold for one macroblock (RFC 6386 15.1, key frames).
pub fn calculate_filter_parameters(
    lf: &LoopFilterHeader,
    segmentation: &Segmentation,
    segments: &[Segment; MAX_SEGMENTS],
    mb: &MacroblockFilterInfo,
) -> (u8, u8, u8) {
    let segment = &segments[usize::from(mb.segmentid)];
    let mut filter_level = i32::from(lf.level);

    if segmentation.enabled {
        if segmentation.delta_values {
            filter_level += segment.loopfilter_level;
        } else {
            filter_level = segment.loopfilter_level;
        }
    }

    // The segment-resolved level saturates before the deltas apply.
    let mut filter_level = filter_level.clamp(0, 63);

    if lf.adjustments_enabled {
        // Index 0 of the reference deltas is the intra frame.
        filter_level += lf.ref_deltas[0];
        if mb.is_bpred {
            filter_level += lf.mode_deltas[0];
        }
    }

    let filter_level = filter_level.clamp(0, 63) as u8;

    let mut interior_limit = filter_level;
    if lf.sharpness > 0 {
        interior_limit >>= if lf.sharpness > 4 { 2 } else { 1 };

        if interior_limit > 9 - lf.sharpness {
            interior_limit = 9 - lf.sharpness;
        }
    }
    if interior_limit == 0 {
        interior_limit = 1;
    }

    let hev_threshold = if filter_level >= 40 {
        2
    } else if filter_level >= 15 {
        1
    } else {
        0
    };

    (filter_level, interior_limit, hev_threshold)
}

/// Filters one macroblock's edges in the fully reconstructed frame.
#[allow(clippy::too_many_arguments)]
fn filter_macroblock(
    frame: &mut YuvFrame,
    lf: &LoopFilterHeader,
    segmentation: &Segmentation,
    segments: &[Segment; MAX_SEGMENTS],
    mb: &MacroblockFilterInfo,
    mbx: usize,
    mby: usize,
) {
    let luma_w = usize::from(frame.width);
    let luma_h = usize::from(frame.height);
    let chroma_w = usize::from(frame.chroma_width());
    let chroma_h = usize::from(frame.chroma_height());

    let (filter_level, interior_limit, hev_threshold) =
        calculate_filter_parameters(lf, segmentation, segments, mb);

    if filter_level == 0 {
        return;
    }

    let mbedge_limit = (filter_level + 2) * 2 + interior_limit;
    let sub_bedge_limit = filter_level * 2 + interior_limit;

    let luma_ylength = (luma_h - 16 * mby).min(16);
    let luma_xlength = (luma_w - 16 * mbx).min(16);
    let chroma_ylength = (chroma_h - 8 * mby).min(8);
    let chroma_xlength = (chroma_w - 8 * mbx).min(8);

    let inner_edges = mb.is_bpred || mb.has_coefficients;

    // Left macroblock edge.
    if mbx > 0 {
        if lf.use_simple {
            if luma_xlength >= 2 {
                for y in 0..luma_ylength {
                    let point = (mby * 16 + y) * luma_w + mbx * 16;
                    simple_segment(mbedge_limit, &mut frame.y, point, 1);
                }
            }
        } else {
            if luma_xlength >= 4 {
                for y in 0..luma_ylength {
                    let point = (mby * 16 + y) * luma_w + mbx * 16;
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.y,
                        point,
                        1,
                    );
                }
            }

            if chroma_xlength >= 4 {
                for y in 0..chroma_ylength {
                    let point = (mby * 8 + y) * chroma_w + mbx * 8;
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.u,
                        point,
                        1,
                    );
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.v,
                        point,
                        1,
                    );
                }
            }
        }
    }

    // Vertical subblock edges.
    if inner_edges {
        if lf.use_simple {
            if luma_xlength >= 2 {
                for x in (4..luma_xlength - 1).step_by(4) {
                    for y in 0..luma_ylength {
                        let point = (mby * 16 + y) * luma_w + mbx * 16 + x;
                        simple_segment(sub_bedge_limit, &mut frame.y, point, 1);
                    }
                }
            }
        } else {
            if luma_xlength > 3 {
                for x in (4..luma_xlength - 3).step_by(4) {
                    for y in 0..luma_ylength {
                        let point = (mby * 16 + y) * luma_w + mbx * 16 + x;
                        subblock_filter(
                            hev_threshold,
                            interior_limit,
                            sub_bedge_limit,
                            &mut frame.y,
                            point,
                            1,
                        );
                    }
                }
            }

            if chroma_xlength == 8 {
                for y in 0..chroma_ylength {
                    let point = (mby * 8 + y) * chroma_w + mbx * 8 + 4;
                    subblock_filter(
                        hev_threshold,
                        interior_limit,
                        sub_bedge_limit,
                        &mut frame.u,
                        point,
                        1,
                    );
                    subblock_filter(
                        hev_threshold,
                        interior_limit,
                        sub_bedge_limit,
                        &mut frame.v,
                        point,
                        1,
                    );
                }
            }
        }
    }

    // Top macroblock edge.
    if mby > 0 {
        if lf.use_simple {
            if luma_ylength >= 2 {
                for x in 0..luma_xlength {
                    let point = mby * 16 * luma_w + mbx * 16 + x;
                    simple_segment(mbedge_limit, &mut frame.y, point, luma_w);
                }
            }
        } else {
            if luma_ylength >= 4 {
                for x in 0..luma_xlength {
                    let point = mby * 16 * luma_w + mbx * 16 + x;
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.y,
                        point,
                        luma_w,
                    );
                }
            }

            if chroma_ylength >= 4 {
                for x in 0..chroma_xlength {
                    let point = mby * 8 * chroma_w + mbx * 8 + x;
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.u,
                        point,
                        chroma_w,
                    );
                    macroblock_filter(
                        hev_threshold,
                        interior_limit,
                        mbedge_limit,
                        &mut frame.v,
                        point,
                        chroma_w,
                    );
                }
            }
        }
    }

    // Horizontal subblock edges.
    if inner_edges {
        if lf.use_simple {
            if luma_ylength >= 2 {
                for y in (4..luma_ylength - 1).step_by(4) {
                    for x in 0..luma_xlength {
                        let point = (mby * 16 + y) * luma_w + mbx * 16 + x;
                        simple_segment(sub_bedge_limit, &mut frame.y, point, luma_w);
                    }
                }
            }
        } else {
            if luma_ylength > 3 {
                for y in (4..luma_ylength - 3).step_by(4) {
                    for x in 0..luma_xlength {
                        let point = (mby * 16 + y) * luma_w + mbx * 16 + x;
                        subblock_filter(
                            hev_threshold,
                            interior_limit,
                            sub_bedge_limit,
                            &mut frame.y,
                            point,
                            luma_w,
                        );
                    }
                }
            }

            if chroma_ylength == 8 {
                for x in 0..chroma_xlength {
                    let point = (mby * 8 + 4) * chroma_w + mbx * 8 + x;
                    subblock_filter(
                        hev_threshold,
                        interior_limit,
                        sub_bedge_limit,
                        &mut frame.u,
                        point,
                        chroma_w,
                    );
                    subblock_filter(
                        hev_threshold,
                        interior_limit,
                        sub_bedge_limit,
                        &mut frame.v,
                        point,
                        chroma_w,
                    );
                }
            }
        }
    }
}

/// Runs the deblocking pass over the whole frame.
pub fn filter_frame(
    frame: &mut YuvFrame,
    lf: &LoopFilterHeader,
    segmentation: &Segmentation,
    segments: &[Segment; MAX_SEGMENTS],
    mb_info: &[MacroblockFilterInfo],
    mb_width: usize,
) {
    if lf.level == 0 && !segmentation.enabled && !lf.adjustments_enabled {
        return;
    }

    for (i, mb) in mb_info.iter().enumerate() {
        let mbx = i % mb_width;
        let mby = i / mb_width;
        filter_macroblock(frame, lf, segmentation, segments, mb, mbx, mby);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn flat_frame(width: u16, height: u16, value: u8) -> YuvFrame {
        let mut f = YuvFrame::new(width, height);
        f.y.fill(value);
        f.u.fill(value);
        f.v.fill(value);
        f
    }

    #[test]
    fn level_zero_is_a_passthrough() {
        let mut frame = flat_frame(32, 32, 77);
        let reference = frame.clone();

        let lf = LoopFilterHeader::default();
        let segmentation = Segmentation::default();
        let segments = [Segment::default(); MAX_SEGMENTS];
        let info = vec![MacroblockFilterInfo::default(); 4];

        filter_frame(&mut frame, &lf, &segmentation, &segments, &info, 2);

        assert_eq!(frame.y, reference.y);
        assert_eq!(frame.u, reference.u);
        assert_eq!(frame.v, reference.v);
    }

    #[test]
    fn uniform_frame_is_unchanged_at_any_level() {
        // With no edges there is nothing for the filter to move.
        let mut frame = flat_frame(32, 32, 128);
        let reference = frame.clone();

        let lf = LoopFilterHeader {
            level: 32,
            ..LoopFilterHeader::default()
        };
        let segmentation = Segmentation::default();
        let segments = [Segment::default(); MAX_SEGMENTS];
        let info = vec![
            MacroblockFilterInfo {
                has_coefficients: true,
                ..MacroblockFilterInfo::default()
            };
            4
        ];

        filter_frame(&mut frame, &lf, &segmentation, &segments, &info, 2);

        assert_eq!(frame.y, reference.y);
    }

    #[test]
    fn simple_filter_smooths_a_step_edge() {
        let mut pixels = vec![100u8; 16];
        for p in pixels.iter_mut().skip(8) {
            *p = 120;
        }

        simple_segment(60, &mut pixels, 8, 1);

        // The two samples either side of the edge move toward each other.
        assert!(pixels[7] > 100);
        assert!(pixels[8] < 120);
    }

    #[test]
    fn simple_filter_leaves_strong_edges() {
        let mut pixels = vec![0u8; 16];
        for p in pixels.iter_mut().skip(8) {
            *p = 255;
        }
        let reference = pixels.clone();

        simple_segment(40, &mut pixels, 8, 1);

        assert_eq!(pixels, reference);
    }

    #[test]
    fn filter_parameters_respect_segment_overrides() {
        let lf = LoopFilterHeader {
            level: 20,
            ..LoopFilterHeader::default()
        };
        let mut segmentation = Segmentation {
            enabled: true,
            ..Segmentation::default()
        };
        let mut segments = [Segment::default(); MAX_SEGMENTS];
        segments[1].loopfilter_level = 45;
        let mb = MacroblockFilterInfo {
            segmentid: 1,
            ..MacroblockFilterInfo::default()
        };

        // Absolute mode replaces the frame level.
        let (level, _, hev) = calculate_filter_parameters(&lf, &segmentation, &segments, &mb);
        assert_eq!(level, 45);
        assert_eq!(hev, 2);

        // Delta mode adds to it.
        segmentation.delta_values = true;
        segments[1].loopfilter_level = -5;
        let (level, _, hev) = calculate_filter_parameters(&lf, &segmentation, &segments, &mb);
        assert_eq!(level, 15);
        assert_eq!(hev, 1);
    }

    #[test]
    fn segment_level_saturates_before_reference_deltas() {
        let lf = LoopFilterHeader {
            level: 40,
            adjustments_enabled: true,
            ref_deltas: [-20, 0, 0, 0],
            ..LoopFilterHeader::default()
        };
        let segmentation = Segmentation {
            enabled: true,
            delta_values: true,
            ..Segmentation::default()
        };
        let mut segments = [Segment::default(); MAX_SEGMENTS];
        segments[0].loopfilter_level = 60;
        let mb = MacroblockFilterInfo::default();

        // 40 + 60 saturates to 63 before the intra delta, so the delta
        // applies to 63 rather than the raw sum.
        let (level, _, _) = calculate_filter_parameters(&lf, &segmentation, &segments, &mb);
        assert_eq!(level, 43);
    }

    #[test]
    fn hev_threshold_steps_at_fifteen_and_forty() {
        let segmentation = Segmentation::default();
        let segments = [Segment::default(); MAX_SEGMENTS];
        let mb = MacroblockFilterInfo::default();

        for (level, expected) in [(10u8, 0u8), (14, 0), (15, 1), (39, 1), (40, 2), (63, 2)] {
            let lf = LoopFilterHeader {
                level,
                ..LoopFilterHeader::default()
            };
            let (_, _, hev) = calculate_filter_parameters(&lf, &segmentation, &segments, &mb);
            assert_eq!(hev, expected, "level {level}");
        }
    }

    #[test]
    fn interior_limit_follows_sharpness() {
        let lf = LoopFilterHeader {
            level: 40,
            sharpness: 5,
            ..LoopFilterHeader::default()
        };
        let segmentation = Segmentation::default();
        let segments = [Segment::default(); MAX_SEGMENTS];
        let mb = MacroblockFilterInfo::default();

        let (_, interior, _) = calculate_filter_parameters(&lf, &segmentation, &segments, &mb);
        // 40 >> 2 = 10, capped at 9 - sharpness.
        assert_eq!(interior, 4);
    }
}
