//! VP8 key frame decoding (RFC 6386).
//!
//! The decoder runs in two passes: macroblocks are entropy-decoded,
//! predicted and reconstructed in raster order, then the loop filter
//! smooths block edges over the finished planes.

mod bool_decoder;
mod header;
mod loop_filter;
mod picture;
mod predict;
mod residual;
mod tables;
mod transform;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::AtomicBool;

use crate::error::{check_stop, Result, Vp8Error};
use bool_decoder::BoolDecoder;
use header::{
    parse_frame_tag, parse_keyframe_dimensions, read_loop_filter_adjustments,
    read_quantization_indices, read_segment_updates, split_partitions, update_token_probabilities,
    LoopFilterHeader, Segment, Segmentation, KEYFRAME_HEADER_LEN,
};
use loop_filter::MacroblockFilterInfo;
use residual::read_macroblock_residuals;
use tables::{
    TokenProbTables, B_PRED, COEFF_PROBS, DC_PRED, H_PRED, KEYFRAME_BPRED_MODE_PROBS,
    KEYFRAME_BPRED_MODE_TREE, KEYFRAME_UV_MODE_PROBS, KEYFRAME_UV_MODE_TREE,
    KEYFRAME_YMODE_PROBS, KEYFRAME_YMODE_TREE, MAX_SEGMENTS, SEGMENT_ID_TREE, TM_PRED, V_PRED,
};

pub use picture::YuvFrame;

/// Facts from the uncompressed part of the frame header, available
/// without decoding any entropy-coded data.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Luma width in pixels.
    pub width: u16,
    /// Luma height in pixels.
    pub height: u16,
    /// Horizontal upscaling code (informative only).
    pub xscale: u8,
    /// Vertical upscaling code (informative only).
    pub yscale: u8,
    /// Bitstream version, 0 to 3.
    pub version: u8,
    /// Whether the frame is intended for display.
    pub show_frame: bool,
}

/// Whole-macroblock luma prediction modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LumaMode {
    #[default]
    DC,
    V,
    H,
    TM,
    B,
}

impl LumaMode {
    fn from_i8(val: i8) -> Option<LumaMode> {
        Some(match val {
            DC_PRED => LumaMode::DC,
            V_PRED => LumaMode::V,
            H_PRED => LumaMode::H,
            TM_PRED => LumaMode::TM,
            B_PRED => LumaMode::B,
            _ => return None,
        })
    }

    /// The subblock mode equivalent seeded into the neighbour context,
    /// or `None` for B_PRED which codes its own subblock modes.
    fn into_intra(self) -> Option<IntraMode> {
        match self {
            LumaMode::DC => Some(IntraMode::DC),
            LumaMode::V => Some(IntraMode::VE),
            LumaMode::H => Some(IntraMode::HE),
            LumaMode::TM => Some(IntraMode::TM),
            LumaMode::B => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ChromaMode {
    #[default]
    DC,
    V,
    H,
    TM,
}

impl ChromaMode {
    fn from_i8(val: i8) -> Option<ChromaMode> {
        Some(match val {
            DC_PRED => ChromaMode::DC,
            V_PRED => ChromaMode::V,
            H_PRED => ChromaMode::H,
            TM_PRED => ChromaMode::TM,
            _ => return None,
        })
    }
}

/// 4x4 luma subblock prediction modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum IntraMode {
    #[default]
    DC = 0,
    TM = 1,
    VE = 2,
    HE = 3,
    LD = 4,
    RD = 5,
    VR = 6,
    VL = 7,
    HD = 8,
    HU = 9,
}

impl IntraMode {
    fn from_i8(val: i8) -> Option<IntraMode> {
        Some(match val {
            0 => IntraMode::DC,
            1 => IntraMode::TM,
            2 => IntraMode::VE,
            3 => IntraMode::HE,
            4 => IntraMode::LD,
            5 => IntraMode::RD,
            6 => IntraMode::VR,
            7 => IntraMode::VL,
            8 => IntraMode::HD,
            9 => IntraMode::HU,
            _ => return None,
        })
    }
}

/// Per-macroblock decode state, also used as the above/left neighbour
/// context.
#[derive(Debug, Clone, Copy, Default)]
struct MacroBlock {
    luma_mode: LumaMode,
    chroma_mode: ChromaMode,
    segmentid: u8,
    bpred: [IntraMode; 16],
    complexity: [u8; 9],
}

/// Probes the uncompressed frame header.
pub(crate) fn get_info(data: &[u8]) -> Result<FrameInfo> {
    let tag = parse_frame_tag(data)?;
    if !tag.keyframe {
        return Err(Vp8Error::UnsupportedFrameType("inter frame"));
    }
    let dims = parse_keyframe_dimensions(data)?;

    Ok(FrameInfo {
        width: dims.width,
        height: dims.height,
        xscale: dims.xscale,
        yscale: dims.yscale,
        version: tag.version,
        show_frame: tag.show_frame,
    })
}

/// Decodes a VP8 key frame payload into planar YUV.
pub(crate) fn decode(data: &[u8], stop: Option<&AtomicBool>) -> Result<YuvFrame> {
    let mut decoder = FrameDecoder::new(data)?;
    decoder.decode_frame(stop)?;
    Ok(decoder.frame)
}

struct FrameDecoder<'a> {
    /// First partition: header remainder and per-macroblock headers.
    b: BoolDecoder<'a>,
    /// Residual token partitions, selected per macroblock row.
    partitions: Vec<BoolDecoder<'a>>,

    mb_width: usize,
    mb_height: usize,

    segmentation: Segmentation,
    segments: [Segment; MAX_SEGMENTS],
    lf: LoopFilterHeader,
    token_probs: Box<TokenProbTables>,
    prob_skip_false: Option<u8>,

    top: Vec<MacroBlock>,
    left: MacroBlock,
    borders: predict::Borders,

    frame: YuvFrame,
    mb_info: Vec<MacroblockFilterInfo>,
}

impl<'a> FrameDecoder<'a> {
    /// Parses the complete frame header and sets up decode state.
    fn new(data: &'a [u8]) -> Result<FrameDecoder<'a>> {
        let tag = parse_frame_tag(data)?;
        if !tag.keyframe {
            return Err(Vp8Error::UnsupportedFrameType("inter frame"));
        }

        let dims = parse_keyframe_dimensions(data)?;

        let first_partition_size = tag.first_partition_size as usize;
        if data.len() - KEYFRAME_HEADER_LEN < first_partition_size {
            return Err(Vp8Error::corrupt(
                "first partition size exceeds input",
                KEYFRAME_HEADER_LEN,
            ));
        }
        let first = &data[KEYFRAME_HEADER_LEN..KEYFRAME_HEADER_LEN + first_partition_size];
        let mut b = BoolDecoder::new(first);

        if b.read_flag() {
            return Err(Vp8Error::UnsupportedFeature("non-zero color space"));
        }
        // Clamping type: reconstruction always clamps, so the hint is
        // read and dropped.
        let _clamping_required = b.read_flag();

        let mut segmentation = Segmentation::default();
        let mut segments = [Segment::default(); MAX_SEGMENTS];
        segmentation.enabled = b.read_flag();
        if segmentation.enabled {
            read_segment_updates(&mut b, &mut segmentation, &mut segments);
        }

        let mut lf = LoopFilterHeader {
            use_simple: b.read_flag(),
            level: b.read_literal(6),
            sharpness: b.read_literal(3),
            ..LoopFilterHeader::default()
        };
        lf.adjustments_enabled = b.read_flag();
        if lf.adjustments_enabled {
            read_loop_filter_adjustments(&mut b, &mut lf);
        }

        let num_partitions = 1usize << b.read_literal(2);
        let partitions =
            split_partitions(data, KEYFRAME_HEADER_LEN + first_partition_size, num_partitions)?
                .into_iter()
                .map(BoolDecoder::new)
                .collect();

        read_quantization_indices(&mut b, &segmentation, &mut segments);

        // Meaningless for a single key frame: probabilities never
        // persist past this decode.
        let _refresh_entropy_probs = b.read_flag();

        let mut token_probs = Box::new(COEFF_PROBS);
        update_token_probabilities(&mut b, &mut token_probs);

        let prob_skip_false = if b.read_flag() {
            Some(b.read_literal(8))
        } else {
            None
        };

        let mb_width = usize::from(dims.width).div_ceil(16);
        let mb_height = usize::from(dims.height).div_ceil(16);

        let top = alloc::vec![MacroBlock::default(); mb_width];
        let borders = predict::Borders::new(mb_width);
        let frame = YuvFrame::new(dims.width, dims.height);

        Ok(FrameDecoder {
            b,
            partitions,
            mb_width,
            mb_height,
            segmentation,
            segments,
            lf,
            token_probs,
            prob_skip_false,
            top,
            left: MacroBlock::default(),
            borders,
            frame,
            mb_info: Vec::with_capacity(mb_width * mb_height),
        })
    }

    fn read_macroblock_header(&mut self, mbx: usize) -> Result<(bool, MacroBlock)> {
        let mut mb = MacroBlock::default();

        mb.segmentid = if self.segmentation.enabled && self.segmentation.update_map {
            self.b
                .read_with_tree(&SEGMENT_ID_TREE, &self.segmentation.tree_probs, 0) as u8
        } else {
            0
        };

        let skip_coeff = match self.prob_skip_false {
            Some(prob) => self.b.read_bool(prob),
            None => false,
        };

        let luma = self
            .b
            .read_with_tree(&KEYFRAME_YMODE_TREE, &KEYFRAME_YMODE_PROBS, 0);
        mb.luma_mode = LumaMode::from_i8(luma)
            .ok_or(Vp8Error::corrupt("invalid luma prediction mode", KEYFRAME_HEADER_LEN))?;

        match mb.luma_mode.into_intra() {
            // B_PRED codes one mode per subblock, contexted on the
            // neighbouring subblock modes.
            None => {
                for y in 0usize..4 {
                    for x in 0usize..4 {
                        let top = self.top[mbx].bpred[12 + x];
                        let left = self.left.bpred[y];
                        let intra = self.b.read_with_tree(
                            &KEYFRAME_BPRED_MODE_TREE,
                            &KEYFRAME_BPRED_MODE_PROBS[top as usize][left as usize],
                            0,
                        );
                        let bmode = IntraMode::from_i8(intra).ok_or(Vp8Error::corrupt(
                            "invalid subblock prediction mode",
                            KEYFRAME_HEADER_LEN,
                        ))?;
                        mb.bpred[x + y * 4] = bmode;

                        self.top[mbx].bpred[12 + x] = bmode;
                        self.left.bpred[y] = bmode;
                    }
                }
            }
            Some(mode) => {
                for i in 0usize..4 {
                    mb.bpred[12 + i] = mode;
                    self.left.bpred[i] = mode;
                }
            }
        }

        let chroma = self
            .b
            .read_with_tree(&KEYFRAME_UV_MODE_TREE, &KEYFRAME_UV_MODE_PROBS, 0);
        mb.chroma_mode = ChromaMode::from_i8(chroma)
            .ok_or(Vp8Error::corrupt("invalid chroma prediction mode", KEYFRAME_HEADER_LEN))?;

        self.top[mbx].chroma_mode = mb.chroma_mode;
        self.top[mbx].luma_mode = mb.luma_mode;
        self.top[mbx].bpred = mb.bpred;

        Ok((skip_coeff, mb))
    }

    fn decode_frame(&mut self, stop: Option<&AtomicBool>) -> Result<()> {
        for mby in 0..self.mb_height {
            check_stop(stop)?;

            let p = mby % self.partitions.len();
            self.left = MacroBlock::default();

            for mbx in 0..self.mb_width {
                let (skip, mb) = self.read_macroblock_header(mbx)?;

                let (blocks, has_coefficients) = if !skip {
                    let (blocks, nonzero) = read_macroblock_residuals(
                        &mut self.partitions[p],
                        &self.token_probs,
                        mb.luma_mode == LumaMode::B,
                        &mut self.top[mbx].complexity,
                        &mut self.left.complexity,
                        &self.segments[usize::from(mb.segmentid)],
                    );
                    (blocks, nonzero)
                } else {
                    if mb.luma_mode != LumaMode::B {
                        self.left.complexity[0] = 0;
                        self.top[mbx].complexity[0] = 0;
                    }

                    for i in 1usize..9 {
                        self.left.complexity[i] = 0;
                        self.top[mbx].complexity[i] = 0;
                    }

                    ([0i32; 384], false)
                };

                predict::predict_luma(
                    &mut self.frame,
                    &mut self.borders,
                    mbx,
                    mby,
                    self.mb_width,
                    mb.luma_mode,
                    &mb.bpred,
                    &blocks,
                );
                predict::predict_chroma(
                    &mut self.frame,
                    &mut self.borders,
                    mbx,
                    mby,
                    mb.chroma_mode,
                    &blocks,
                );

                self.mb_info.push(MacroblockFilterInfo {
                    segmentid: mb.segmentid,
                    is_bpred: mb.luma_mode == LumaMode::B,
                    has_coefficients,
                });
            }
        }

        check_stop(stop)?;
        loop_filter::filter_frame(
            &mut self.frame,
            &self.lf,
            &self.segmentation,
            &self.segments,
            &self.mb_info,
            self.mb_width,
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::tables::COEFF_UPDATE_PROBS;

    /// Range encoder matching the reference bitstream writer (RFC 6386
    /// 7.3), used to author test frames.
    struct BoolEncoder {
        out: Vec<u8>,
        range: u32,
        bottom: u32,
        bit_count: i32,
    }

    impl BoolEncoder {
        fn new() -> BoolEncoder {
            BoolEncoder {
                out: Vec::new(),
                range: 255,
                bottom: 0,
                bit_count: 24,
            }
        }

        fn carry(&mut self) {
            for byte in self.out.iter_mut().rev() {
                if *byte == 0xFF {
                    *byte = 0;
                } else {
                    *byte += 1;
                    return;
                }
            }
        }

        fn put(&mut self, prob: u8, value: bool) {
            let split = 1 + (((self.range - 1) * u32::from(prob)) >> 8);

            if value {
                self.bottom += split;
                self.range -= split;
            } else {
                self.range = split;
            }

            while self.range < 128 {
                self.range <<= 1;

                if self.bottom & (1 << 31) != 0 {
                    self.carry();
                }
                self.bottom <<= 1;

                self.bit_count -= 1;
                if self.bit_count == 0 {
                    self.out.push((self.bottom >> 24) as u8);
                    self.bottom &= 0x00FF_FFFF;
                    self.bit_count = 8;
                }
            }
        }

        fn put_literal(&mut self, n: u8, value: u32) {
            for i in (0..n).rev() {
                self.put(128, (value >> i) & 1 != 0);
            }
        }

        fn finish(mut self) -> Vec<u8> {
            // Zero bools at one half shift one bit each without ever
            // carrying, so 40 of them push the whole low register out.
            for _ in 0..40 {
                self.put(128, false);
            }
            self.out
        }
    }

    /// Writes the entropy-coded frame header bits: defaults everywhere,
    /// no segmentation, no probability updates.
    fn put_frame_header(
        e: &mut BoolEncoder,
        filter_level: u8,
        partitions_log2: u8,
        skip_prob: Option<u8>,
    ) {
        e.put(128, false); // color space
        e.put(128, false); // clamping hint
        e.put(128, false); // segmentation disabled
        e.put(128, false); // normal loop filter
        e.put_literal(6, u32::from(filter_level));
        e.put_literal(3, 0); // sharpness
        e.put(128, false); // no filter adjustments
        e.put_literal(2, u32::from(partitions_log2));
        e.put_literal(7, 0); // yac quantizer index
        for _ in 0..5 {
            e.put(128, false); // quantizer deltas absent
        }
        e.put(128, false); // refresh entropy probs

        for i in COEFF_UPDATE_PROBS.iter() {
            for j in i.iter() {
                for k in j.iter() {
                    for &prob in k.iter() {
                        e.put(prob, false);
                    }
                }
            }
        }

        match skip_prob {
            Some(prob) => {
                e.put(128, true);
                e.put_literal(8, u32::from(prob));
            }
            None => e.put(128, false),
        }
    }

    /// Writes one macroblock header choosing whole-block DC prediction
    /// for both luma and chroma.
    fn put_dc_macroblock(e: &mut BoolEncoder, skip: Option<u8>) {
        if let Some(prob) = skip {
            e.put(prob, true);
        }
        e.put(145, true);
        e.put(156, false);
        e.put(163, false);
        e.put(142, false);
    }

    /// Writes end-of-block for every coefficient block of one
    /// non-skipped macroblock with empty neighbour context.
    fn put_empty_residuals(e: &mut BoolEncoder) {
        e.put(COEFF_PROBS[1][0][0][0], false);
        for _ in 0..16 {
            e.put(COEFF_PROBS[0][1][0][0], false);
        }
        for _ in 0..8 {
            e.put(COEFF_PROBS[2][0][0][0], false);
        }
    }

    fn keyframe_payload(width: u16, height: u16, first: &[u8], rest: &[u8]) -> Vec<u8> {
        let tag = ((first.len() as u32) << 5) | 0x10;

        let mut data = Vec::new();
        data.extend_from_slice(&tag.to_le_bytes()[..3]);
        data.extend_from_slice(&[0x9D, 0x01, 0x2A]);
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(first);
        data.extend_from_slice(rest);
        data
    }

    #[test]
    fn dc_key_frame_decodes_to_flat_gray() {
        let mut first = BoolEncoder::new();
        put_frame_header(&mut first, 32, 0, None);
        put_dc_macroblock(&mut first, None);

        let mut tokens = BoolEncoder::new();
        put_empty_residuals(&mut tokens);

        let payload = keyframe_payload(16, 16, &first.finish(), &tokens.finish());
        let frame = decode(&payload, None).expect("valid frame");

        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 16);
        assert!(frame.y.iter().all(|&p| p == 128));
        assert!(frame.u.iter().all(|&p| p == 128));
        assert!(frame.v.iter().all(|&p| p == 128));
    }

    #[test]
    fn skipped_macroblocks_decode_to_flat_gray() {
        // 32x24 spans a 2x2 macroblock grid with the bottom row cropped.
        // Two token partitions, both empty since every macroblock skips.
        let mut first = BoolEncoder::new();
        put_frame_header(&mut first, 0, 1, Some(200));
        for _ in 0..4 {
            put_dc_macroblock(&mut first, Some(200));
        }

        let mut payload = keyframe_payload(32, 24, &first.finish(), &[]);
        payload.extend_from_slice(&[0, 0, 0]); // first token partition is empty

        let frame = decode(&payload, None).expect("valid frame");

        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 24);
        assert_eq!(frame.y.len(), 32 * 24);
        assert!(frame.y.iter().all(|&p| p == 128));
        assert!(frame.u.iter().all(|&p| p == 128));
        assert!(frame.v.iter().all(|&p| p == 128));
    }

    #[test]
    fn oversized_partition_table_entry_is_rejected() {
        let mut first = BoolEncoder::new();
        put_frame_header(&mut first, 0, 1, Some(200));

        let mut payload = keyframe_payload(16, 16, &first.finish(), &[]);
        payload.extend_from_slice(&[0xFF, 0xFF, 0xFF]);

        let err = decode(&payload, None).expect_err("partition overrun");
        assert!(matches!(err, Vp8Error::CorruptBitstream { .. }));
    }

    #[test]
    fn luma_modes_map_to_subblock_equivalents() {
        assert_eq!(LumaMode::from_i8(B_PRED), Some(LumaMode::B));
        assert_eq!(LumaMode::B.into_intra(), None);
        assert_eq!(LumaMode::DC.into_intra(), Some(IntraMode::DC));
        assert_eq!(LumaMode::V.into_intra(), Some(IntraMode::VE));
        assert_eq!(LumaMode::H.into_intra(), Some(IntraMode::HE));
        assert_eq!(LumaMode::TM.into_intra(), Some(IntraMode::TM));
        assert_eq!(LumaMode::from_i8(42), None);
    }

    #[test]
    fn mode_leaf_values_round_trip_through_the_trees() {
        for &leaf in KEYFRAME_UV_MODE_TREE.iter().filter(|&&v| v <= 0) {
            assert!(ChromaMode::from_i8(-leaf).is_some());
        }
        for &leaf in KEYFRAME_BPRED_MODE_TREE.iter().filter(|&&v| v <= 0) {
            assert!(IntraMode::from_i8(-leaf).is_some());
        }
        for &leaf in KEYFRAME_YMODE_TREE.iter().filter(|&&v| v <= 0) {
            assert!(LumaMode::from_i8(-leaf).is_some());
        }
    }
}
