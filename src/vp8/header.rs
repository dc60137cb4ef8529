//! Frame header parsing: frame tag, segmentation, loop filter parameters,
//! token partitions and quantizer resolution (RFC 6386 9.1-9.11).

use alloc::vec::Vec;

use byteorder_lite::{ByteOrder, LittleEndian};

use crate::error::{Result, Vp8Error};
use crate::vp8::bool_decoder::BoolDecoder;
use crate::vp8::tables::{Prob, AC_QUANT, COEFF_UPDATE_PROBS, DC_QUANT, MAX_SEGMENTS};

/// Length of the uncompressed part of a key frame header: 3-byte frame
/// tag, 3-byte start code, two 16-bit dimension fields.
pub const KEYFRAME_HEADER_LEN: usize = 10;

const START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

/// The uncompressed 3-byte frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTag {
    pub keyframe: bool,
    pub version: u8,
    pub show_frame: bool,
    pub first_partition_size: u32,
}

/// Key frame dimensions with their upscaling codes.
#[derive(Debug, Clone, Copy)]
pub struct KeyFrameDimensions {
    pub width: u16,
    pub height: u16,
    pub xscale: u8,
    pub yscale: u8,
}

/// Segment-level state shared by quantization and loop filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct Segment {
    /// 7-bit quantizer value, absolute or delta per `delta_values`.
    pub quantizer_level: i32,
    /// 6-bit loop filter value, absolute or delta per `delta_values`.
    pub loopfilter_level: i32,

    pub ydc: i16,
    pub yac: i16,
    pub y2dc: i16,
    pub y2ac: i16,
    pub uvdc: i16,
    pub uvac: i16,
}

#[derive(Debug, Clone, Copy)]
pub struct Segmentation {
    pub enabled: bool,
    pub update_map: bool,
    /// True when segment features are deltas on the frame values rather
    /// than absolute replacements.
    pub delta_values: bool,
    pub tree_probs: [Prob; 3],
}

impl Default for Segmentation {
    fn default() -> Segmentation {
        Segmentation {
            enabled: false,
            update_map: false,
            delta_values: false,
            tree_probs: [255; 3],
        }
    }
}

/// Loop filter controls from the frame header.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopFilterHeader {
    /// Simple (luma-only) filter when set, normal filter otherwise.
    pub use_simple: bool,
    pub level: u8,
    pub sharpness: u8,
    pub adjustments_enabled: bool,
    /// Per reference frame filter level deltas; index 0 is intra.
    pub ref_deltas: [i32; 4],
    /// Prediction mode deltas; index 0 applies to B_PRED macroblocks.
    pub mode_deltas: [i32; 4],
}

/// Parses the 3-byte little-endian frame tag.
pub fn parse_frame_tag(data: &[u8]) -> Result<FrameTag> {
    if data.len() < 3 {
        return Err(Vp8Error::corrupt("truncated frame tag", data.len()));
    }

    let tag = LittleEndian::read_u24(data);

    let tag = FrameTag {
        keyframe: tag & 1 == 0,
        version: ((tag >> 1) & 7) as u8,
        show_frame: (tag >> 4) & 1 != 0,
        first_partition_size: tag >> 5,
    };

    if tag.version > 3 {
        return Err(Vp8Error::UnsupportedFeature("reserved bitstream version"));
    }

    Ok(tag)
}

/// Parses the key frame start code and dimension fields following the tag.
pub fn parse_keyframe_dimensions(data: &[u8]) -> Result<KeyFrameDimensions> {
    if data.len() < KEYFRAME_HEADER_LEN {
        return Err(Vp8Error::corrupt("truncated key frame header", data.len()));
    }

    if data[3..6] != START_CODE {
        return Err(Vp8Error::corrupt("bad key frame start code", 3));
    }

    let w = LittleEndian::read_u16(&data[6..8]);
    let h = LittleEndian::read_u16(&data[8..10]);

    let dims = KeyFrameDimensions {
        width: w & 0x3FFF,
        height: h & 0x3FFF,
        xscale: (w >> 14) as u8,
        yscale: (h >> 14) as u8,
    };

    if dims.width == 0 || dims.height == 0 {
        return Err(Vp8Error::corrupt("zero frame dimension", 6));
    }

    Ok(dims)
}

/// Reads the segmentation block (RFC 6386 9.3), updating the segment
/// feature values in place.
pub fn read_segment_updates(
    b: &mut BoolDecoder<'_>,
    segmentation: &mut Segmentation,
    segments: &mut [Segment; MAX_SEGMENTS],
) {
    segmentation.update_map = b.read_flag();
    let update_segment_feature_data = b.read_flag();

    if update_segment_feature_data {
        segmentation.delta_values = !b.read_flag();

        for segment in segments.iter_mut() {
            segment.quantizer_level = if b.read_flag() {
                b.read_magnitude_and_sign(7)
            } else {
                0
            };
        }

        for segment in segments.iter_mut() {
            segment.loopfilter_level = if b.read_flag() {
                b.read_magnitude_and_sign(6)
            } else {
                0
            };
        }
    }

    if segmentation.update_map {
        for prob in segmentation.tree_probs.iter_mut() {
            *prob = if b.read_flag() { b.read_literal(8) } else { 255 };
        }
    }
}

/// Reads the loop filter delta adjustments (RFC 6386 9.4).
pub fn read_loop_filter_adjustments(b: &mut BoolDecoder<'_>, lf: &mut LoopFilterHeader) {
    let mode_ref_lf_delta_update = b.read_flag();

    if mode_ref_lf_delta_update {
        for delta in lf.ref_deltas.iter_mut() {
            if b.read_flag() {
                *delta = b.read_magnitude_and_sign(6);
            }
        }

        for delta in lf.mode_deltas.iter_mut() {
            if b.read_flag() {
                *delta = b.read_magnitude_and_sign(6);
            }
        }
    }
}

fn clamp_index(value: i32) -> usize {
    value.clamp(0, 127) as usize
}

/// Reads the quantizer indices (RFC 6386 9.6) and resolves the six
/// quantizer values for every segment.
pub fn read_quantization_indices(
    b: &mut BoolDecoder<'_>,
    segmentation: &Segmentation,
    segments: &mut [Segment; MAX_SEGMENTS],
) {
    let yac_abs = i32::from(b.read_literal(7));

    let ydc_delta = if b.read_flag() {
        b.read_magnitude_and_sign(4)
    } else {
        0
    };
    let y2dc_delta = if b.read_flag() {
        b.read_magnitude_and_sign(4)
    } else {
        0
    };
    let y2ac_delta = if b.read_flag() {
        b.read_magnitude_and_sign(4)
    } else {
        0
    };
    let uvdc_delta = if b.read_flag() {
        b.read_magnitude_and_sign(4)
    } else {
        0
    };
    let uvac_delta = if b.read_flag() {
        b.read_magnitude_and_sign(4)
    } else {
        0
    };

    let n = if segmentation.enabled {
        MAX_SEGMENTS
    } else {
        1
    };
    for segment in segments.iter_mut().take(n) {
        let base = if !segmentation.enabled {
            yac_abs
        } else if segmentation.delta_values {
            segment.quantizer_level + yac_abs
        } else {
            segment.quantizer_level
        };

        segment.ydc = DC_QUANT[clamp_index(base + ydc_delta)];
        segment.yac = AC_QUANT[clamp_index(base)];

        segment.y2dc = DC_QUANT[clamp_index(base + y2dc_delta)] * 2;
        // Y2 AC is scaled by 155/100 with a floor of 8.
        segment.y2ac = ((i32::from(AC_QUANT[clamp_index(base + y2ac_delta)]) * 155 / 100).max(8))
            as i16;

        segment.uvdc = DC_QUANT[clamp_index(base + uvdc_delta)].min(132);
        segment.uvac = AC_QUANT[clamp_index(base + uvac_delta)];
    }
}

/// Applies the flag-gated coefficient probability updates
/// (RFC 6386 13.4).
pub fn update_token_probabilities(
    b: &mut BoolDecoder<'_>,
    probs: &mut crate::vp8::tables::TokenProbTables,
) {
    for (i, is) in COEFF_UPDATE_PROBS.iter().enumerate() {
        for (j, js) in is.iter().enumerate() {
            for (k, ks) in js.iter().enumerate() {
                for (t, prob) in ks.iter().enumerate() {
                    if b.read_bool(*prob) {
                        probs[i][j][k][t] = b.read_literal(8);
                    }
                }
            }
        }
    }
}

/// Slices the residual partitions out of the payload following the first
/// partition. `offset` is the absolute payload position of the partition
/// size table; every declared size is validated against the remaining
/// input.
pub fn split_partitions(data: &[u8], offset: usize, count: usize) -> Result<Vec<&[u8]>> {
    let mut partitions = Vec::with_capacity(count);

    let table_len = 3 * (count - 1);
    if data.len() < offset || data.len() - offset < table_len {
        return Err(Vp8Error::corrupt("truncated partition size table", offset));
    }

    let mut cursor = offset + table_len;
    for i in 0..count - 1 {
        let entry = offset + 3 * i;
        let size = LittleEndian::read_u24(&data[entry..entry + 3]) as usize;

        if data.len() - cursor < size {
            return Err(Vp8Error::corrupt(
                "partition size exceeds remaining input",
                entry,
            ));
        }

        partitions.push(&data[cursor..cursor + size]);
        cursor += size;
    }

    // Last partition takes whatever is left.
    partitions.push(&data[cursor..]);

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe_header(width: u16, height: u16) -> [u8; 10] {
        let mut h = [0u8; 10];
        // Key frame, version 0, shown, zero first partition size.
        h[0] = 0x10;
        h[3..6].copy_from_slice(&START_CODE);
        h[6..8].copy_from_slice(&width.to_le_bytes());
        h[8..10].copy_from_slice(&height.to_le_bytes());
        h
    }

    #[test]
    fn frame_tag_fields() {
        let data = keyframe_header(16, 16);
        let tag = parse_frame_tag(&data).expect("valid tag");
        assert!(tag.keyframe);
        assert_eq!(tag.version, 0);
        assert!(tag.show_frame);
        assert_eq!(tag.first_partition_size, 0);
    }

    #[test]
    fn inter_frame_bit_is_detected() {
        let mut data = keyframe_header(16, 16);
        data[0] |= 1;
        let tag = parse_frame_tag(&data).expect("valid tag");
        assert!(!tag.keyframe);
    }

    #[test]
    fn reserved_version_is_rejected() {
        let mut data = keyframe_header(16, 16);
        data[0] |= 4 << 1;
        assert_eq!(
            parse_frame_tag(&data),
            Err(Vp8Error::UnsupportedFeature("reserved bitstream version"))
        );
    }

    #[test]
    fn bad_start_code_is_rejected() {
        let mut data = keyframe_header(16, 16);
        data[4] = 0x99;
        assert!(matches!(
            parse_keyframe_dimensions(&data),
            Err(Vp8Error::CorruptBitstream { offset: 3, .. })
        ));
    }

    #[test]
    fn dimensions_mask_scaling_bits() {
        let mut data = keyframe_header(0, 0);
        data[6..8].copy_from_slice(&(640u16 | 1 << 14).to_le_bytes());
        data[8..10].copy_from_slice(&(480u16 | 3 << 14).to_le_bytes());
        let dims = parse_keyframe_dimensions(&data).expect("valid dimensions");
        assert_eq!((dims.width, dims.height), (640, 480));
        assert_eq!((dims.xscale, dims.yscale), (1, 3));
    }

    #[test]
    fn quantizer_index_clamps_at_both_ends() {
        assert_eq!(clamp_index(-30), 0);
        assert_eq!(clamp_index(400), 127);
        assert_eq!(clamp_index(64), 64);
    }

    #[test]
    fn partition_overrun_is_rejected() {
        // Table declares 0xFFFF bytes for the first of two partitions.
        let mut data = alloc::vec![0u8; 16];
        data[0] = 0xFF;
        data[1] = 0xFF;
        let err = split_partitions(&data, 0, 2).unwrap_err();
        assert!(matches!(err, Vp8Error::CorruptBitstream { .. }));
    }

    #[test]
    fn partitions_are_sliced_in_order() {
        // Two declared sizes (2 and 3 bytes) and a 1-byte tail.
        let data = [2, 0, 0, 3, 0, 0, 10, 11, 20, 21, 22, 30];
        let parts = split_partitions(&data, 0, 3).expect("valid table");
        assert_eq!(parts, alloc::vec![&[10, 11][..], &[20, 21, 22][..], &[30][..]]);
    }
}
