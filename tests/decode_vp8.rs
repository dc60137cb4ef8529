//! End-to-end tests against the public decoder API.
//!
//! Payloads are authored directly: the 10-byte uncompressed key frame
//! header is plain bytes, and a zeroed first partition decodes every
//! entropy-coded header field to its default (the range decoder treats
//! data past the end of a partition as zero bits).

use core::sync::atomic::AtomicBool;

use vp8_decoder::{Vp8Decoder, Vp8Error};

/// Builds a key frame payload from raw partition bytes.
fn keyframe_payload(width: u16, height: u16, first_partition: &[u8]) -> Vec<u8> {
    // Tag: key frame, version 0, show_frame set.
    let tag = ((first_partition.len() as u32) << 5) | 0x10;

    let mut data = Vec::new();
    data.extend_from_slice(&tag.to_le_bytes()[..3]);
    data.extend_from_slice(&[0x9D, 0x01, 0x2A]);
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(first_partition);
    data
}

#[test]
fn zero_entropy_stream_decodes() {
    // All-false header bits select subblock prediction with DC modes and
    // no residuals; chroma has no neighbours at the first macroblock and
    // predicts flat 128.
    let payload = keyframe_payload(16, 16, &[0, 0]);

    let decoder = Vp8Decoder::new();
    let frame = decoder.decode(&payload).expect("valid frame");

    assert_eq!(frame.width, 16);
    assert_eq!(frame.height, 16);
    assert_eq!(frame.y.len(), 256);
    assert_eq!(frame.u.len(), 64);
    assert_eq!(frame.get_y(0, 0), 128);
    assert!(frame.u.iter().all(|&p| p == 128));
    assert!(frame.v.iter().all(|&p| p == 128));
}

#[test]
fn multi_macroblock_frame_has_flat_chroma() {
    // 64x48 spans a 4x3 macroblock grid. Chroma DC prediction chains the
    // flat first macroblock across the whole frame.
    let payload = keyframe_payload(64, 48, &[0, 0]);

    let frame = Vp8Decoder::new().decode(&payload).expect("valid frame");

    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 48);
    assert_eq!(frame.y.len(), 64 * 48);
    assert_eq!(frame.u.len(), 32 * 24);
    assert!(frame.u.iter().all(|&p| p == 128));
    assert!(frame.v.iter().all(|&p| p == 128));
}

#[test]
fn get_info_reads_the_uncompressed_header_only() {
    let mut payload = keyframe_payload(0, 0, &[]);
    // Width 320 with upscale code 1, height 240 with upscale code 3.
    payload[6..8].copy_from_slice(&(320u16 | 1 << 14).to_le_bytes());
    payload[8..10].copy_from_slice(&(240u16 | 3 << 14).to_le_bytes());

    let info = Vp8Decoder::new().get_info(&payload).expect("valid header");

    assert_eq!(info.width, 320);
    assert_eq!(info.height, 240);
    assert_eq!(info.xscale, 1);
    assert_eq!(info.yscale, 3);
    assert_eq!(info.version, 0);
    assert!(info.show_frame);
}

#[test]
fn inter_frames_are_rejected() {
    let mut payload = keyframe_payload(16, 16, &[0, 0]);
    payload[0] |= 1;

    let decoder = Vp8Decoder::new();
    assert!(matches!(
        decoder.decode(&payload),
        Err(Vp8Error::UnsupportedFrameType(_))
    ));
    assert!(matches!(
        decoder.get_info(&payload),
        Err(Vp8Error::UnsupportedFrameType(_))
    ));
}

#[test]
fn reserved_versions_are_rejected() {
    let mut payload = keyframe_payload(16, 16, &[0, 0]);
    // Version field 4 is reserved.
    payload[0] |= 4 << 1;

    assert!(matches!(
        Vp8Decoder::new().decode(&payload),
        Err(Vp8Error::UnsupportedFeature(_))
    ));
}

#[test]
fn bad_start_code_is_rejected() {
    let mut payload = keyframe_payload(16, 16, &[0, 0]);
    payload[4] = 0x00;

    assert!(matches!(
        Vp8Decoder::new().decode(&payload),
        Err(Vp8Error::CorruptBitstream { offset: 3, .. })
    ));
}

#[test]
fn truncated_payloads_are_rejected() {
    let decoder = Vp8Decoder::new();

    // Shorter than the fixed header.
    let payload = keyframe_payload(16, 16, &[0, 0]);
    assert!(matches!(
        decoder.decode(&payload[..7]),
        Err(Vp8Error::CorruptBitstream { .. })
    ));

    // Declared first partition size larger than the remaining input.
    let mut payload = keyframe_payload(16, 16, &[0, 0]);
    let tag = (1000u32 << 5) | 0x10;
    payload[..3].copy_from_slice(&tag.to_le_bytes()[..3]);
    assert!(matches!(
        decoder.decode(&payload),
        Err(Vp8Error::CorruptBitstream { .. })
    ));
}

#[test]
fn zero_dimensions_are_rejected() {
    let payload = keyframe_payload(0, 16, &[0, 0]);

    assert!(matches!(
        Vp8Decoder::new().decode(&payload),
        Err(Vp8Error::CorruptBitstream { .. })
    ));
}

#[test]
fn raised_stop_flag_cancels_the_decode() {
    let payload = keyframe_payload(16, 16, &[0, 0]);
    let stop = AtomicBool::new(true);

    assert!(matches!(
        Vp8Decoder::new().decode_with_stop(&payload, &stop),
        Err(Vp8Error::Cancelled)
    ));

    let stop = AtomicBool::new(false);
    assert!(Vp8Decoder::new().decode_with_stop(&payload, &stop).is_ok());
}
