mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use frame_sentinel::error::CodecError;
use frame_sentinel::frame::{self, ChannelOrder};

#[test]
fn encode_then_decode_keeps_dimensions_and_pixels() {
    let png = common::solid_png(32, 24, [200, 40, 90]);
    let bitmap = frame::normalize(frame::decode(&png).expect("decode PNG"));

    let encoded = frame::encode(&bitmap).expect("encode JPEG");
    let jpeg = BASE64.decode(&encoded.base64).expect("valid base64");
    assert_eq!(jpeg, encoded.jpeg);

    let round_trip = frame::decode(&jpeg).expect("decode JPEG");
    assert_eq!(round_trip.width(), 32);
    assert_eq!(round_trip.height(), 24);
    assert_eq!(round_trip.order(), ChannelOrder::Rgb);

    let original = frame::to_rgb_image(&bitmap);
    let decoded = frame::to_rgb_image(&round_trip);
    for (a, b) in original.pixels().zip(decoded.pixels()) {
        for channel in 0..3 {
            let diff = (a[channel] as i16 - b[channel] as i16).abs();
            assert!(diff <= 8, "channel drifted by {}", diff);
        }
    }
}

#[test]
fn prepare_produces_jpeg() {
    let png = common::sample_png(16, 16);
    let encoded = frame::prepare(&png).expect("prepare frame");
    assert_eq!(&encoded.jpeg[..2], &[0xFF, 0xD8]);
    assert!(!encoded.base64.is_empty());
}

#[test]
fn encoding_is_deterministic() {
    let png = common::sample_png(20, 10);
    let first = frame::prepare(&png).unwrap();
    let second = frame::prepare(&png).unwrap();
    assert_eq!(first.base64, second.base64);
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let result = frame::decode(b"definitely not an image");
    assert!(matches!(result, Err(CodecError::Decode { .. })));

    assert!(matches!(frame::decode(&[]), Err(CodecError::Decode { .. })));
}

#[test]
fn data_url_round_trips_to_container_bytes() {
    let png = common::sample_png(4, 4);
    let bytes = frame::decode_base64(&common::data_url(&png)).expect("decode data URL");
    assert_eq!(bytes, png);

    let raw = BASE64.encode(&png);
    assert_eq!(frame::decode_base64(&raw).unwrap(), png);

    assert!(frame::decode_base64("data:image/png;base64,@@not-base64@@").is_err());
}
