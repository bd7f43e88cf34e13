//! ASD movie decoding tests.

use bytes::Bytes;

use probescan::format::asd::{self, decode_asd, decode_asd_bytes, AsdReader};
use probescan::{DecodeError, ImageData};

use super::test_utils::*;

#[test]
fn test_decode_topography_movie() {
    let (_dir, path) = write_temp("movie.asd", &create_asd());

    let decoded = decode_asd(&path, "TP").unwrap();
    assert_eq!(decoded.calibration.nm_per_pixel(), 100.0);

    let ImageData::Movie(frames) = &decoded.data else {
        panic!("expected a movie");
    };
    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, i);
        assert_eq!(frame.image.shape(), (2, 2));
    }

    // Bipolar 2.5 V, 12 bits, gain 1.0 x extension 2.0
    assert_eq!(frames[0].image.as_slice(), &[5.0, 2.5, 0.0, -2.5]);
    assert_eq!(frames[1].image.as_slice(), &[0.0; 4]);
    assert_eq!(frames[2].image.as_slice(), &[-5.0, 5.0, 5.0, -5.0]);
}

#[test]
fn test_phase_channel_is_second_block() {
    let decoded = decode_asd_bytes(create_asd(), "PH").unwrap();
    let frames = decoded.data.as_movie().unwrap();

    // Scaling factor is the negated phase sensitivity
    assert_eq!(frames[0].image.as_slice(), &[-10.0; 4]);
    assert_eq!(frames[1].image.as_slice(), &[-5.0; 4]);
    assert_eq!(frames[2].image.as_slice(), &[0.0; 4]);
}

#[test]
fn test_metadata_carries_header_and_converter() {
    let decoded = decode_asd_bytes(create_asd(), "TP").unwrap();

    assert_eq!(decoded.metadata["channel"], "TP");
    assert_eq!(decoded.metadata["num_frames"], 3);
    assert_eq!(decoded.metadata["user_name"], "lab1");
    assert_eq!(decoded.metadata["converter"]["resolution"], 4096.0);
}

#[test]
fn test_lazy_frames_match_eager_decode() {
    let reader = AsdReader::from_bytes(create_asd(), "TP").unwrap();
    let lazy: Vec<_> = reader.frames().collect::<Result<_, _>>().unwrap();

    let eager = decode_asd_bytes(create_asd(), "TP").unwrap();
    assert_eq!(Some(lazy.as_slice()), eager.data.as_movie());
}

#[test]
fn test_lazy_iteration_stops_early() {
    let reader = AsdReader::from_bytes(create_asd(), "PH").unwrap();
    let records = reader.records();
    assert_eq!(records.len(), 3);

    let first = reader.records().next().unwrap().unwrap();
    assert_eq!(first.header.number, 0);
    assert_eq!(first.frame.index, 0);

    let two: Vec<_> = reader.frames().take(2).collect();
    assert_eq!(two.len(), 2);
}

#[test]
fn test_version_zero_movie() {
    let spec = AsdSpec {
        version: 0,
        ..standard_movie()
    };
    let data = Bytes::from(asd_file(&spec));

    let topography = decode_asd_bytes(data.clone(), "TP").unwrap();
    assert_eq!(topography.calibration.nm_per_pixel(), 100.0);
    let frames = topography.data.as_movie().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].image.as_slice(), &[5.0, 2.5, 0.0, -2.5]);
    assert_eq!(frames[2].image.as_slice(), &[-5.0, 5.0, 5.0, -5.0]);

    assert_eq!(topography.metadata["version"], 0);
    assert_eq!(topography.metadata["user_name"], "lab1");
    assert_eq!(topography.metadata["comment"], "old");
    assert_eq!(topography.metadata["comment_offset_size"], 4);

    let phase = decode_asd_bytes(data, "PH").unwrap();
    let frames = phase.data.as_movie().unwrap();
    assert_eq!(frames[0].image.as_slice(), &[-10.0; 4]);
    assert_eq!(frames[1].image.as_slice(), &[-5.0; 4]);
    assert_eq!(frames[2].image.as_slice(), &[0.0; 4]);
}

#[test]
fn test_bit_depth_does_not_change_conversion() {
    let spec = AsdSpec {
        bits: 16,
        ..standard_movie()
    };
    let decoded = decode_asd_bytes(Bytes::from(asd_file(&spec)), "TP").unwrap();

    assert_eq!(decoded.metadata["analogue_digital_data_bits_size"], 16);
    assert_eq!(decoded.metadata["converter"]["resolution"], 4096.0);
    let frames = decoded.data.as_movie().unwrap();
    assert_eq!(frames[0].image.as_slice(), &[5.0, 2.5, 0.0, -2.5]);
    assert_eq!(frames[1].image.as_slice(), &[0.0; 4]);
}

#[test]
fn test_list_channels() {
    assert_eq!(asd::list_channels(create_asd()).unwrap(), vec!["TP", "PH"]);
}

#[test]
fn test_unknown_channel_lists_available() {
    match decode_asd_bytes(create_asd(), "ER") {
        Err(DecodeError::ChannelNotFound {
            requested,
            available,
        }) => {
            assert_eq!(requested, "ER");
            assert_eq!(available, vec!["TP", "PH"]);
        }
        other => panic!("expected ChannelNotFound, got {other:?}"),
    }
}

#[test]
fn test_truncation_is_reported() {
    let data = create_asd();

    // Header, first block, and the last byte of the second block
    for len in [2, 40, 200, data.len() - 20, data.len() - 1] {
        for channel in ["TP", "PH"] {
            let result = decode_asd_bytes(data.slice(..len), channel);
            assert!(
                matches!(result, Err(DecodeError::TruncatedData { .. })),
                "length {len}, channel {channel}: {result:?}"
            );
        }
    }
}

#[test]
fn test_unsupported_version() {
    let mut data = create_asd().to_vec();
    data[..4].copy_from_slice(&7i32.to_le_bytes());

    let result = decode_asd_bytes(Bytes::from(data), "TP");
    assert!(matches!(result, Err(DecodeError::UnsupportedFormat { .. })));
}

#[test]
fn test_decoding_is_deterministic() {
    let first = decode_asd_bytes(create_asd(), "PH").unwrap();
    let second = decode_asd_bytes(create_asd(), "PH").unwrap();
    assert_eq!(first, second);
}
