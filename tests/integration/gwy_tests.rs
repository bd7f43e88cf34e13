//! Gwyddion decoding tests.

use bytes::Bytes;

use probescan::format::gwy::{self, decode_gwy, decode_gwy_bytes};
use probescan::DecodeError;

use super::test_utils::*;

#[test]
fn test_decode_height_channel() {
    let data = create_gwy_two_channels();
    let (_dir, path) = write_temp("scan.gwy", &data);

    let decoded = decode_gwy(&path, "Height").unwrap();
    let image = decoded.data.as_single().unwrap();

    assert_eq!(image.shape(), (4, 4));
    assert_eq!(decoded.calibration.nm_per_pixel(), 10.0);
    // Row-major: row 1, column 2 is sample 6
    assert_eq!(image.get(1, 2), Some(6.0));
    assert_eq!(image.min_max(), Some((0.0, 15.0)));
    assert_eq!(decoded.metadata["channel"], "Height");
}

#[test]
fn test_second_channel_and_metadata() {
    let decoded = decode_gwy_bytes(Bytes::from(create_gwy_two_channels()), "Phase").unwrap();
    let image = decoded.data.as_single().unwrap();

    assert_eq!(image.get(3, 3), Some(7.5));
    assert_eq!(decoded.metadata["channel_id"], 1);
}

#[test]
fn test_metre_extent_is_normalised() {
    let data = gwy_file(&[(
        "Height",
        gwy_data_field(2, 2, 40e-9, 40e-9, "m", &[1e-9, 2e-9, 3e-9, 4e-9]),
    )]);

    let decoded = decode_gwy_bytes(Bytes::from(data), "Height").unwrap();
    assert!((decoded.calibration.nm_per_pixel() - 20.0).abs() < 1e-9);

    let image = decoded.data.as_single().unwrap();
    assert!((image.get(1, 1).unwrap() - 4.0).abs() < 1e-9);
}

#[test]
fn test_micrometre_and_nanometre_units() {
    let data = gwy_file(&[
        (
            "Height",
            gwy_data_field(2, 2, 1.0, 1.0, "um", &[0.5, 1.0, 1.5, 2.0]),
        ),
        (
            "Amplitude",
            gwy_data_field(2, 2, 40.0, 40.0, "nm", &[1.0, 2.0, 3.0, 4.0]),
        ),
    ]);
    let data = Bytes::from(data);

    let height = decode_gwy_bytes(data.clone(), "Height").unwrap();
    assert!((height.calibration.nm_per_pixel() - 500.0).abs() < 1e-9);
    let image = height.data.as_single().unwrap();
    assert!((image.get(0, 0).unwrap() - 500.0).abs() < 1e-9);
    assert!((image.get(1, 1).unwrap() - 2000.0).abs() < 1e-9);

    // Already nanometres: nothing is rescaled
    let amplitude = decode_gwy_bytes(data, "Amplitude").unwrap();
    assert_eq!(amplitude.calibration.nm_per_pixel(), 20.0);
    let image = amplitude.data.as_single().unwrap();
    assert_eq!(image.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_list_channels() {
    let channels = gwy::list_channels(Bytes::from(create_gwy_two_channels())).unwrap();
    assert_eq!(channels, vec!["Height".to_string(), "Phase".to_string()]);
}

#[test]
fn test_unknown_channel_lists_available() {
    let result = decode_gwy_bytes(Bytes::from(create_gwy_two_channels()), "Amplitude");

    match result {
        Err(DecodeError::ChannelNotFound {
            requested,
            available,
        }) => {
            assert_eq!(requested, "Amplitude");
            assert_eq!(available, vec!["Height".to_string(), "Phase".to_string()]);
        }
        other => panic!("expected ChannelNotFound, got {other:?}"),
    }
}

#[test]
fn test_truncation_is_reported() {
    let data = create_gwy_two_channels();

    for len in [0, 3, 10, data.len() / 2, data.len() - 1] {
        let result = decode_gwy_bytes(Bytes::copy_from_slice(&data[..len]), "Height");
        assert!(
            matches!(result, Err(DecodeError::TruncatedData { .. })),
            "length {len}: {result:?}"
        );
    }
}

#[test]
fn test_decoding_is_deterministic() {
    let data = Bytes::from(create_gwy_two_channels());
    let first = decode_gwy_bytes(data.clone(), "Height").unwrap();
    let second = decode_gwy_bytes(data, "Height").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_file() {
    let result = decode_gwy("/nonexistent/probescan/scan.gwy", "Height");
    assert!(matches!(result, Err(DecodeError::Io(_))));
}
