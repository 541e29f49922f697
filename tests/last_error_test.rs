#![cfg(feature = "emulator")]

// The facade's last error is process-wide, so everything touching it lives in
// this one test binary and runs as a single test.

use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use h264jpeg::codec::h264::write_length_prefixed;
use h264jpeg::hw::sim::SimDriver;
use h264jpeg::{last_error, Transcoder};

fn mock_access_unit() -> Vec<u8> {
    let mut au = BytesMut::new();
    write_length_prefixed(&mut au, &[0x67, 0x42, 0x00, 0x1e]).unwrap();
    write_length_prefixed(&mut au, &[0x68, 0xce, 0x38, 0x80]).unwrap();
    write_length_prefixed(&mut au, &[0x65, 0x88, 0x84, 0x00, 0x21]).unwrap();
    au.to_vec()
}

#[test]
fn test_last_error_lifecycle() {
    assert!(last_error().is_empty());

    let transcoder = Transcoder::new(Arc::new(SimDriver::new().stream_size(32, 32)))
        .with_timeout(Duration::from_secs(5));

    assert!(transcoder.convert(&mock_access_unit(), 150).is_err());
    assert_eq!(last_error(), "Invalid quality value: 150 (must be 1-100)");

    assert!(transcoder.convert(&[], 85).is_err());
    assert_eq!(last_error(), "Invalid parameters");

    transcoder.convert(&mock_access_unit(), 85).unwrap();
    assert!(last_error().is_empty());
}
