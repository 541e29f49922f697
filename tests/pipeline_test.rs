#![cfg(feature = "emulator")]

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use h264jpeg::av::Yuv420Frame;
    use h264jpeg::codec::h264::write_length_prefixed;
    use h264jpeg::error::SnapError;
    use h264jpeg::hw::sim::{FaultPoint, SimDriver};
    use h264jpeg::hw::UnavailableDriver;
    use h264jpeg::pipeline::{
        decoder_error, encoder_error, DecodePipeline, EncodePipeline, GateState, PipelineConfig,
    };

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);
    const TEST_SHORT_TIMEOUT: Duration = Duration::from_millis(50);

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn config(timeout: Duration) -> PipelineConfig {
        PipelineConfig {
            timeout,
            input_buffer_size: 16 * 1024,
        }
    }

    /// SPS (20 bytes), PPS (8 bytes), IDR slice (32 bytes), each behind a
    /// 4 byte length: 72 bytes in total.
    fn mock_access_unit() -> Vec<u8> {
        let mut au = BytesMut::new();
        let mut sps = vec![0x67, 0x42, 0x00, 0x1e];
        sps.resize(20, 0xab);
        write_length_prefixed(&mut au, &sps).unwrap();
        let mut pps = vec![0x68, 0xce, 0x38, 0x80];
        pps.resize(8, 0x00);
        write_length_prefixed(&mut au, &pps).unwrap();
        let mut idr = vec![0x65, 0x88, 0x84];
        idr.resize(32, 0x80);
        write_length_prefixed(&mut au, &idr).unwrap();
        au.to_vec()
    }

    fn ramp_frame(width: u32, height: u32) -> Yuv420Frame {
        let mut frame = Yuv420Frame::new(width, height).unwrap();
        let (y, u, v) = frame.planes_mut();
        for (i, b) in y.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        u.fill(96);
        v.fill(160);
        frame
    }

    #[test]
    fn test_mock_access_unit_layout() {
        let au = mock_access_unit();
        assert_eq!(au.len(), 72);
        assert_eq!(&au[..4], &[0, 0, 0, 20]);
        assert_eq!(au[4] & 0x1f, 7);
    }

    #[test]
    fn test_every_supported_quality_encodes() {
        init_logging();
        let driver = SimDriver::new();
        let frame = ramp_frame(16, 16);
        for quality in 1..=100 {
            let mut encoder = EncodePipeline::new();
            encoder.init(&driver, quality, config(TEST_TIMEOUT)).unwrap();
            let image = encoder.encode(&frame).unwrap();
            assert!(image.has_soi_marker(), "quality {}", quality);
            encoder.cleanup();
        }
    }

    #[test]
    fn test_quality_zero_and_101_never_reach_driver() {
        let driver = SimDriver::new();
        let stats = driver.stats();
        for quality in [0, 101] {
            let mut encoder = EncodePipeline::new();
            assert!(encoder.init(&driver, quality, config(TEST_TIMEOUT)).is_err());
            assert!(!encoder_error(Some(&encoder)).is_empty());
        }
        assert_eq!(stats.components_created(), 0);
        assert_eq!(stats.buffers_submitted(), 0);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut decoder = DecodePipeline::default();
        decoder.cleanup();
        decoder.cleanup();
        assert!(!decoder.is_ready());
        assert!(decoder.last_error().is_empty());

        let driver = SimDriver::new();
        let stats = driver.stats();
        decoder.init(&driver, config(TEST_TIMEOUT)).unwrap();
        decoder.process(&mock_access_unit()).unwrap();
        decoder.cleanup();
        assert!(decoder.frame().is_none());
        decoder.cleanup();
        assert_eq!(stats.live_components(), 0);

        let mut encoder = EncodePipeline::default();
        encoder.cleanup();
        encoder.cleanup();
        assert!(!encoder.is_ready());
    }

    #[test]
    fn test_partial_init_unwinds_through_cleanup() {
        for fault in [
            FaultPoint::Create,
            FaultPoint::CommitInput,
            FaultPoint::CommitOutput,
            FaultPoint::EnableOutput,
            FaultPoint::EnableInput,
            FaultPoint::EnableComponent,
        ] {
            let driver = SimDriver::new().fail_at(fault);
            let stats = driver.stats();

            let mut decoder = DecodePipeline::new();
            let err = decoder.init(&driver, config(TEST_TIMEOUT)).unwrap_err();
            assert!(matches!(err, SnapError::Driver { .. }), "{:?}", fault);
            assert_eq!(decoder.last_error(), err.to_string());
            decoder.cleanup();
            decoder.cleanup();

            let mut encoder = EncodePipeline::new();
            assert!(encoder.init(&driver, 85, config(TEST_TIMEOUT)).is_err());
            encoder.cleanup();
            encoder.cleanup();

            assert_eq!(stats.live_components(), 0, "{:?}", fault);
        }
    }

    #[test]
    fn test_send_failure_reports_driver_status() {
        let driver = SimDriver::new().fail_at(FaultPoint::Send);
        let mut decoder = DecodePipeline::new();
        decoder.init(&driver, config(TEST_TIMEOUT)).unwrap();
        let err = decoder.process(&mock_access_unit()).unwrap_err();
        assert!(err.to_string().contains("EAGAIN"), "{}", err);
        decoder.cleanup();
    }

    #[test]
    fn test_rejected_input_leaves_handle_usable() {
        let driver = SimDriver::new().fail_at(FaultPoint::SendInput);
        let stats = driver.stats();
        let mut decoder = DecodePipeline::new();
        decoder.init(&driver, config(TEST_TIMEOUT)).unwrap();

        let err = decoder.process(&mock_access_unit()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to send buffer: EAGAIN");
        assert_eq!(decoder.gate_state(), GateState::Failed);
        assert!(decoder.frame().is_none());
        assert_eq!(stats.buffers_submitted(), 0);

        decoder.init(&SimDriver::new().stream_size(32, 32), config(TEST_TIMEOUT)).unwrap();
        let frame = decoder.process(&mock_access_unit()).unwrap();
        assert_eq!(frame.width(), 32);
        assert_eq!(decoder.gate_state(), GateState::Completed);
        assert_eq!(stats.live_components(), 0);
    }

    #[test]
    fn test_unavailable_hardware_never_acquires_buffers() {
        let mut decoder = DecodePipeline::new();
        assert!(decoder.init(&UnavailableDriver, config(TEST_TIMEOUT)).is_err());
        assert!(decoder_error(Some(&decoder)).contains("not available"));
        let err = decoder.process(&mock_access_unit()).unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("not available"), "{}", err);

        let mut encoder = EncodePipeline::new();
        assert!(encoder.init(&UnavailableDriver, 85, config(TEST_TIMEOUT)).is_err());
        assert!(encoder_error(Some(&encoder)).contains("not available"));
        let err = encoder.encode(&ramp_frame(16, 16)).unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("not available"), "{}", err);
    }

    #[test]
    fn test_stalled_hardware_times_out_and_stays_cleanable() {
        init_logging();
        let driver = SimDriver::new().stall();
        let stats = driver.stats();
        let mut decoder = DecodePipeline::new();
        decoder.init(&driver, config(TEST_SHORT_TIMEOUT)).unwrap();

        let started = std::time::Instant::now();
        let err = decoder.process(&mock_access_unit()).unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= TEST_SHORT_TIMEOUT);
        assert_eq!(decoder.last_error(), "Timeout waiting for decoded frame");

        // The stalled component still owns the only input buffer
        let err = decoder.process(&mock_access_unit()).unwrap_err();
        assert!(matches!(err, SnapError::ResourceExhausted(_)));
        assert_eq!(decoder.last_error(), "No input buffer available");

        decoder.cleanup();
        decoder.cleanup();
        assert_eq!(stats.live_components(), 0);
    }

    #[test]
    fn test_reinit_after_timeout() {
        let driver = SimDriver::new()
            .stream_size(32, 32)
            .latency(Duration::from_millis(150));
        let mut decoder = DecodePipeline::new();
        decoder.init(&driver, config(Duration::from_millis(20))).unwrap();
        assert!(decoder.process(&mock_access_unit()).unwrap_err().is_timeout());

        // Let the late completion land, then bring the handle up again
        std::thread::sleep(Duration::from_millis(300));
        decoder.init(&driver, config(TEST_TIMEOUT)).unwrap();
        let frame = decoder.process(&mock_access_unit()).unwrap();
        assert_eq!(frame.width(), 32);
    }

    #[test]
    fn test_decode_then_encode_by_hand() {
        init_logging();
        let driver = SimDriver::new().stream_size(64, 48);

        let mut decoder = DecodePipeline::new();
        decoder.init(&driver, config(TEST_TIMEOUT)).unwrap();
        decoder.process(&mock_access_unit()).unwrap();
        let frame = decoder.take_frame().unwrap();
        decoder.cleanup();

        assert_eq!(frame.y().len(), 64 * 48);
        assert_eq!(frame.u().len(), 64 * 48 / 4);
        assert_eq!(frame.v().len(), 64 * 48 / 4);

        let mut encoder = EncodePipeline::new();
        encoder.init(&driver, 85, config(TEST_TIMEOUT)).unwrap();
        let image = encoder.encode(&frame).unwrap();
        assert_eq!(&image.data[..2], &[0xFF, 0xD8]);
        assert_eq!((image.width, image.height), (64, 48));
        encoder.cleanup();
    }

    #[test]
    fn test_gate_state_is_exported() {
        assert_ne!(GateState::Idle, GateState::Completed);
    }
}
