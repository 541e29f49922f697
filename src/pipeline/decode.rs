use std::time::Duration;

use super::convert::decoded_to_planar;
use super::gate::GateState;
use super::session::{CodecSession, SessionSetup};
use super::PipelineConfig;
use crate::av::Yuv420Frame;
use crate::error::{ErrorMessage, Result, SnapError};
use crate::hw::{self, ComponentKind, Driver, Encoding, PortFormat, PortId};

/// H.264 access unit to planar YUV 4:2:0 through the hardware video decoder.
///
/// A handle starts zeroed (`Default`), is brought up with [`init`](Self::init)
/// and torn down with [`cleanup`](Self::cleanup). Each failing call leaves its
/// message in [`last_error`](Self::last_error).
#[derive(Debug, Default)]
pub struct DecodePipeline {
    session: CodecSession,
    timeout: Duration,
    frame: Option<Yuv420Frame>,
    frame_ready: bool,
    hardware_missing: bool,
    error: ErrorMessage,
}

impl DecodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the build carries a hardware decoder.
    pub fn available() -> bool {
        hw::h264_decoder_available()
    }

    /// Creates the decoder component, negotiates H.264 in and I420 out,
    /// installs the completion hooks and enables ports then component.
    ///
    /// On failure the handle may be partially built; [`cleanup`](Self::cleanup)
    /// unwinds it.
    pub fn init(&mut self, driver: &dyn Driver, config: PipelineConfig) -> Result<()> {
        // A handle may carry a previous or half-built session
        self.cleanup();
        let result = self.init_inner(driver, config);
        self.record(result)
    }

    fn init_inner(&mut self, driver: &dyn Driver, config: PipelineConfig) -> Result<()> {
        if !driver.is_available() {
            self.hardware_missing = true;
            return Err(unavailable());
        }
        self.timeout = config.timeout;
        self.error.clear();

        let setup = SessionSetup {
            kind: ComponentKind::VideoDecoder,
            label: "decoder",
            input: PortFormat::new(Encoding::H264, 0, 0),
            output: PortFormat::new(Encoding::I420, 0, 0),
            parameters: Vec::new(),
            min_input_buffer_size: config.input_buffer_size,
        };
        self.session.open(driver, setup)?;
        log::info!(
            "Hardware decoder initialized on {} driver",
            driver.name()
        );
        Ok(())
    }

    /// Decodes one complete access unit (4-byte big-endian length-prefixed NAL
    /// units) and returns the resulting frame.
    pub fn process(&mut self, access_unit: &[u8]) -> Result<&Yuv420Frame> {
        let result = self.process_inner(access_unit);
        self.record(result)?;
        self.frame
            .as_ref()
            .ok_or_else(|| SnapError::Conversion("No frame decoded".into()))
    }

    fn process_inner(&mut self, access_unit: &[u8]) -> Result<()> {
        // The previous picture goes before the next one is allocated
        self.frame = None;
        self.frame_ready = false;
        if access_unit.is_empty() {
            return Err(SnapError::InvalidInput("Invalid parameters".into()));
        }
        if self.hardware_missing {
            return Err(unavailable());
        }
        if !self.session.is_ready() {
            return Err(SnapError::InvalidInput("Hardware decoder not ready".into()));
        }
        let capacity = self.session.input_capacity();
        if access_unit.len() > capacity {
            return Err(SnapError::InvalidInput(format!(
                "Access unit of {} bytes exceeds input buffer capacity {}",
                access_unit.len(),
                capacity
            )));
        }

        let output = self
            .session
            .submit_and_wait(|buffer| buffer.fill(access_unit), self.timeout, "decoded")?;

        let format = self
            .session
            .port_format(PortId::Output)
            .ok_or_else(|| SnapError::InvalidInput("Hardware decoder not ready".into()))?;
        let frame = decoded_to_planar(output.payload(), format.width, format.height)
            .ok_or_else(|| {
                SnapError::Conversion("Failed to convert decoded frame to YUV420".into())
            })?;
        drop(output);

        log::debug!("Decoded {}x{} frame", frame.width(), frame.height());
        self.frame = Some(frame);
        self.frame_ready = true;
        Ok(())
    }

    /// The last decoded frame, only while the last `process` succeeded.
    pub fn frame(&self) -> Option<&Yuv420Frame> {
        if self.frame_ready {
            self.frame.as_ref()
        } else {
            None
        }
    }

    /// Moves the last decoded frame out of the handle.
    pub fn take_frame(&mut self) -> Option<Yuv420Frame> {
        if !self.frame_ready {
            return None;
        }
        self.frame_ready = false;
        self.frame.take()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Where the last submission stands.
    pub fn gate_state(&self) -> GateState {
        self.session.gate_state()
    }

    pub fn last_error(&self) -> &str {
        self.error.as_str()
    }

    /// Disables ports and component, drops pools, component and any retained
    /// frame, then zeroes the handle. Safe on a zeroed or half-built handle.
    pub fn cleanup(&mut self) {
        self.session.close();
        self.frame = None;
        self.frame_ready = false;
        self.hardware_missing = false;
        self.timeout = Duration::ZERO;
        self.error.clear();
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::warn!("Decoder: {}", e);
            self.error.set(e);
        }
        result
    }
}

fn unavailable() -> SnapError {
    SnapError::Unavailable("Hardware decoder not available on this system".into())
}

/// Error text of a decoder handle, or a fixed message for no handle.
pub fn decoder_error(pipeline: Option<&DecodePipeline>) -> &str {
    match pipeline {
        Some(pipeline) => pipeline.last_error(),
        None => "Invalid decoder context",
    }
}
