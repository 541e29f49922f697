use std::time::Duration;

use bytes::Bytes;

use super::convert::planar_to_encoded;
use super::session::{CodecSession, SessionSetup};
use super::PipelineConfig;
use crate::av::{JpegImage, Quality, Yuv420Frame};
use crate::error::{ErrorMessage, Result, SnapError};
use crate::hw::{self, flags, ComponentKind, Driver, Encoding, Parameter, PortFormat, PortId};

/// Input size the encoder is brought up with before the first frame arrives.
pub const INITIAL_WIDTH: u32 = 640;
pub const INITIAL_HEIGHT: u32 = 480;

/// Planar YUV 4:2:0 to JPEG through the hardware image encoder.
#[derive(Debug, Default)]
pub struct EncodePipeline {
    session: CodecSession,
    timeout: Duration,
    quality: Quality,
    hardware_missing: bool,
    error: ErrorMessage,
}

impl EncodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the build carries a hardware JPEG encoder.
    pub fn available() -> bool {
        hw::jpeg_encoder_available()
    }

    /// Brings up the encoder at `quality`, which must lie in `1..=100`.
    ///
    /// An out-of-range quality is rejected before the driver is touched.
    pub fn init(&mut self, driver: &dyn Driver, quality: i32, config: PipelineConfig) -> Result<()> {
        // A handle may carry a previous or half-built session
        self.cleanup();
        let result = self.init_inner(driver, quality, config);
        self.record(result)
    }

    fn init_inner(&mut self, driver: &dyn Driver, quality: i32, config: PipelineConfig) -> Result<()> {
        let quality = Quality::new(i64::from(quality))?;
        if !driver.is_available() {
            self.hardware_missing = true;
            return Err(unavailable());
        }
        self.timeout = config.timeout;
        self.quality = quality;
        self.error.clear();

        let setup = SessionSetup {
            kind: ComponentKind::ImageEncoder,
            label: "encoder",
            input: PortFormat::new(Encoding::I420, INITIAL_WIDTH, INITIAL_HEIGHT),
            output: PortFormat::new(Encoding::Jpeg, INITIAL_WIDTH, INITIAL_HEIGHT),
            parameters: vec![Parameter::JpegQuality(quality.get())],
            min_input_buffer_size: 0,
        };
        self.session.open(driver, setup)?;
        log::info!(
            "Hardware JPEG encoder initialized on {} driver (quality {})",
            driver.name(),
            quality
        );
        Ok(())
    }

    /// Encodes one frame. The input port follows the frame's size.
    pub fn encode(&mut self, frame: &Yuv420Frame) -> Result<JpegImage> {
        let result = self.encode_inner(frame);
        self.record(result)
    }

    fn encode_inner(&mut self, frame: &Yuv420Frame) -> Result<JpegImage> {
        if frame.is_empty() {
            return Err(SnapError::InvalidInput("Invalid YUV frame data".into()));
        }
        if self.hardware_missing {
            return Err(unavailable());
        }
        if !self.session.is_ready() {
            return Err(SnapError::InvalidInput("Hardware encoder not ready".into()));
        }

        let wanted = PortFormat::new(Encoding::I420, frame.width(), frame.height());
        if self.session.port_format(PortId::Input) != Some(wanted) {
            self.session.reconfigure_input(wanted)?;
        }

        let output = self.session.submit_and_wait(
            |buffer| {
                let written = planar_to_encoded(frame, buffer.data_mut())?;
                buffer.set_payload(0, written)
            },
            self.timeout,
            "encoded",
        )?;
        if !output.has_flag(flags::FRAME_END) {
            return Err(SnapError::Conversion(format!(
                "Incomplete JPEG output ({} bytes)",
                output.length()
            )));
        }

        let image = JpegImage {
            data: Bytes::copy_from_slice(output.payload()),
            width: frame.width(),
            height: frame.height(),
            quality: self.quality,
        };
        log::debug!(
            "Encoded {}x{} frame into {} bytes",
            image.width,
            image.height,
            image.len()
        );
        Ok(image)
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn last_error(&self) -> &str {
        self.error.as_str()
    }

    /// Same contract as [`DecodePipeline::cleanup`](super::DecodePipeline::cleanup).
    pub fn cleanup(&mut self) {
        self.session.close();
        self.timeout = Duration::ZERO;
        self.quality = Quality::default();
        self.hardware_missing = false;
        self.error.clear();
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::warn!("Encoder: {}", e);
            self.error.set(e);
        }
        result
    }
}

fn unavailable() -> SnapError {
    SnapError::Unavailable("Hardware MJPEG encoder not available on this system".into())
}

/// Error text of an encoder handle, or a fixed message for no handle.
pub fn encoder_error(pipeline: Option<&EncodePipeline>) -> &str {
    match pipeline {
        Some(pipeline) => pipeline.last_error(),
        None => "Invalid encoder context",
    }
}
