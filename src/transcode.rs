//! One-call H.264 access unit to JPEG conversion.
//!
//! ```no_run
//! let access_unit: Vec<u8> = std::fs::read("frame.h264au").unwrap();
//! let jpeg = h264jpeg::h264_to_jpeg(&access_unit, 85).unwrap();
//! std::fs::write("frame.jpg", &jpeg).unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::av::{JpegImage, Quality};
use crate::codec::h264::{split_access_unit, AccessUnitSummary};
use crate::error::{ErrorMessage, Result, SnapError};
use crate::hw::{self, Driver};
use crate::pipeline::{DecodePipeline, EncodePipeline, PipelineConfig};

lazy_static! {
    static ref LAST_ERROR: Mutex<ErrorMessage> = Mutex::new(ErrorMessage::new());
}

/// Text of the most recent failed conversion in this process.
///
/// Emptied when a conversion starts; shared by every thread.
pub fn last_error() -> String {
    LAST_ERROR.lock().as_str().to_owned()
}

/// Converts with the build's default driver and configuration.
pub fn h264_to_jpeg(access_unit: &[u8], quality: i32) -> Result<JpegImage> {
    Transcoder::default().convert(access_unit, quality)
}

/// Decode then encode, one access unit per call.
#[derive(Clone)]
pub struct Transcoder {
    driver: Arc<dyn Driver>,
    config: PipelineConfig,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(hw::default_driver())
    }
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Transcoder {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Converts one length-prefixed H.264 access unit into a JPEG.
    ///
    /// Empty input and a quality outside `1..=100` are rejected before any
    /// hardware call. Failures are also left in [`last_error`].
    pub fn convert(&self, access_unit: &[u8], quality: i32) -> Result<JpegImage> {
        LAST_ERROR.lock().clear();
        let result = self.run(access_unit, quality);
        if let Err(e) = &result {
            log::warn!("H.264 to JPEG conversion failed: {}", e);
            LAST_ERROR.lock().set(e);
        }
        result
    }

    /// Runs [`convert`](Self::convert) on the blocking thread pool.
    pub async fn convert_async(&self, access_unit: Bytes, quality: i32) -> Result<JpegImage> {
        let transcoder = self.clone();
        tokio::task::spawn_blocking(move || transcoder.convert(&access_unit, quality))
            .await
            .map_err(|e| SnapError::Conversion(format!("Conversion task failed: {}", e)))?
    }

    fn run(&self, access_unit: &[u8], quality: i32) -> Result<JpegImage> {
        if access_unit.is_empty() {
            return Err(SnapError::InvalidInput("Invalid parameters".into()));
        }
        let quality = Quality::new(i64::from(quality))?;
        log::debug!(
            "Starting H.264 to JPEG conversion (size: {}, quality: {})",
            access_unit.len(),
            quality
        );

        if !self.driver.is_available() {
            return Err(SnapError::Unavailable(
                "Hardware decoder not available on this system".into(),
            ));
        }
        match split_access_unit(access_unit) {
            Ok(units) => log::debug!("Access unit: {:?}", AccessUnitSummary::of(&units)),
            Err(e) => log::debug!("Access unit does not split into NAL units: {}", e),
        }

        let frame = {
            let mut decoder = DecodePipeline::new();
            decoder
                .init(self.driver.as_ref(), self.config)
                .map_err(|e| SnapError::stage("Hardware decoder initialization failed", e))?;
            decoder
                .process(access_unit)
                .map_err(|e| SnapError::stage("Hardware decoding failed", e))?;
            let frame = decoder.take_frame().ok_or_else(|| {
                SnapError::Conversion("No frame available after H.264 decoding".into())
            })?;
            decoder.cleanup();
            frame
        };
        log::debug!(
            "Hardware decoding successful: {}x{}",
            frame.width(),
            frame.height()
        );

        if !self.driver.is_available() {
            return Err(SnapError::Unavailable(
                "Hardware MJPEG encoder not available on this system".into(),
            ));
        }
        let mut encoder = EncodePipeline::new();
        encoder
            .init(self.driver.as_ref(), i32::from(quality.get()), self.config)
            .map_err(|e| SnapError::stage("Hardware MJPEG encoder initialization failed", e))?;
        let image = encoder
            .encode(&frame)
            .map_err(|e| SnapError::stage("Hardware MJPEG encoding failed", e))?;
        encoder.cleanup();

        log::debug!("Hardware MJPEG encoding successful (size: {} bytes)", image.len());
        Ok(image)
    }
}
