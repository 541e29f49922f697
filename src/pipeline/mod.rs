//! # Codec pipelines
//!
//! [`DecodePipeline`] (H.264 to planar YUV 4:2:0) and [`EncodePipeline`]
//! (planar YUV 4:2:0 to JPEG) are built from the same parts:
//!
//! - [`session`]: component lifecycle and the single-buffer port pools
//! - [`gate`]: the output callback and the bounded wait that makes each call
//!   synchronous
//! - [`convert`]: byte layout between [`Yuv420Frame`](crate::av::Yuv420Frame)
//!   and the hardware buffers
//!
//! Each handle keeps at most one request in flight and records the text of
//! its last failure.

use std::time::Duration;

use crate::config;

pub mod convert;
pub mod decode;
pub mod encode;
pub mod gate;
pub mod session;

pub use decode::{decoder_error, DecodePipeline};
pub use encode::{encoder_error, EncodePipeline};
pub use gate::GateState;

/// Per-handle settings, defaulting from [`config::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on one hardware round trip.
    pub timeout: Duration,
    /// Minimum input buffer size; the component's recommendation wins when larger.
    pub input_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let global = config::get();
        Self {
            timeout: Duration::from_millis(global.timeout_ms),
            input_buffer_size: global.input_buffer_size,
        }
    }
}

impl PipelineConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
