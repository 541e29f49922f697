#![doc(html_root_url = "https://docs.rs/h264jpeg/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # h264jpeg - H.264 access unit to JPEG on a hardware codec block
//!
//! `h264jpeg` turns a single compressed H.264 access unit into a JPEG still by
//! driving two asynchronous hardware components: a video decoder and an image
//! encoder. The components report completion through port callbacks on threads
//! they own; each pipeline turns that into a plain blocking call with a hard
//! timeout.
//!
//! ## Features
//!
//! - Decode pipeline: length-prefixed H.264 in, planar YUV 4:2:0 out
//! - Encode pipeline: planar YUV 4:2:0 in, JPEG out, quality 1-100
//! - Single-buffer port pools, one request in flight per handle
//! - Per-handle error text plus a process-wide last error for the facade
//! - An emulated codec block (feature `emulator`, on by default) for hosts
//!   without the hardware
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! h264jpeg = "0.1.0"
//! ```
//!
//! ### Converting an access unit
//!
//! ```rust,no_run
//! use h264jpeg::{h264_to_jpeg, last_error};
//!
//! let access_unit = std::fs::read("keyframe.au").unwrap();
//! match h264_to_jpeg(&access_unit, 85) {
//!     Ok(jpeg) => std::fs::write("keyframe.jpg", &jpeg).unwrap(),
//!     Err(_) => eprintln!("conversion failed: {}", last_error()),
//! }
//! ```
//!
//! ### Driving the pipelines directly
//!
//! ```rust,no_run
//! use h264jpeg::hw::default_driver;
//! use h264jpeg::pipeline::{DecodePipeline, EncodePipeline, PipelineConfig};
//!
//! # fn main() -> h264jpeg::Result<()> {
//! let driver = default_driver();
//! let access_unit = std::fs::read("keyframe.au")?;
//!
//! let mut decoder = DecodePipeline::new();
//! decoder.init(driver.as_ref(), PipelineConfig::default())?;
//! decoder.process(&access_unit)?;
//! let frame = decoder.take_frame().expect("frame after successful decode");
//! decoder.cleanup();
//!
//! let mut encoder = EncodePipeline::new();
//! encoder.init(driver.as_ref(), 90, PipelineConfig::default())?;
//! let jpeg = encoder.encode(&frame)?;
//! encoder.cleanup();
//! # let _ = jpeg;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: frame and image types
//!   - `Yuv420Frame`, one allocation with three plane views
//!   - `Quality`, `JpegImage`
//!
//! - `codec`: H.264 access unit framing (length prefixes, NAL unit types)
//!
//! - `hw`: capability interface to the codec block
//!   - `Driver` / `Component` traits, port formats, driver status codes
//!   - buffer pools, the emulated driver, the unavailable driver
//!
//! - `pipeline`: decode and encode pipelines and their shared parts
//!
//! - `transcode`: the one-call facade
//!
//! - `error` / `config`: error types and process-wide settings
//!
/// Frame and image types
pub mod av;

/// H.264 access unit framing
pub mod codec;

/// Error types and utilities
pub mod error;

/// Hardware codec interface and drivers
pub mod hw;

/// Decode and encode pipelines
pub mod pipeline;

/// Decode-then-encode facade
pub mod transcode;

/// Configuration module
pub mod config;

pub use error::{Result, SnapError};
pub use transcode::{h264_to_jpeg, last_error, Transcoder};
