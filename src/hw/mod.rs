//! # Hardware codec interface
//!
//! The codec block is reached through a small capability interface. A
//! [`Driver`] creates [`Component`]s (a video decoder or an image encoder); each
//! component has one input and one output [port](PortId) and goes through the
//! same four phases: create, configure, run, destroy (drop).
//!
//! Buffers are the only currency exchanged with a component. The application
//! draws a [`PortBuffer`] from a [`BufferPool`], submits it with
//! [`Component::send_buffer`], and the driver hands it back later through the
//! [`PortCallback`] installed on that port, from a thread the driver owns.
//!
//! Two drivers exist: the emulated codec block in [`sim`] (feature `emulator`)
//! and [`UnavailableDriver`], which reports the codec path as absent.
//! [`default_driver`] picks one at build time.

use std::fmt;
use std::sync::Arc;

pub mod buffer;
#[cfg(feature = "emulator")]
pub mod sim;
pub mod stub;

pub use buffer::{flags, BufferPool, PortBuffer};
pub use stub::UnavailableDriver;

/// Non-success status returned by a driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverStatus {
    NoMemory,
    NoSpace,
    InvalidArgument,
    NotImplemented,
    NotFound,
    Io,
    Corrupt,
    NotReady,
    Config,
    AlreadyConnected,
    NotConnected,
    Again,
    Fault,
}

impl DriverStatus {
    /// The driver's own status text.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::NoMemory => "ENOMEM",
            DriverStatus::NoSpace => "ENOSPC",
            DriverStatus::InvalidArgument => "EINVAL",
            DriverStatus::NotImplemented => "ENOSYS",
            DriverStatus::NotFound => "ENOENT",
            DriverStatus::Io => "EIO",
            DriverStatus::Corrupt => "ECORRUPT",
            DriverStatus::NotReady => "ENOTREADY",
            DriverStatus::Config => "ECONFIG",
            DriverStatus::AlreadyConnected => "EISCONN",
            DriverStatus::NotConnected => "ENOTCONN",
            DriverStatus::Again => "EAGAIN",
            DriverStatus::Fault => "EFAULT",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for DriverStatus {}

pub type DriverResult<T> = std::result::Result<T, DriverStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    VideoDecoder,
    ImageEncoder,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::VideoDecoder => "video_decode",
            ComponentKind::ImageEncoder => "image_encode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortId {
    Input,
    Output,
}

impl PortId {
    pub fn name(&self) -> &'static str {
        match self {
            PortId::Input => "input",
            PortId::Output => "output",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            PortId::Input => 0,
            PortId::Output => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Length-prefixed H.264 access units.
    H264,
    /// Planar YUV 4:2:0.
    I420,
    Jpeg,
}

/// Elementary stream format of one port.
///
/// A width or height of zero asks the component to take the size from the
/// stream; the negotiated value is readable through [`Component::port_format`]
/// after commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFormat {
    pub encoding: Encoding,
    pub width: u32,
    pub height: u32,
}

impl PortFormat {
    pub fn new(encoding: Encoding, width: u32, height: u32) -> Self {
        Self {
            encoding,
            width,
            height,
        }
    }

    /// Bytes in one uncompressed 4:2:0 frame of this size.
    pub fn i420_frame_size(&self) -> usize {
        let y = self.width as usize * self.height as usize;
        y + 2 * (y / 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    JpegQuality(u8),
}

/// Completion hook installed on a port; runs on a driver-owned thread.
pub type PortCallback = Arc<dyn Fn(PortBuffer) + Send + Sync>;

/// Entry point to a codec block.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the codec path is compiled in and present.
    fn is_available(&self) -> bool;

    fn create_component(&self, kind: ComponentKind) -> DriverResult<Box<dyn Component>>;
}

/// A hardware component with one input and one output port.
///
/// Dropping the component destroys it.
pub trait Component: Send {
    fn kind(&self) -> ComponentKind;

    /// Stages a format on a port; takes effect on [`Component::commit_format`].
    fn set_format(&mut self, port: PortId, format: PortFormat);

    fn commit_format(&mut self, port: PortId) -> DriverResult<()>;

    /// The committed (negotiated) format of a port.
    fn port_format(&self, port: PortId) -> PortFormat;

    /// Recommended buffer size for a port under its committed format.
    fn buffer_size(&self, port: PortId) -> usize;

    fn set_parameter(&mut self, parameter: Parameter) -> DriverResult<()>;

    fn enable_port(&mut self, port: PortId, callback: PortCallback) -> DriverResult<()>;

    /// Disables a port. No callback for that port runs after this returns.
    fn disable_port(&mut self, port: PortId) -> DriverResult<()>;

    fn is_port_enabled(&self, port: PortId) -> bool;

    fn enable(&mut self) -> DriverResult<()>;

    fn disable(&mut self) -> DriverResult<()>;

    /// Hands a buffer to a port. On failure the buffer is released to its pool.
    fn send_buffer(&mut self, port: PortId, buffer: PortBuffer) -> DriverResult<()>;
}

/// The driver selected for this build.
pub fn default_driver() -> Arc<dyn Driver> {
    #[cfg(feature = "emulator")]
    {
        Arc::new(sim::SimDriver::new())
    }
    #[cfg(not(feature = "emulator"))]
    {
        Arc::new(UnavailableDriver)
    }
}

/// Whether hardware H.264 decoding is present in this build.
pub fn h264_decoder_available() -> bool {
    cfg!(feature = "emulator")
}

/// Whether hardware JPEG encoding is present in this build.
pub fn jpeg_encoder_available() -> bool {
    cfg!(feature = "emulator")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(DriverStatus::NoMemory.to_string(), "ENOMEM");
        assert_eq!(DriverStatus::InvalidArgument.to_string(), "EINVAL");
    }

    #[test]
    fn test_i420_frame_size() {
        assert_eq!(PortFormat::new(Encoding::I420, 640, 480).i420_frame_size(), 460_800);
        assert_eq!(PortFormat::new(Encoding::I420, 0, 0).i420_frame_size(), 0);
    }

    #[test]
    fn test_availability_matches_default_driver() {
        let driver = default_driver();
        assert_eq!(driver.is_available(), h264_decoder_available());
        assert_eq!(driver.is_available(), jpeg_encoder_available());
    }
}
