use std::ops::Range;

use crate::error::{Result, SnapError};

/// A planar YUV 4:2:0 picture.
///
/// All three planes live in one allocation: the Y plane first, then U, then V.
/// The chroma planes are computed views into that allocation, so dropping the
/// frame releases every plane at once.
#[derive(Clone, PartialEq, Eq)]
pub struct Yuv420Frame {
    data: Box<[u8]>,
    width: u32,
    height: u32,
    y_size: usize,
    uv_size: usize,
}

impl Yuv420Frame {
    /// Allocates a zeroed frame.
    ///
    /// Fails when either dimension is zero or the allocation cannot be obtained.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (y_size, uv_size) = plane_sizes(width, height)?;
        let total = y_size + 2 * uv_size;

        let mut data = Vec::new();
        data.try_reserve_exact(total).map_err(|_| {
            SnapError::ResourceExhausted("Failed to allocate memory for YUV frame".into())
        })?;
        data.resize(total, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            width,
            height,
            y_size,
            uv_size,
        })
    }

    /// Builds a frame by copying three separate planes.
    pub fn from_planes(width: u32, height: u32, y: &[u8], u: &[u8], v: &[u8]) -> Result<Self> {
        let mut frame = Self::new(width, height)?;
        if y.len() != frame.y_size || u.len() != frame.uv_size || v.len() != frame.uv_size {
            return Err(SnapError::InvalidInput(format!(
                "Plane sizes {}/{}/{} do not match {}x{} (expected {}/{}/{})",
                y.len(),
                u.len(),
                v.len(),
                width,
                height,
                frame.y_size,
                frame.uv_size,
                frame.uv_size
            )));
        }
        let (dy, du, dv) = frame.planes_mut();
        dy.copy_from_slice(y);
        du.copy_from_slice(u);
        dv.copy_from_slice(v);
        Ok(frame)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte count of the Y plane (`width * height`).
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Byte count of each chroma plane (`y_size / 4`).
    pub fn uv_size(&self) -> usize {
        self.uv_size
    }

    /// Total bytes across all three planes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn y_range(&self) -> Range<usize> {
        0..self.y_size
    }

    fn u_range(&self) -> Range<usize> {
        self.y_size..self.y_size + self.uv_size
    }

    fn v_range(&self) -> Range<usize> {
        self.y_size + self.uv_size..self.y_size + 2 * self.uv_size
    }

    pub fn y(&self) -> &[u8] {
        &self.data[self.y_range()]
    }

    pub fn u(&self) -> &[u8] {
        &self.data[self.u_range()]
    }

    pub fn v(&self) -> &[u8] {
        &self.data[self.v_range()]
    }

    /// The whole allocation in I420 order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable views of the Y, U and V planes.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let (y, chroma) = self.data.split_at_mut(self.y_size);
        let (u, v) = chroma.split_at_mut(self.uv_size);
        (y, u, v)
    }
}

impl std::fmt::Debug for Yuv420Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Yuv420Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("y_size", &self.y_size)
            .field("uv_size", &self.uv_size)
            .finish()
    }
}

/// Returns the (Y, per-chroma) plane byte counts for a 4:2:0 picture.
pub fn plane_sizes(width: u32, height: u32) -> Result<(usize, usize)> {
    if width == 0 || height == 0 {
        return Err(SnapError::InvalidInput(format!(
            "Invalid frame dimensions {}x{}",
            width, height
        )));
    }
    let y_size = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| SnapError::InvalidInput("Frame dimensions overflow".into()))?;
    Ok((y_size, y_size / 4))
}
