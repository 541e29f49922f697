use std::fmt;

use bytes::Bytes;

use crate::error::{Result, SnapError};

mod frame;
pub use frame::*;

/// JPEG quality factor in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: Quality = Quality(85);

    /// Strict constructor: anything outside `1..=100` is an error.
    pub fn new(value: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(SnapError::InvalidInput(format!(
                "Invalid quality value: {} (must be 1-100)",
                value
            )))
        }
    }

    /// Lenient constructor: out-of-range values fall back to [`Quality::DEFAULT`].
    pub fn or_default(value: i64) -> Self {
        Self::new(value).unwrap_or(Self::DEFAULT)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded JPEG bytes as returned by the encoder, treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

impl JpegImage {
    /// JPEG start-of-image marker.
    pub const SOI: [u8; 2] = [0xFF, 0xD8];

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_soi_marker(&self) -> bool {
        self.data.starts_with(&Self::SOI)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl AsRef<[u8]> for JpegImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bounds() {
        assert_eq!(Quality::new(1).unwrap().get(), 1);
        assert_eq!(Quality::new(100).unwrap().get(), 100);
        assert!(Quality::new(0).is_err());
        assert!(Quality::new(101).is_err());
        assert!(Quality::new(-5).is_err());
    }

    #[test]
    fn test_quality_or_default() {
        assert_eq!(Quality::or_default(150), Quality::DEFAULT);
        assert_eq!(Quality::or_default(0).get(), 85);
        assert_eq!(Quality::or_default(42).get(), 42);
    }

    #[test]
    fn test_jpeg_marker() {
        let image = JpegImage {
            data: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            width: 2,
            height: 2,
            quality: Quality::DEFAULT,
        };
        assert!(image.has_soi_marker());
        assert_eq!(image.len(), 4);
    }
}
