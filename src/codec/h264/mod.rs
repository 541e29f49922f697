//! # H.264 access unit framing
//!
//! Access units handed to the decoder are a sequence of NAL units, each behind
//! a four byte big-endian length. This module only deals with that framing and
//! the 5-bit type field of each unit's header; the bitstream itself is decoded
//! by the hardware.
//!
//! ```rust
//! use bytes::BytesMut;
//! use h264jpeg::codec::h264::{split_access_unit, write_length_prefixed, NALUnitType};
//!
//! let mut au = BytesMut::new();
//! write_length_prefixed(&mut au, &[0x67, 0x42, 0x00, 0x1e]).unwrap();
//! write_length_prefixed(&mut au, &[0x65, 0x88, 0x84]).unwrap();
//!
//! let units = split_access_unit(&au).unwrap();
//! assert_eq!(units[0].unit_type(), NALUnitType::SPS);
//! assert!(units[1].is_slice());
//! ```

/// Length-prefixed NAL unit splitting and writing
pub mod parser;
/// NAL unit types
pub mod types;

#[doc(inline)]
pub use parser::*;
#[doc(inline)]
pub use types::*;
