use bytes::{BufMut, Bytes, BytesMut};

use super::types::{NALUnit, NALUnitType};
use crate::error::{Result, SnapError};

/// Size of the big-endian length prefix in front of every NAL unit.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Splits a length-prefixed access unit into its NAL units.
///
/// Fails on a truncated prefix, a length running past the end of the buffer,
/// or a zero-length unit.
pub fn split_access_unit(data: &[u8]) -> Result<Vec<NALUnit>> {
    let data = Bytes::copy_from_slice(data);
    let mut units = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if data.len() - offset < LENGTH_PREFIX_SIZE {
            return Err(SnapError::InvalidInput(format!(
                "Truncated NAL length prefix at offset {}",
                offset
            )));
        }
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&data[offset..offset + LENGTH_PREFIX_SIZE]);
        let len = u32::from_be_bytes(prefix) as usize;
        offset += LENGTH_PREFIX_SIZE;

        if len == 0 || len > data.len() - offset {
            return Err(SnapError::InvalidInput(format!(
                "NAL unit length {} at offset {} exceeds remaining {} bytes",
                len,
                offset - LENGTH_PREFIX_SIZE,
                data.len() - offset
            )));
        }

        let payload = data.slice(offset..offset + len);
        if let Some(nal) = NALUnit::new(payload) {
            units.push(nal);
        }
        offset += len;
    }

    Ok(units)
}

/// Appends `payload` to `out` behind a four byte big-endian length.
pub fn write_length_prefixed(out: &mut BytesMut, payload: &[u8]) -> Result<()> {
    let prefix = length_prefix(payload.len())?;
    out.reserve(LENGTH_PREFIX_SIZE + payload.len());
    out.put_u32(prefix);
    out.put_slice(payload);
    Ok(())
}

fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        SnapError::InvalidInput(format!(
            "NAL unit of {} bytes does not fit a 32-bit length prefix",
            len
        ))
    })
}

/// Per-type counts for a parsed access unit, used for diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccessUnitSummary {
    pub units: usize,
    pub sps: usize,
    pub pps: usize,
    pub idr: usize,
    pub non_idr: usize,
    pub other: usize,
}

impl AccessUnitSummary {
    pub fn of(units: &[NALUnit]) -> Self {
        let mut summary = AccessUnitSummary {
            units: units.len(),
            ..Default::default()
        };
        for nal in units {
            match nal.unit_type() {
                NALUnitType::SPS => summary.sps += 1,
                NALUnitType::PPS => summary.pps += 1,
                NALUnitType::CodedSliceIDR => summary.idr += 1,
                NALUnitType::CodedSliceNonIDR => summary.non_idr += 1,
                _ => summary.other += 1,
            }
        }
        summary
    }

    /// True when the unit carries at least one coded picture slice.
    pub fn has_picture(&self) -> bool {
        self.idr + self.non_idr > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_access_unit() -> BytesMut {
        let mut au = BytesMut::new();
        let mut sps = vec![0x67];
        sps.extend_from_slice(&[0x80; 19]);
        write_length_prefixed(&mut au, &sps).unwrap();
        let mut pps = vec![0x68];
        pps.extend_from_slice(&[0x80; 7]);
        write_length_prefixed(&mut au, &pps).unwrap();
        let mut idr = vec![0x65];
        idr.extend_from_slice(&[0x80; 31]);
        write_length_prefixed(&mut au, &idr).unwrap();
        au
    }

    #[test]
    fn test_split_access_unit() {
        let au = sample_access_unit();
        assert_eq!(au.len(), 72);

        let units = split_access_unit(&au).unwrap();
        let types: Vec<_> = units.iter().map(|n| n.unit_type()).collect();
        assert_eq!(
            types,
            vec![NALUnitType::SPS, NALUnitType::PPS, NALUnitType::CodedSliceIDR]
        );
        assert_eq!(units[0].data.len(), 20);
        assert_eq!(units[1].data.len(), 8);
        assert_eq!(units[2].nal_ref_idc, 3);
        assert!(units[2].is_slice());
    }

    #[test]
    fn test_summary() {
        let units = split_access_unit(&sample_access_unit()).unwrap();
        let summary = AccessUnitSummary::of(&units);
        assert_eq!(
            summary,
            AccessUnitSummary {
                units: 3,
                sps: 1,
                pps: 1,
                idr: 1,
                non_idr: 0,
                other: 0,
            }
        );
        assert!(summary.has_picture());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let au = sample_access_unit();
        assert!(split_access_unit(&au[..au.len() - 1]).is_err());
        assert!(split_access_unit(&[0x00, 0x00]).is_err());
        assert!(split_access_unit(&[0, 0, 0, 0, 0x65]).is_err());
    }

    #[test]
    fn test_length_prefix_range() {
        assert_eq!(length_prefix(72).unwrap(), 72);
        assert_eq!(length_prefix(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_oversized_unit_rejected() {
        let err = length_prefix(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, SnapError::InvalidInput(_)));
        assert!(err.to_string().contains("32-bit length prefix"));
    }

    #[test]
    fn test_empty_input_has_no_units() {
        assert!(split_access_unit(&[]).unwrap().is_empty());
    }
}
