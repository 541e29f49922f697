use crate::av::{plane_sizes, Yuv420Frame};
use crate::error::{Result, SnapError};

/// Copies a decoder output payload (Y, then U, then V) into a new frame.
///
/// Returns `None` for an empty payload, one shorter than a full frame of the
/// given size, or when the frame cannot be allocated.
pub fn decoded_to_planar(payload: &[u8], width: u32, height: u32) -> Option<Yuv420Frame> {
    if payload.is_empty() {
        return None;
    }
    let (y_size, uv_size) = plane_sizes(width, height).ok()?;
    if payload.len() < y_size + 2 * uv_size {
        log::debug!(
            "Decoded payload of {} bytes is short of {}x{} ({} bytes)",
            payload.len(),
            width,
            height,
            y_size + 2 * uv_size
        );
        return None;
    }

    let mut frame = Yuv420Frame::new(width, height).ok()?;
    let (y, u, v) = frame.planes_mut();
    let (src_y, rest) = payload.split_at(y_size);
    let (src_u, rest) = rest.split_at(uv_size);
    y.copy_from_slice(src_y);
    u.copy_from_slice(src_u);
    v.copy_from_slice(&rest[..uv_size]);
    Some(frame)
}

/// Writes a frame in the encoder's input layout: the Y plane verbatim, then
/// chroma interleaved byte by byte (U, V, U, V, ...).
///
/// Returns the number of bytes written.
pub fn planar_to_encoded(frame: &Yuv420Frame, dst: &mut [u8]) -> Result<usize> {
    let y_size = frame.y_size();
    let uv_size = frame.uv_size();
    let total = y_size + 2 * uv_size;
    if frame.is_empty() {
        return Err(SnapError::InvalidInput("Invalid YUV frame data".into()));
    }
    if dst.len() < total {
        return Err(SnapError::Conversion(format!(
            "Failed to convert YUV420 to hardware format: need {} bytes, buffer holds {}",
            total,
            dst.len()
        )));
    }

    let (dst_y, dst_uv) = dst.split_at_mut(y_size);
    dst_y.copy_from_slice(frame.y());
    for ((pair, u), v) in dst_uv[..2 * uv_size]
        .chunks_exact_mut(2)
        .zip(frame.u())
        .zip(frame.v())
    {
        pair[0] = *u;
        pair[1] = *v;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_decoded_to_planar_splits_planes() {
        let mut payload = vec![1u8; 16];
        payload.extend_from_slice(&[2; 4]);
        payload.extend_from_slice(&[3; 4]);
        let frame = decoded_to_planar(&payload, 4, 4).unwrap();
        assert_eq!(frame.y(), &[1; 16]);
        assert_eq!(frame.u(), &[2; 4]);
        assert_eq!(frame.v(), &[3; 4]);
    }

    #[test]
    fn test_decoded_to_planar_rejects_bad_payload() {
        assert!(decoded_to_planar(&[], 4, 4).is_none());
        assert!(decoded_to_planar(&[0; 23], 4, 4).is_none());
        assert!(decoded_to_planar(&[0; 24], 0, 4).is_none());
    }

    #[test]
    fn test_planar_to_encoded_interleaves_chroma() {
        let frame = Yuv420Frame::from_planes(4, 2, &[9; 8], &[1, 2], &[3, 4]).unwrap();
        let mut dst = vec![0u8; 12];
        let written = planar_to_encoded(&frame, &mut dst).unwrap();
        assert_eq!(written, 12);
        assert_eq!(dst, vec![9, 9, 9, 9, 9, 9, 9, 9, 1, 3, 2, 4]);
    }

    #[test]
    fn test_planar_to_encoded_needs_room() {
        let frame = Yuv420Frame::new(4, 4).unwrap();
        let mut dst = vec![0u8; 23];
        assert!(planar_to_encoded(&frame, &mut dst).is_err());
    }

    #[quickcheck]
    fn prop_interleave_keeps_every_chroma_byte(seed: Vec<u8>, w: u8, h: u8) -> bool {
        let width = (u32::from(w % 32) + 1) * 2;
        let height = (u32::from(h % 32) + 1) * 2;
        let mut frame = Yuv420Frame::new(width, height).unwrap();
        {
            let (y, u, v) = frame.planes_mut();
            for (i, b) in y.iter_mut().chain(u.iter_mut()).chain(v.iter_mut()).enumerate() {
                *b = seed.get(i % seed.len().max(1)).copied().unwrap_or(i as u8);
            }
        }
        let mut dst = vec![0u8; frame.len()];
        if planar_to_encoded(&frame, &mut dst).is_err() {
            return false;
        }
        let uv = &dst[frame.y_size()..];
        &dst[..frame.y_size()] == frame.y()
            && uv.iter().step_by(2).eq(frame.u().iter())
            && uv.iter().skip(1).step_by(2).eq(frame.v().iter())
    }

    #[quickcheck]
    fn prop_decoded_plane_sizes(w: u8, h: u8) -> bool {
        let width = (u32::from(w) + 1) * 2;
        let height = (u32::from(h) + 1) * 2;
        let pixels = (width * height) as usize;
        let payload = vec![0x55u8; pixels * 3 / 2];
        match decoded_to_planar(&payload, width, height) {
            Some(frame) => {
                frame.y_size() == pixels
                    && frame.uv_size() == pixels / 4
                    && frame.u().len() == pixels / 4
                    && frame.v().len() == pixels / 4
            }
            None => false,
        }
    }
}
