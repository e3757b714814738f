// SPDX-License-Identifier: MPL-2.0

//! Planar 4:2:0 to NV21 repacking
//!
//! Hardware frames arrive as three planes with their own row and pixel
//! strides. NV21 is a tightly packed luma plane followed by interleaved
//! V,U pairs, which is what the frame transforms consume.

use crate::backends::camera::types::{Plane, RawFormat, RawFrame};
use crate::errors::{PipelineError, PipelineResult};

/// Bytes needed to hold a `width` x `height` NV21 frame
#[inline]
pub fn nv21_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// Repack a three-plane 4:2:0 frame into `dst` as NV21.
///
/// Luma rows are copied `width` bytes at a time so row padding never
/// reaches the output. Chroma is sampled per plane at
/// `row * row_stride + col * pixel_stride`, which covers both fully planar
/// (pixel stride 1) and semi-planar (pixel stride 2) sources.
///
/// Bytes of `dst` past `nv21_len(width, height)` are left untouched.
pub fn yuv420_to_nv21(frame: &RawFrame, dst: &mut [u8]) -> PipelineResult<()> {
    if frame.format != RawFormat::Yuv420 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{:?}, expected three-plane YUV 4:2:0",
            frame.format
        )));
    }
    let [y_plane, u_plane, v_plane] = frame.planes.as_slice() else {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} planes, expected 3",
            frame.planes.len()
        )));
    };

    let width = frame.width as usize;
    let height = frame.height as usize;
    let required = nv21_len(frame.width, frame.height);
    if dst.len() < required {
        return Err(PipelineError::BufferTooSmall {
            required,
            actual: dst.len(),
        });
    }

    let chroma_width = width / 2;
    let chroma_height = height / 2;

    check_plane("Y", y_plane, width, height)?;
    check_plane("U", u_plane, chroma_width, chroma_height)?;
    check_plane("V", v_plane, chroma_width, chroma_height)?;

    let (luma_out, chroma_out) = dst[..required].split_at_mut(width * height);

    let y = y_plane.bytes();
    for (row, out) in luma_out.chunks_exact_mut(width.max(1)).enumerate().take(height) {
        let start = row * y_plane.row_stride;
        out.copy_from_slice(&y[start..start + width]);
    }

    let u = u_plane.bytes();
    let v = v_plane.bytes();
    let mut out = chroma_out.iter_mut();
    for row in 0..chroma_height {
        let u_row = row * u_plane.row_stride;
        let v_row = row * v_plane.row_stride;
        for col in 0..chroma_width {
            // NV21 stores V first
            if let Some(b) = out.next() {
                *b = v[v_row + col * v_plane.pixel_stride];
            }
            if let Some(b) = out.next() {
                *b = u[u_row + col * u_plane.pixel_stride];
            }
        }
    }

    Ok(())
}

/// Ensure every sample the converter will read lies inside the plane
fn check_plane(name: &str, plane: &Plane, cols: usize, rows: usize) -> PipelineResult<()> {
    if cols == 0 || rows == 0 {
        return Ok(());
    }
    if plane.pixel_stride == 0 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} plane has zero pixel stride",
            name
        )));
    }
    if plane.row_stride < (cols - 1) * plane.pixel_stride + 1 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} plane row stride {} shorter than {} samples",
            name, plane.row_stride, cols
        )));
    }
    let last = (rows - 1) * plane.row_stride + (cols - 1) * plane.pixel_stride;
    let len = plane.bytes().len();
    if last >= len {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} plane has {} bytes, needs {}",
            name,
            len,
            last + 1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    /// Build a planar frame where each luma row is padded and chroma is
    /// either planar or interleaved U,V.
    fn make_frame(width: u32, height: u32, padding: usize, semi_planar: bool) -> RawFrame {
        let (w, h) = (width as usize, height as usize);
        let y_stride = w + padding;
        let mut y = vec![0xEEu8; y_stride * h];
        for row in 0..h {
            for col in 0..w {
                y[row * y_stride + col] = (row * w + col) as u8;
            }
        }

        let (cw, ch) = (w / 2, h / 2);
        let planes = if semi_planar {
            // U,V,U,V... with padding; V plane starts one byte in
            let stride = cw * 2 + padding;
            let mut uv = vec![0xEEu8; stride * ch];
            for row in 0..ch {
                for col in 0..cw {
                    uv[row * stride + col * 2] = 100 + (row * cw + col) as u8;
                    uv[row * stride + col * 2 + 1] = 200 + (row * cw + col) as u8;
                }
            }
            let uv: Arc<[u8]> = Arc::from(uv);
            vec![
                Plane::new(Arc::from(y), y_stride, 1),
                Plane::with_offset(Arc::clone(&uv), 0, stride, 2),
                Plane::with_offset(uv, 1, stride, 2),
            ]
        } else {
            let stride = cw + padding;
            let mut u = vec![0xEEu8; stride * ch];
            let mut v = vec![0xEEu8; stride * ch];
            for row in 0..ch {
                for col in 0..cw {
                    u[row * stride + col] = 100 + (row * cw + col) as u8;
                    v[row * stride + col] = 200 + (row * cw + col) as u8;
                }
            }
            vec![
                Plane::new(Arc::from(y), y_stride, 1),
                Plane::new(Arc::from(u), stride, 1),
                Plane::new(Arc::from(v), stride, 1),
            ]
        };

        RawFrame {
            width,
            height,
            format: RawFormat::Yuv420,
            planes,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    fn expected_nv21(width: usize, height: usize) -> Vec<u8> {
        let mut out: Vec<u8> = (0..width * height).map(|i| i as u8).collect();
        for i in 0..(width / 2) * (height / 2) {
            out.push(200 + i as u8);
            out.push(100 + i as u8);
        }
        out
    }

    #[test]
    fn test_planar_with_padding() {
        let frame = make_frame(8, 4, 3, false);
        let mut dst = vec![0u8; nv21_len(8, 4)];
        yuv420_to_nv21(&frame, &mut dst).unwrap();
        assert_eq!(dst, expected_nv21(8, 4));
        assert!(!dst.contains(&0xEE), "row padding leaked into output");
    }

    #[test]
    fn test_semi_planar_pixel_stride_two() {
        let frame = make_frame(8, 4, 6, true);
        let mut dst = vec![0u8; nv21_len(8, 4)];
        yuv420_to_nv21(&frame, &mut dst).unwrap();
        assert_eq!(dst, expected_nv21(8, 4));
    }

    #[test]
    fn test_chroma_order_is_v_then_u() {
        let frame = make_frame(2, 2, 0, false);
        let mut dst = vec![0u8; 6];
        yuv420_to_nv21(&frame, &mut dst).unwrap();
        assert_eq!(&dst[4..], &[200, 100]);
    }

    #[test]
    fn test_destination_too_small() {
        let frame = make_frame(8, 4, 0, false);
        let mut dst = vec![0u8; nv21_len(8, 4) - 1];
        assert_eq!(
            yuv420_to_nv21(&frame, &mut dst),
            Err(PipelineError::BufferTooSmall {
                required: 48,
                actual: 47
            })
        );
    }

    #[test]
    fn test_larger_destination_keeps_tail() {
        let frame = make_frame(4, 2, 0, false);
        let mut dst = vec![0x55u8; nv21_len(4, 2) + 4];
        yuv420_to_nv21(&frame, &mut dst).unwrap();
        assert_eq!(&dst[nv21_len(4, 2)..], &[0x55; 4]);
    }

    #[test]
    fn test_rejects_non_yuv420() {
        let mut frame = make_frame(4, 2, 0, false);
        frame.format = RawFormat::Other("YUYV".to_string());
        let mut dst = vec![0u8; nv21_len(4, 2)];
        assert!(matches!(
            yuv420_to_nv21(&frame, &mut dst),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_missing_plane() {
        let mut frame = make_frame(4, 2, 0, false);
        frame.planes.pop();
        let mut dst = vec![0u8; nv21_len(4, 2)];
        assert!(matches!(
            yuv420_to_nv21(&frame, &mut dst),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_plane() {
        let mut frame = make_frame(8, 4, 0, false);
        let short: Arc<[u8]> = Arc::from(vec![0u8; 10]);
        frame.planes[0] = Plane::new(short, 8, 1);
        let mut dst = vec![0u8; nv21_len(8, 4)];
        assert!(matches!(
            yuv420_to_nv21(&frame, &mut dst),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }
}
