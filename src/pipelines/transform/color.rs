// SPDX-License-Identifier: MPL-2.0

//! NV21 to RGBA colour transforms

use super::FrameTransform;

/// Check buffer shapes shared by all NV21 transforms
pub(super) fn shapes_ok(nv21: &[u8], width: u32, height: u32, rgba_out: &[u8]) -> bool {
    let (w, h) = (width as usize, height as usize);
    w >= 2 && h >= 2 && nv21.len() >= w * h + (w / 2) * (h / 2) * 2 && rgba_out.len() >= w * h * 4
}

/// BT.601 limited-range conversion in 7-bit fixed point
#[derive(Debug, Default, Clone, Copy)]
pub struct Nv21ToRgba;

impl FrameTransform for Nv21ToRgba {
    fn name(&self) -> &str {
        "color"
    }

    fn process(&mut self, nv21: &[u8], width: u32, height: u32, rgba_out: &mut [u8]) -> bool {
        if !shapes_ok(nv21, width, height, rgba_out) {
            return false;
        }
        let (w, h) = (width as usize, height as usize);
        let (luma, chroma) = nv21.split_at(w * h);
        let chroma_width = w / 2;
        let chroma_height = h / 2;

        for row in 0..h {
            let vu_row = (row / 2).min(chroma_height - 1) * chroma_width * 2;
            convert_row(
                &luma[row * w..(row + 1) * w],
                &chroma[vu_row..vu_row + chroma_width * 2],
                &mut rgba_out[row * w * 4..(row + 1) * w * 4],
            );
        }
        true
    }
}

#[inline]
fn convert_row(luma: &[u8], vu: &[u8], rgba: &mut [u8]) {
    let pairs = vu.len() / 2;
    for (x, (y, out)) in luma.iter().zip(rgba.chunks_exact_mut(4)).enumerate() {
        let pair = (x / 2).min(pairs - 1) * 2;
        let v = vu[pair] as i32 - 128;
        let u = vu[pair + 1] as i32 - 128;

        let r_v = (179 * v) >> 7;
        let g_u = (44 * u) >> 7;
        let g_v = (91 * v) >> 7;
        let b_u = (227 * u) >> 7;
        let y = ((*y as i32 - 16) * 149) >> 7;

        out[0] = (y + r_v).clamp(0, 255) as u8;
        out[1] = (y - g_u - g_v).clamp(0, 255) as u8;
        out[2] = (y + b_u).clamp(0, 255) as u8;
        out[3] = 255;
    }
}

/// Luma replicated to R, G and B
#[derive(Debug, Default, Clone, Copy)]
pub struct GrayscaleConverter;

impl FrameTransform for GrayscaleConverter {
    fn name(&self) -> &str {
        "gray"
    }

    fn process(&mut self, nv21: &[u8], width: u32, height: u32, rgba_out: &mut [u8]) -> bool {
        if !shapes_ok(nv21, width, height, rgba_out) {
            return false;
        }
        let pixels = width as usize * height as usize;
        for (y, out) in nv21[..pixels].iter().zip(rgba_out.chunks_exact_mut(4)) {
            out.copy_from_slice(&[*y, *y, *y, 255]);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nv21(width: usize, height: usize, y: u8, v: u8, u: u8) -> Vec<u8> {
        let mut data = vec![y; width * height];
        for _ in 0..(width / 2) * (height / 2) {
            data.push(v);
            data.push(u);
        }
        data
    }

    #[test]
    fn test_neutral_gray() {
        let input = nv21(4, 4, 128, 128, 128);
        let mut out = vec![0u8; 4 * 4 * 4];
        assert!(Nv21ToRgba.process(&input, 4, 4, &mut out));
        // (128 - 16) * 149 >> 7 == 130
        for px in out.chunks_exact(4) {
            assert_eq!(px, &[130, 130, 130, 255]);
        }
    }

    #[test]
    fn test_high_v_is_red() {
        let input = nv21(2, 2, 100, 240, 128);
        let mut out = vec![0u8; 16];
        assert!(Nv21ToRgba.process(&input, 2, 2, &mut out));
        assert!(out[0] > out[1] && out[0] > out[2]);
    }

    #[test]
    fn test_odd_dimensions() {
        let input = nv21(3, 3, 50, 128, 128);
        let mut out = vec![0u8; 3 * 3 * 4];
        assert!(Nv21ToRgba.process(&input, 3, 3, &mut out));
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_rejects_short_input() {
        let mut out = vec![0u8; 16];
        assert!(!Nv21ToRgba.process(&[0u8; 5], 2, 2, &mut out));
        assert!(!GrayscaleConverter.process(&[0u8; 6], 2, 2, &mut out[..15]));
        assert!(!Nv21ToRgba.process(&[0u8; 3], 1, 2, &mut out));
    }

    #[test]
    fn test_grayscale() {
        let input = nv21(2, 2, 77, 0, 255);
        let mut out = vec![0u8; 16];
        assert!(GrayscaleConverter.process(&input, 2, 2, &mut out));
        assert_eq!(&out[..4], &[77, 77, 77, 255]);
    }
}
