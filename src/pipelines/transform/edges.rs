// SPDX-License-Identifier: GPL-3.0-only

//! Luma edge detection
//!
//! Sobel gradients with an L1 magnitude, non-maximum suppression along the
//! quantized gradient direction, and double-threshold hysteresis. Output is
//! white edges on black with opaque alpha.

use super::FrameTransform;
use super::color::shapes_ok;

/// Default hysteresis thresholds on the L1 gradient magnitude
pub const DEFAULT_LOW_THRESHOLD: i32 = 80;
pub const DEFAULT_HIGH_THRESHOLD: i32 = 160;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

/// Edge detector with scratch buffers reused across frames
pub struct EdgeDetector {
    low: i32,
    high: i32,
    magnitude: Vec<i32>,
    direction: Vec<u8>,
    class: Vec<u8>,
    stack: Vec<usize>,
}

impl EdgeDetector {
    pub fn new(low: i32, high: i32) -> Self {
        Self {
            low: low.min(high),
            high: high.max(low),
            magnitude: Vec::new(),
            direction: Vec::new(),
            class: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn ensure_scratch(&mut self, pixels: usize) {
        if self.magnitude.len() != pixels {
            self.magnitude = vec![0; pixels];
            self.direction = vec![0; pixels];
            self.class = vec![NOT_EDGE; pixels];
        }
    }

    fn gradients(&mut self, luma: &[u8], w: usize, h: usize) {
        self.magnitude.fill(0);
        let p = |x: usize, y: usize| luma[y * w + x] as i32;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = (p(x + 1, y - 1) + 2 * p(x + 1, y) + p(x + 1, y + 1))
                    - (p(x - 1, y - 1) + 2 * p(x - 1, y) + p(x - 1, y + 1));
                let gy = (p(x - 1, y + 1) + 2 * p(x, y + 1) + p(x + 1, y + 1))
                    - (p(x - 1, y - 1) + 2 * p(x, y - 1) + p(x + 1, y - 1));

                let i = y * w + x;
                self.magnitude[i] = gx.abs() + gy.abs();
                self.direction[i] = quantize_direction(gx, gy);
            }
        }
    }

    fn suppress_and_classify(&mut self, w: usize, h: usize) {
        self.class.fill(NOT_EDGE);
        self.stack.clear();

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let m = self.magnitude[i];
                if m <= self.low {
                    continue;
                }
                let (before, after) = match self.direction[i] {
                    0 => (i - 1, i + 1),
                    1 => (i - w - 1, i + w + 1),
                    2 => (i - w, i + w),
                    _ => (i - w + 1, i + w - 1),
                };
                if m > self.magnitude[before] && m >= self.magnitude[after] {
                    if m > self.high {
                        self.class[i] = STRONG;
                        self.stack.push(i);
                    } else {
                        self.class[i] = WEAK;
                    }
                }
            }
        }
    }

    fn hysteresis(&mut self, w: usize, h: usize) {
        while let Some(i) = self.stack.pop() {
            let (x, y) = (i % w, i / w);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if self.class[n] == WEAK {
                        self.class[n] = STRONG;
                        self.stack.push(n);
                    }
                }
            }
        }
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_THRESHOLD, DEFAULT_HIGH_THRESHOLD)
    }
}

/// 0 = horizontal gradient, 1 = down-right diagonal, 2 = vertical,
/// 3 = down-left diagonal (image coordinates, y down)
#[inline]
fn quantize_direction(gx: i32, gy: i32) -> u8 {
    let ax = gx.abs() as i64;
    let ay = gy.abs() as i64;
    // tan(22.5) ~ 0.4142, tan(67.5) ~ 2.4142
    if ay * 10_000 < ax * 4_142 {
        0
    } else if ay * 10_000 > ax * 24_142 {
        2
    } else if (gx >= 0) == (gy >= 0) {
        1
    } else {
        3
    }
}

impl FrameTransform for EdgeDetector {
    fn name(&self) -> &str {
        "edges"
    }

    fn process(&mut self, nv21: &[u8], width: u32, height: u32, rgba_out: &mut [u8]) -> bool {
        if !shapes_ok(nv21, width, height, rgba_out) {
            return false;
        }
        let (w, h) = (width as usize, height as usize);
        self.ensure_scratch(w * h);

        if w >= 3 && h >= 3 {
            self.gradients(&nv21[..w * h], w, h);
            self.suppress_and_classify(w, h);
            self.hysteresis(w, h);
        } else {
            self.class.fill(NOT_EDGE);
        }

        for (class, out) in self.class.iter().zip(rgba_out.chunks_exact_mut(4)) {
            let v = if *class == STRONG { 255 } else { 0 };
            out.copy_from_slice(&[v, v, v, 255]);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nv21_from_luma(luma: Vec<u8>, w: usize, h: usize) -> Vec<u8> {
        let mut data = luma;
        data.resize(w * h + (w / 2) * (h / 2) * 2, 128);
        data
    }

    fn edge_at(rgba: &[u8], w: usize, x: usize, y: usize) -> bool {
        rgba[(y * w + x) * 4] == 255
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let (w, h) = (8, 8);
        let input = nv21_from_luma(vec![90; w * h], w, h);
        let mut out = vec![7u8; w * h * 4];
        let mut detector = EdgeDetector::default();
        assert!(detector.process(&input, 8, 8, &mut out));
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_vertical_step_edge() {
        let (w, h) = (8, 8);
        let luma: Vec<u8> = (0..w * h)
            .map(|i| if i % w < 4 { 0 } else { 255 })
            .collect();
        let input = nv21_from_luma(luma, w, h);
        let mut out = vec![0u8; w * h * 4];
        let mut detector = EdgeDetector::default();
        assert!(detector.process(&input, 8, 8, &mut out));

        for y in 1..h - 1 {
            assert!(edge_at(&out, w, 3, y), "missing edge at row {}", y);
            assert!(!edge_at(&out, w, 4, y), "edge not thinned at row {}", y);
            assert!(!edge_at(&out, w, 0, y));
            assert!(!edge_at(&out, w, 7, y));
        }
    }

    #[test]
    fn test_weak_only_edge_is_dropped() {
        // Step of 25 gives an L1 magnitude of 100: above low, below high
        let (w, h) = (8, 8);
        let luma: Vec<u8> = (0..w * h)
            .map(|i| if i % w < 4 { 100 } else { 125 })
            .collect();
        let input = nv21_from_luma(luma, w, h);
        let mut out = vec![0u8; w * h * 4];
        let mut detector = EdgeDetector::default();
        assert!(detector.process(&input, 8, 8, &mut out));
        assert!(out.chunks_exact(4).all(|px| px[0] == 0));
    }

    #[test]
    fn test_scratch_follows_resolution() {
        let mut detector = EdgeDetector::default();
        let mut out = vec![0u8; 16 * 4];
        assert!(detector.process(&nv21_from_luma(vec![0; 16], 4, 4), 4, 4, &mut out));
        assert_eq!(detector.magnitude.len(), 16);

        let mut out = vec![0u8; 36 * 4];
        assert!(detector.process(&nv21_from_luma(vec![0; 36], 6, 6), 6, 6, &mut out));
        assert_eq!(detector.magnitude.len(), 36);
    }

    #[test]
    fn test_direction_quantization() {
        assert_eq!(quantize_direction(100, 0), 0);
        assert_eq!(quantize_direction(0, 100), 2);
        assert_eq!(quantize_direction(100, 100), 1);
        assert_eq!(quantize_direction(-100, 100), 3);
    }
}
