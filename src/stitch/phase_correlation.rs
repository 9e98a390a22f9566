//! Pairwise registration by phase correlation.
//!
//! For two tiles of the same size the normalized cross-power spectrum is
//! inverted into a phase correlation matrix (PCM). Each of its highest
//! peaks stands for four possible shifts because the transform wraps
//! around; every candidate is scored by the normalized cross-correlation
//! `r` of the pixels it makes overlap, and the best one wins.
//!
//! Shifts are in pixels and give the position of `b`'s origin in `a`'s
//! frame, so `b(x, y) == a(x + dx, y + dy)` over the overlap.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Serialize;

use crate::plane::Plane;

/// Smallest overlap, as a fraction of the tile area, a candidate shift
/// may leave.
const MIN_OVERLAP_FRACTION: f64 = 0.02;

/// Absolute floor for the overlap in pixels.
const MIN_OVERLAP_PIXELS: usize = 64;

/// Magnitudes below this are treated as zero in the cross-power spectrum.
const SPECTRUM_EPSILON: f64 = 1e-12;

/// Best shift found between two tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairShift {
    pub dx: f64,
    pub dy: f64,
    /// Normalized cross-correlation over the overlap, in [-1, 1]
    pub r: f64,
}

/// A PCM peak: position and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: usize,
    pub y: usize,
    pub value: f64,
}

/// FFT plans for one tile size.
pub struct PhaseCorrelator {
    width: usize,
    height: usize,
    check_peaks: usize,
    min_overlap: usize,
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl PhaseCorrelator {
    /// Plan transforms for `width` x `height` tiles, testing the
    /// `check_peaks` highest peaks of each PCM.
    pub fn new(width: u32, height: u32, check_peaks: usize) -> Self {
        let (width, height) = (width as usize, height as usize);
        let mut planner = FftPlanner::new();
        let area = width * height;
        let min_overlap = ((area as f64 * MIN_OVERLAP_FRACTION).ceil() as usize)
            .max(MIN_OVERLAP_PIXELS)
            .min(area);
        Self {
            width,
            height,
            check_peaks: check_peaks.max(1),
            min_overlap,
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    /// Register `b` against `a`. Returns `None` when no candidate leaves
    /// enough textured overlap to score.
    pub fn correlate(&self, a: &Plane, b: &Plane) -> Option<PairShift> {
        if a.dimensions() != (self.width as u32, self.height as u32)
            || b.dimensions() != a.dimensions()
        {
            return None;
        }

        let pcm = self.phase_correlation_matrix(a, b);
        let peaks = find_peaks(&pcm, self.width, self.height, self.check_peaks);

        let (w, h) = (self.width as i64, self.height as i64);
        let mut best: Option<PairShift> = None;
        for peak in peaks {
            let (px, py) = (peak.x as i64, peak.y as i64);
            for dx in [px, px - w] {
                for dy in [py, py - h] {
                    let Some(r) = cross_correlation(a, b, dx, dy, self.min_overlap) else {
                        continue;
                    };
                    if best.map_or(true, |current| r > current.r) {
                        best = Some(PairShift {
                            dx: dx as f64,
                            dy: dy as f64,
                            r,
                        });
                    }
                }
            }
        }
        best
    }

    /// Real part of the inverse normalized cross-power spectrum.
    pub fn phase_correlation_matrix(&self, a: &Plane, b: &Plane) -> Vec<f64> {
        let mut fa = self.spectrum(a);
        let fb = self.spectrum(b);

        for (x, y) in fa.iter_mut().zip(&fb) {
            let cross = *x * y.conj();
            let magnitude = cross.norm();
            *x = if magnitude > SPECTRUM_EPSILON {
                cross / magnitude
            } else {
                Complex::new(0.0, 0.0)
            };
        }

        self.fft2d(&mut fa, true);
        let scale = 1.0 / (self.width * self.height) as f64;
        fa.iter().map(|c| c.re * scale).collect()
    }

    fn spectrum(&self, plane: &Plane) -> Vec<Complex<f64>> {
        let samples = plane.samples();
        let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len().max(1) as f64;
        let mut data: Vec<Complex<f64>> = samples
            .iter()
            .map(|&v| Complex::new(v as f64 - mean, 0.0))
            .collect();
        self.fft2d(&mut data, false);
        data
    }

    /// In-place 2D transform of a row-major buffer.
    fn fft2d(&self, data: &mut [Complex<f64>], inverse: bool) {
        let (row, col) = if inverse {
            (&self.row_inverse, &self.col_inverse)
        } else {
            (&self.row_forward, &self.col_forward)
        };
        let (w, h) = (self.width, self.height);

        // Rows are contiguous; one call transforms all of them.
        row.process(data);

        let mut columns = vec![Complex::new(0.0, 0.0); w * h];
        for y in 0..h {
            for x in 0..w {
                columns[x * h + y] = data[y * w + x];
            }
        }
        col.process(&mut columns);
        for x in 0..w {
            for y in 0..h {
                data[y * w + x] = columns[x * h + y];
            }
        }
    }
}

/// The `count` highest local maxima of a wrapped `width` x `height` matrix.
pub fn find_peaks(matrix: &[f64], width: usize, height: usize, count: usize) -> Vec<Peak> {
    let at = |x: i64, y: i64| {
        let x = x.rem_euclid(width as i64) as usize;
        let y = y.rem_euclid(height as i64) as usize;
        matrix[y * width + x]
    };

    let mut peaks = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let value = matrix[y * width + x];
            let (xi, yi) = (x as i64, y as i64);
            let is_max = (-1..=1).all(|oy| {
                (-1..=1).all(|ox| (ox == 0 && oy == 0) || at(xi + ox, yi + oy) <= value)
            });
            if is_max {
                peaks.push(Peak { x, y, value });
            }
        }
    }

    peaks.sort_by(|a, b| b.value.total_cmp(&a.value));
    peaks.truncate(count);
    peaks
}

/// Pearson correlation of `a` and `b` placed at (`dx`, `dy`) in `a`'s frame,
/// over their overlap. `None` if the overlap is smaller than `min_overlap`
/// pixels or either side has no variance there.
pub fn cross_correlation(
    a: &Plane,
    b: &Plane,
    dx: i64,
    dy: i64,
    min_overlap: usize,
) -> Option<f64> {
    let (aw, ah) = (a.width() as i64, a.height() as i64);
    let (bw, bh) = (b.width() as i64, b.height() as i64);

    let x0 = dx.max(0);
    let y0 = dy.max(0);
    let x1 = (dx + bw).min(aw);
    let y1 = (dy + bh).min(ah);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let count = ((x1 - x0) * (y1 - y0)) as usize;
    if count < min_overlap.max(1) {
        return None;
    }

    let (a_samples, b_samples) = (a.samples(), b.samples());
    let pixel_pairs = || {
        (y0..y1).flat_map(move |y| {
            (x0..x1).map(move |x| {
                let va = a_samples[(y * aw + x) as usize] as f64;
                let vb = b_samples[((y - dy) * bw + (x - dx)) as usize] as f64;
                (va, vb)
            })
        })
    };

    let n = count as f64;
    let (sum_a, sum_b) = pixel_pairs().fold((0.0, 0.0), |(sa, sb), (va, vb)| (sa + va, sb + vb));
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (va, vb) in pixel_pairs() {
        let (da, db) = (va - mean_a, vb - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::PixelType;

    /// Deterministic textured scene.
    fn scene(width: u32, height: u32) -> Plane {
        let mut state = 0x2545_f491_u32;
        let samples = (0..width * height)
            .map(|i| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                (state % 97) as f32 + 10.0 * ((x * 0.21).sin() + (y * 0.17).cos())
            })
            .collect();
        Plane::from_samples(width, height, PixelType::F32, samples).unwrap()
    }

    fn crop(plane: &Plane, x: u32, y: u32, width: u32, height: u32) -> Plane {
        let mut out = Plane::new(width, height, plane.pixel_type());
        for row in 0..height {
            for col in 0..width {
                out.put(col, row, plane.get(x + col, y + row));
            }
        }
        out
    }

    #[test]
    fn test_recovers_horizontal_shift() {
        let world = scene(200, 80);
        let a = crop(&world, 0, 0, 64, 48);
        let b = crop(&world, 57, 3, 64, 48);

        let correlator = PhaseCorrelator::new(64, 48, 5);
        let shift = correlator.correlate(&a, &b).unwrap();
        assert_eq!((shift.dx, shift.dy), (57.0, 3.0));
        assert!(shift.r > 0.99, "r = {}", shift.r);
    }

    #[test]
    fn test_recovers_negative_shift() {
        let world = scene(120, 160);
        let a = crop(&world, 10, 60, 64, 64);
        let b = crop(&world, 8, 2, 64, 64);

        let correlator = PhaseCorrelator::new(64, 64, 5);
        let shift = correlator.correlate(&a, &b).unwrap();
        assert_eq!((shift.dx, shift.dy), (-2.0, -58.0));
    }

    #[test]
    fn test_flat_tiles_have_no_shift() {
        let a = Plane::from_samples(32, 32, PixelType::U8, vec![7.0; 1024]).unwrap();
        let correlator = PhaseCorrelator::new(32, 32, 5);
        assert!(correlator.correlate(&a, &a.clone()).is_none());
    }

    #[test]
    fn test_mismatched_sizes_rejected() {
        let correlator = PhaseCorrelator::new(32, 32, 5);
        let a = scene(32, 32);
        let b = scene(16, 32);
        assert!(correlator.correlate(&a, &b).is_none());
    }

    #[test]
    fn test_find_peaks_wraps_and_orders() {
        let mut matrix = vec![0.0; 16];
        matrix[0] = 1.0; // corner, neighbours wrap
        matrix[10] = 3.0;
        matrix[3] = 0.5; // wraps next to matrix[0]
        let peaks = find_peaks(&matrix, 4, 4, 2);
        assert_eq!(peaks.len(), 2);
        assert_eq!((peaks[0].x, peaks[0].y), (2, 2));
        assert_eq!((peaks[1].x, peaks[1].y), (0, 0));
    }

    #[test]
    fn test_cross_correlation() {
        let world = scene(100, 50);
        let a = crop(&world, 0, 0, 40, 40);
        let b = crop(&world, 20, 5, 40, 40);
        let r = cross_correlation(&a, &b, 20, 5, 64).unwrap();
        assert!((r - 1.0).abs() < 1e-9);

        // No overlap
        assert!(cross_correlation(&a, &b, 40, 0, 1).is_none());
        // Overlap below the floor
        assert!(cross_correlation(&a, &b, 38, 0, 200).is_none());
    }

    #[test]
    fn test_min_overlap_floor() {
        assert_eq!(PhaseCorrelator::new(10, 10, 5).min_overlap(), 64);
        assert_eq!(PhaseCorrelator::new(4, 4, 5).min_overlap(), 16);
        assert_eq!(PhaseCorrelator::new(1000, 100, 5).min_overlap(), 2000);
    }
}
