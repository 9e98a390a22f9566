//! Fusion of registered tiles into one composite.
//!
//! Tiles are placed at integer-rounded offsets on a canvas spanning their
//! bounding box. Pixels covered by several tiles are combined by the chosen
//! [`FusionMethod`]; pixels covered by none stay zero.

use serde::Serialize;

use crate::plane::Plane;

/// Share of a tile's size, along each axis, over which linear blending
/// ramps the weight from the border up to one.
pub const DEFAULT_BLEND_FRACTION: f64 = 0.2;

/// Default exponent of the linear blending ramp.
pub const DEFAULT_BLENDING_ALPHA: f64 = 1.5;

/// How overlapping pixels are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FusionMethod {
    /// Weighted mean, weights falling off towards each tile's border
    LinearBlending,
    /// Plain mean
    Average,
    Max,
    Min,
    /// Later tiles replace earlier ones
    Overwrite,
}

/// Canvas offsets of every tile, rounded and shifted so the smallest x
/// and y are zero.
pub fn canvas_offsets(positions: &[(f64, f64)]) -> Vec<(u32, u32)> {
    let rounded: Vec<(i64, i64)> = positions
        .iter()
        .map(|&(x, y)| (x.round() as i64, y.round() as i64))
        .collect();
    let min_x = rounded.iter().map(|p| p.0).min().unwrap_or(0);
    let min_y = rounded.iter().map(|p| p.1).min().unwrap_or(0);
    rounded
        .iter()
        .map(|&(x, y)| ((x - min_x) as u32, (y - min_y) as u32))
        .collect()
}

/// Blending weight of pixel `(x, y)` in a `width` x `height` tile.
pub fn blend_weight(x: u32, y: u32, width: u32, height: u32, fraction: f64, alpha: f64) -> f64 {
    axis_weight(x, width, fraction, alpha) * axis_weight(y, height, fraction, alpha)
}

fn axis_weight(pos: u32, size: u32, fraction: f64, alpha: f64) -> f64 {
    let ramp = 0.5 * fraction * size as f64;
    if ramp <= 0.0 {
        return 1.0;
    }
    // Border pixels are one pixel in, never weight zero
    let dist = pos.min(size.saturating_sub(1).saturating_sub(pos)) as f64 + 1.0;
    (dist / ramp).min(1.0).powf(alpha)
}

/// Fuse `tiles` placed at `positions` (same order) into one plane.
///
/// The composite keeps the first tile's pixel type.
pub fn fuse(tiles: &[Plane], positions: &[(f64, f64)], method: FusionMethod, alpha: f64) -> Plane {
    let count = tiles.len().min(positions.len());
    let Some(first) = tiles.first() else {
        return Plane::new(0, 0, crate::plane::PixelType::U8);
    };
    let offsets = canvas_offsets(&positions[..count]);

    let (width, height) = tiles[..count]
        .iter()
        .zip(&offsets)
        .fold((0u32, 0u32), |(w, h), (tile, &(ox, oy))| {
            (w.max(ox + tile.width()), h.max(oy + tile.height()))
        });

    let area = width as usize * height as usize;
    let mut value = vec![0.0f64; area];
    let mut weight = vec![0.0f64; area];

    for (tile, &(ox, oy)) in tiles[..count].iter().zip(&offsets) {
        let (tw, th) = tile.dimensions();
        for y in 0..th {
            let row = (oy + y) as usize * width as usize;
            for x in 0..tw {
                let i = row + (ox + x) as usize;
                let v = tile.get(x, y) as f64;
                match method {
                    FusionMethod::LinearBlending => {
                        let w = blend_weight(x, y, tw, th, DEFAULT_BLEND_FRACTION, alpha);
                        value[i] += w * v;
                        weight[i] += w;
                    }
                    FusionMethod::Average => {
                        value[i] += v;
                        weight[i] += 1.0;
                    }
                    FusionMethod::Max => {
                        value[i] = if weight[i] > 0.0 { value[i].max(v) } else { v };
                        weight[i] = 1.0;
                    }
                    FusionMethod::Min => {
                        value[i] = if weight[i] > 0.0 { value[i].min(v) } else { v };
                        weight[i] = 1.0;
                    }
                    FusionMethod::Overwrite => {
                        value[i] = v;
                        weight[i] = 1.0;
                    }
                }
            }
        }
    }

    let samples = value
        .iter()
        .zip(&weight)
        .map(|(&v, &w)| if w > 0.0 { (v / w) as f32 } else { 0.0 })
        .collect();

    Plane::from_samples(width, height, first.pixel_type(), samples)
        .unwrap_or_else(|| Plane::new(width, height, first.pixel_type()))
}

// =============================================================================
// Tests
// =============================================================================
