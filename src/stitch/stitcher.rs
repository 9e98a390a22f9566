//! Grid stitching of one slice.
//!
//! [`GridStitcher`] ties the stages together: initial layout from the grid,
//! pairwise registration of neighbouring tiles, global optimization of the
//! positions, and fusion into the composite.

use serde::Serialize;
use tracing::debug;

use super::fusion::{fuse, FusionMethod, DEFAULT_BLENDING_ALPHA};
use super::layout::{GridLayout, TilePlacement};
use super::optimize::{optimize, OptimizeParams, TileLink};
use super::phase_correlation::PhaseCorrelator;
use crate::error::StitchError;
use crate::plane::Plane;

/// Default number of PCM peaks tested per tile pair.
pub const DEFAULT_CHECK_PEAKS: usize = 5;

/// Everything that controls how a grid is stitched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StitchParams {
    pub grid: GridLayout,
    /// Nominal overlap between neighbours, in percent of the tile size
    pub overlap_percent: f64,
    pub fusion: FusionMethod,
    pub optimize: OptimizeParams,
    /// Register tiles; when off the layout positions are used as they are
    pub compute_overlap: bool,
    pub check_peaks: usize,
    pub blending_alpha: f64,
}

impl StitchParams {
    pub fn new(grid: GridLayout) -> Self {
        Self {
            grid,
            overlap_percent: 10.0,
            fusion: FusionMethod::LinearBlending,
            optimize: OptimizeParams::default(),
            compute_overlap: true,
            check_peaks: DEFAULT_CHECK_PEAKS,
            blending_alpha: DEFAULT_BLENDING_ALPHA,
        }
    }
}

/// Outcome of stitching one slice.
#[derive(Debug, Clone)]
pub struct StitchResult {
    pub fused: Plane,
    /// Layout positions the registration started from
    pub layout: Vec<TilePlacement>,
    /// Final position of every tile
    pub positions: Vec<(f64, f64)>,
    pub links: Vec<TileLink>,
    pub summary: StitchSummary,
}

/// Residuals of the global optimization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StitchSummary {
    pub links_measured: usize,
    pub links_removed: usize,
    pub average_error: f64,
    pub max_error: f64,
}

/// Stitches grids of equally sized tiles.
pub struct GridStitcher {
    params: StitchParams,
}

impl GridStitcher {
    pub fn new(params: StitchParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StitchParams {
        &self.params
    }

    /// Stitch `tiles`, given in grid index order.
    pub fn stitch(&self, tiles: &[Plane]) -> Result<StitchResult, StitchError> {
        let params = &self.params;
        let (width, height) = check_tiles(tiles, params.grid.tile_count())?;

        let layout = params
            .grid
            .positions(width, height, params.overlap_percent)?;
        let initial: Vec<(f64, f64)> = layout.iter().map(|p| (p.x, p.y)).collect();

        let (positions, links, summary) = if params.compute_overlap {
            self.register(tiles, &initial, width, height)
        } else {
            (initial.clone(), Vec::new(), StitchSummary::default())
        };

        let fused = fuse(tiles, &positions, params.fusion, params.blending_alpha);
        debug!(
            width = fused.width(),
            height = fused.height(),
            links = summary.links_measured,
            removed = summary.links_removed,
            "Fused slice"
        );

        Ok(StitchResult {
            fused,
            layout,
            positions,
            links,
            summary,
        })
    }

    fn register(
        &self,
        tiles: &[Plane],
        initial: &[(f64, f64)],
        width: u32,
        height: u32,
    ) -> (Vec<(f64, f64)>, Vec<TileLink>, StitchSummary) {
        let correlator = PhaseCorrelator::new(width, height, self.params.check_peaks);

        let mut links: Vec<TileLink> = self
            .params
            .grid
            .neighbour_pairs()
            .into_iter()
            .filter_map(|(from, to)| {
                let shift = correlator.correlate(&tiles[from], &tiles[to]);
                match shift {
                    Some(shift) => {
                        debug!(
                            from,
                            to,
                            dx = shift.dx,
                            dy = shift.dy,
                            r = shift.r,
                            "Pair registered"
                        );
                        Some(TileLink::new(from, to, shift.dx, shift.dy, shift.r))
                    }
                    None => {
                        debug!(from, to, "No usable overlap between tiles");
                        None
                    }
                }
            })
            .collect();

        let result = optimize(initial, &mut links, &self.params.optimize);
        let summary = StitchSummary {
            links_measured: links.len(),
            links_removed: result.removed_links,
            average_error: result.average_error,
            max_error: result.max_error,
        };
        (result.positions, links, summary)
    }
}

/// Check the tile count and that all tiles share the first one's size.
fn check_tiles(tiles: &[Plane], expected: usize) -> Result<(u32, u32), StitchError> {
    if tiles.len() != expected {
        return Err(StitchError::TileCountMismatch {
            expected,
            actual: tiles.len(),
        });
    }
    let (width, height) = tiles[0].dimensions();
    for (index, tile) in tiles.iter().enumerate().skip(1) {
        let (actual_width, actual_height) = tile.dimensions();
        if (actual_width, actual_height) != (width, height) {
            return Err(StitchError::TileSizeMismatch {
                index,
                width,
                height,
                actual_width,
                actual_height,
            });
        }
    }
    Ok((width, height))
}

// =============================================================================
// Tests
// =============================================================================
