//! Command-line configuration for stack-stitcher.
//!
//! This module provides:
//! - Subcommands (`run`, `split`, `check`) via clap
//! - Environment variables with `STITCH_` prefix
//! - Defaults matching a 2x2 column-by-column grid with 10% overlap
//!
//! # Environment Variables
//!
//! - `STITCH_ROOT` - Project root holding `input/` (default: .)
//! - `STITCH_TILES` - Comma-separated tile stack names, in grid order
//! - `STITCH_GRID_X` / `STITCH_GRID_Y` - Grid size (default: 2 x 2)
//! - `STITCH_OVERLAP` - Tile overlap in percent (default: 10)
//! - `STITCH_GRID_TYPE` / `STITCH_GRID_ORDER` - Grid traversal
//! - `STITCH_FUSION` - Fusion method (default: linear-blending)
//! - `STITCH_REGRESSION_THRESHOLD` - Minimum link correlation (default: 0.30)
//! - `STITCH_MAX_AVG_DISPLACEMENT` - Max/avg error ratio (default: 2.50)
//! - `STITCH_ABSOLUTE_DISPLACEMENT` - Absolute error in pixels (default: 3.50)
//! - `STITCH_MAX_SLICES` - Stop after this many slices

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::StitchError;
use crate::io::DEFAULT_BLOCK_SIZE;
use crate::pipeline::{PipelineOptions, ProjectLayout, DEFAULT_CACHE_BLOCKS};
use crate::stitch::fusion::DEFAULT_BLENDING_ALPHA;
use crate::stitch::{
    FusionMethod, GridLayout, GridOrder, GridType, OptimizeParams, StitchParams,
    DEFAULT_CHECK_PEAKS,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default project root.
pub const DEFAULT_ROOT: &str = ".";

/// Default tile stacks.
pub const DEFAULT_TILES: &str = "tile1_1.tif,tile1_2.tif,tile1_3.tif,tile1_4.tif";

/// Default grid columns.
pub const DEFAULT_GRID_X: u32 = 2;

/// Default grid rows.
pub const DEFAULT_GRID_Y: u32 = 2;

/// Default tile overlap in percent.
pub const DEFAULT_OVERLAP: f64 = 10.0;

/// Default regression threshold.
pub const DEFAULT_REGRESSION_THRESHOLD: f64 = 0.30;

/// Default max/avg displacement threshold.
pub const DEFAULT_MAX_AVG_DISPLACEMENT: f64 = 2.50;

/// Default absolute displacement threshold in pixels.
pub const DEFAULT_ABSOLUTE_DISPLACEMENT: f64 = 3.50;

// =============================================================================
// CLI Arguments
// =============================================================================

/// stack-stitcher - Split, stitch and reassemble multi-tile TIFF stacks.
///
/// Every tile stack covers one grid position at every depth. Each depth is
/// stitched on its own and the composites are stacked again.
#[derive(Parser, Debug, Clone)]
#[command(name = "stack-stitcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split every stack, stitch each slice and write the final stack
    Run(RunConfig),

    /// Create the project folders and split the stacks into slices
    Split(SplitConfig),

    /// Open every stack and report depth, size and pixel type
    Check(CheckConfig),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root; stacks are read from `<root>/input`.
    #[arg(long, default_value = DEFAULT_ROOT, env = "STITCH_ROOT")]
    pub root: PathBuf,

    /// Tile stack file names in grid index order (comma-separated).
    #[arg(
        long,
        default_value = DEFAULT_TILES,
        env = "STITCH_TILES",
        value_delimiter = ','
    )]
    pub tiles: Vec<String>,

    /// Block size in bytes for the read cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "STITCH_BLOCK_SIZE")]
    pub block_size: usize,

    /// Cached blocks per open stack.
    #[arg(long, default_value_t = DEFAULT_CACHE_BLOCKS, env = "STITCH_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ProjectArgs {
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.root)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tiles.is_empty() || self.tiles.iter().any(|t| t.trim().is_empty()) {
            return Err("tiles must list at least one non-empty file name".to_string());
        }
        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Stitching options.
#[derive(Args, Debug, Clone)]
pub struct StitchArgs {
    /// Number of grid columns.
    #[arg(long, default_value_t = DEFAULT_GRID_X, env = "STITCH_GRID_X")]
    pub grid_x: u32,

    /// Number of grid rows.
    #[arg(long, default_value_t = DEFAULT_GRID_Y, env = "STITCH_GRID_Y")]
    pub grid_y: u32,

    /// Overlap between neighbouring tiles, in percent.
    #[arg(long, default_value_t = DEFAULT_OVERLAP, env = "STITCH_OVERLAP")]
    pub overlap: f64,

    /// How tile indices advance through the grid.
    #[arg(long, value_enum, default_value_t = GridType::ColumnByColumn, env = "STITCH_GRID_TYPE")]
    pub grid_type: GridType,

    /// Fill direction of rows and columns.
    #[arg(long, value_enum, default_value_t = GridOrder::DownRight, env = "STITCH_GRID_ORDER")]
    pub grid_order: GridOrder,

    /// How overlapping pixels are combined.
    #[arg(long, value_enum, default_value_t = FusionMethod::LinearBlending, env = "STITCH_FUSION")]
    pub fusion: FusionMethod,

    /// Links with a lower correlation are discarded.
    #[arg(
        long,
        default_value_t = DEFAULT_REGRESSION_THRESHOLD,
        env = "STITCH_REGRESSION_THRESHOLD"
    )]
    pub regression_threshold: f64,

    /// Drop links while max error / average error exceeds this.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_AVG_DISPLACEMENT,
        env = "STITCH_MAX_AVG_DISPLACEMENT"
    )]
    pub max_avg_displacement: f64,

    /// ... and the max error exceeds this many pixels.
    #[arg(
        long,
        default_value_t = DEFAULT_ABSOLUTE_DISPLACEMENT,
        env = "STITCH_ABSOLUTE_DISPLACEMENT"
    )]
    pub absolute_displacement: f64,

    /// Place tiles at their grid positions without registration.
    #[arg(long, default_value_t = false)]
    pub no_compute_overlap: bool,

    /// Phase correlation peaks tested per tile pair.
    #[arg(long, default_value_t = DEFAULT_CHECK_PEAKS, env = "STITCH_CHECK_PEAKS")]
    pub check_peaks: usize,

    /// Exponent of the linear blending ramp.
    #[arg(long, default_value_t = DEFAULT_BLENDING_ALPHA, env = "STITCH_BLENDING_ALPHA")]
    pub blending_alpha: f64,
}

impl StitchArgs {
    pub fn validate(&self, tile_count: usize) -> Result<(), String> {
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err("grid_x and grid_y must be at least 1".to_string());
        }
        let cells = self.grid_x as usize * self.grid_y as usize;
        if tile_count != cells {
            return Err(format!(
                "a {}x{} grid needs {} tiles, got {}",
                self.grid_x, self.grid_y, cells, tile_count
            ));
        }
        if !(0.0..100.0).contains(&self.overlap) {
            return Err("overlap must be in [0, 100)".to_string());
        }
        for (name, value) in [
            ("regression_threshold", self.regression_threshold),
            ("max_avg_displacement", self.max_avg_displacement),
            ("absolute_displacement", self.absolute_displacement),
            ("blending_alpha", self.blending_alpha),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number", name));
            }
        }
        if self.check_peaks == 0 {
            return Err("check_peaks must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn params(&self) -> Result<StitchParams, StitchError> {
        let grid = GridLayout::new(self.grid_x, self.grid_y, self.grid_type, self.grid_order)?;
        Ok(StitchParams {
            grid,
            overlap_percent: self.overlap,
            fusion: self.fusion,
            optimize: OptimizeParams {
                regression_threshold: self.regression_threshold,
                max_avg_displacement: self.max_avg_displacement,
                absolute_displacement: self.absolute_displacement,
            },
            compute_overlap: !self.no_compute_overlap,
            check_peaks: self.check_peaks,
            blending_alpha: self.blending_alpha,
        })
    }
}

/// `run` options.
#[derive(Args, Debug, Clone)]
pub struct RunConfig {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub stitch: StitchArgs,

    /// Stop after this many slices.
    #[arg(long, env = "STITCH_MAX_SLICES")]
    pub max_slices: Option<usize>,
}

impl RunConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        self.stitch.validate(self.project.tiles.len())?;
        validate_max_slices(self.max_slices)
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions, StitchError> {
        Ok(PipelineOptions {
            layout: self.project.layout(),
            tiles: self.project.tiles.clone(),
            stitch: self.stitch.params()?,
            max_slices: self.max_slices,
            block_size: self.project.block_size,
            cache_blocks: self.project.cache_blocks,
        })
    }
}

/// `split` options.
#[derive(Args, Debug, Clone)]
pub struct SplitConfig {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Stop after this many slices.
    #[arg(long, env = "STITCH_MAX_SLICES")]
    pub max_slices: Option<usize>,
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        validate_max_slices(self.max_slices)
    }
}

/// `check` options.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print a JSON summary instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()
    }
}

fn validate_max_slices(max_slices: Option<usize>) -> Result<(), String> {
    if max_slices == Some(0) {
        return Err("max_slices must be greater than 0".to_string());
    }
    Ok(())
}

/// Stitching parameters for `split` and `check`, which take no stitching
/// options.
pub fn default_stitch_params() -> Result<StitchParams, StitchError> {
    let grid = GridLayout::new(
        DEFAULT_GRID_X,
        DEFAULT_GRID_Y,
        GridType::ColumnByColumn,
        GridOrder::DownRight,
    )?;
    Ok(StitchParams::new(grid))
}

// =============================================================================
// Tests
// =============================================================================
