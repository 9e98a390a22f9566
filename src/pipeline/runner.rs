//! End-to-end run: split, stitch every slice, assemble the final stack.
//!
//! # Flow
//!
//! ```text
//! ensure directories
//!   └─ split each tile stack into split/slice_<s>/tile_<s>_<t>.tif
//!        └─ for s in 1..=slices
//!             ├─ read tile_<s>_*.tif
//!             ├─ stitch (blocking pool)
//!             ├─ write TileConfiguration*.txt, stitched_image_<s>.tif
//!             └─ append to the accumulator
//!   └─ write final_stitched_stack.tif and run_report.json
//! ```
//!
//! Slices are processed one after the other.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use super::accumulator::StackAccumulator;
use super::layout::ProjectLayout;
use super::splitter::{SplitSummary, Splitter, StackInfo};
use super::timing::RunTimings;
use crate::error::{IoError, PipelineError};
use crate::format::tiff::{TiffStack, TiffWriter};
use crate::io::{BlockCache, LocalFileReader, DEFAULT_BLOCK_SIZE};
use crate::plane::{PixelType, Plane};
use crate::stitch::{
    GridStitcher, StitchParams, StitchResult, StitchSummary, TileConfiguration, TileLink,
};

/// Default number of cached blocks per open tile stack.
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub layout: ProjectLayout,
    /// Input stack file names, in grid index order
    pub tiles: Vec<String>,
    pub stitch: StitchParams,
    /// Stop after this many slices
    pub max_slices: Option<usize>,
    pub block_size: usize,
    pub cache_blocks: usize,
}

impl PipelineOptions {
    pub fn new(layout: ProjectLayout, tiles: Vec<String>, stitch: StitchParams) -> Self {
        Self {
            layout,
            tiles,
            stitch,
            max_slices: None,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }
}

// =============================================================================
// Run report
// =============================================================================

/// Per-slice entry of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct SliceReport {
    pub slice: usize,
    pub width: u32,
    pub height: u32,
    pub positions: Vec<(f64, f64)>,
    pub links: Vec<TileLink>,
    #[serde(flatten)]
    pub summary: StitchSummary,
    pub seconds: f64,
}

/// Written as `run_report.json` next to the final stack.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: &'static str,
    pub tiles: Vec<StackInfo>,
    pub parameters: StitchParams,
    pub depth: usize,
    pub slices_stitched: usize,
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub final_stack: String,
    pub total_seconds: f64,
    pub average_seconds: f64,
    pub slices: Vec<SliceReport>,
    #[serde(skip)]
    pub timings: RunTimings,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs the split/stitch/assemble procedure for one project.
pub struct Pipeline {
    options: PipelineOptions,
    splitter: Splitter,
    writer: TiffWriter,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let splitter = Splitter::new(
            options.layout.clone(),
            options.block_size,
            options.cache_blocks,
        );
        Self {
            options,
            splitter,
            writer: TiffWriter::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.options.layout
    }

    /// Create the directories and split every tile stack.
    pub async fn split(&self) -> Result<SplitSummary, PipelineError> {
        self.layout().ensure().await?;
        self.splitter
            .split(&self.options.tiles, self.options.max_slices, &self.writer)
            .await
    }

    /// Open every tile stack without writing anything.
    pub async fn inspect(&self) -> Result<Vec<StackInfo>, PipelineError> {
        self.splitter.inspect(&self.options.tiles).await
    }

    /// Full run.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let layout = self.layout();

        let split = self.split().await?;
        let mut accumulator = StackAccumulator::new();
        let mut slices = Vec::with_capacity(split.slices);
        let mut per_slice = Vec::with_capacity(split.slices);

        for slice in 1..=split.slices {
            let slice_started = Instant::now();
            let result = self.stitch_slice(slice, split.slices).await?;

            self.writer
                .write_plane(&layout.stitched_path(slice), &result.fused)
                .await?;

            let elapsed = slice_started.elapsed();
            info!(
                slice,
                of = split.slices,
                width = result.fused.width(),
                height = result.fused.height(),
                links = result.summary.links_measured,
                removed = result.summary.links_removed,
                seconds = elapsed.as_secs_f64(),
                "Stitched slice"
            );

            slices.push(SliceReport {
                slice,
                width: result.fused.width(),
                height: result.fused.height(),
                positions: result.positions,
                links: result.links,
                summary: result.summary,
                seconds: elapsed.as_secs_f64(),
            });
            per_slice.push(elapsed);
            accumulator.push(result.fused);
        }

        let appended = accumulator.len();
        let (width, height) = accumulator.dimensions();
        let stack = accumulator.finish();
        let final_path = layout.final_stack_path();
        if !stack.is_empty() {
            self.writer.write_stack(&final_path, &stack).await?;
            info!(
                path = %final_path.display(),
                slices = stack.len(),
                width,
                height,
                "Wrote final stack"
            );
        }

        let mut timings = RunTimings::new(started.elapsed(), appended);
        timings.per_slice = per_slice;

        let report = RunReport {
            version: env!("CARGO_PKG_VERSION"),
            pixel_type: split
                .stacks
                .first()
                .map_or(PixelType::U8, |info| info.pixel_type),
            tiles: split.stacks,
            parameters: self.options.stitch,
            depth: split.depth,
            slices_stitched: appended,
            width,
            height,
            final_stack: final_path.display().to_string(),
            total_seconds: timings.total.as_secs_f64(),
            average_seconds: timings.average().as_secs_f64(),
            slices,
            timings,
        };
        self.write_report(&report).await?;
        Ok(report)
    }

    /// Stitch one slice from its split files and write its tile
    /// configurations.
    pub async fn stitch_slice(
        &self,
        slice: usize,
        depth: usize,
    ) -> Result<StitchResult, PipelineError> {
        if slice == 0 || slice > depth {
            return Err(PipelineError::SliceOutOfRange { slice, depth });
        }

        let layout = self.layout();
        let tiles = self.load_slice(slice).await?;
        let params = self.options.stitch;
        let result = tokio::task::spawn_blocking(move || GridStitcher::new(params).stitch(&tiles))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))??;

        let names: Vec<String> = (1..=self.options.tiles.len())
            .map(|tile| ProjectLayout::split_tile_name(slice, tile))
            .collect();
        let initial: Vec<(f64, f64)> = result.layout.iter().map(|p| (p.x, p.y)).collect();
        write_text(
            &layout.tile_configuration_path(slice),
            TileConfiguration::from_positions(&names, &initial).to_text(),
        )
        .await?;
        write_text(
            &layout.registered_configuration_path(slice),
            TileConfiguration::from_positions(&names, &result.positions).to_text(),
        )
        .await?;

        Ok(result)
    }

    async fn load_slice(&self, slice: usize) -> Result<Vec<Plane>, PipelineError> {
        let mut tiles = Vec::with_capacity(self.options.tiles.len());
        for tile in 1..=self.options.tiles.len() {
            let path = self.layout().split_tile_path(slice, tile);
            let reader = LocalFileReader::open(&path).await?;
            let stack = TiffStack::open(BlockCache::new(reader)).await?;
            tiles.push(stack.read_page(0).await?);
        }
        debug!(slice, tiles = tiles.len(), "Loaded slice tiles");
        Ok(tiles)
    }

    async fn write_report(&self, report: &RunReport) -> Result<(), PipelineError> {
        let json =
            serde_json::to_string_pretty(report).map_err(|e| PipelineError::Report(e.to_string()))?;
        write_text(&self.layout().report_path(), json).await?;
        Ok(())
    }
}

async fn write_text(path: &Path, text: String) -> Result<(), IoError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|e| IoError::from_std(e, &path.display().to_string()))
}
