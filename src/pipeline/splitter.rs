//! Splitting tile stacks into per-slice files.
//!
//! Every input stack is opened once through a block cache. The first stack
//! decides the depth; all others must match it before anything is written.

use serde::Serialize;
use tracing::{debug, info};

use super::layout::ProjectLayout;
use crate::error::{PipelineError, StitchError};
use crate::format::tiff::{TiffStack, TiffWriter};
use crate::io::{open_cached, BlockCache, LocalFileReader};
use crate::plane::PixelType;

/// A tile stack opened from disk.
pub type TileStack = TiffStack<BlockCache<LocalFileReader>>;

/// What one input stack contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackInfo {
    pub file: String,
    pub depth: usize,
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
}

impl StackInfo {
    pub fn new(file: impl Into<String>, stack: &TileStack) -> Self {
        let (width, height) = stack.dimensions();
        Self {
            file: file.into(),
            depth: stack.page_count(),
            width,
            height,
            pixel_type: stack.pixel_type(),
        }
    }
}

/// Result of a split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    /// Slices in every input stack
    pub depth: usize,
    /// Slices written per tile
    pub slices: usize,
    pub stacks: Vec<StackInfo>,
}

/// Reads tile stacks from a project's input folder.
#[derive(Debug, Clone)]
pub struct Splitter {
    layout: ProjectLayout,
    block_size: usize,
    cache_blocks: usize,
}

impl Splitter {
    pub fn new(layout: ProjectLayout, block_size: usize, cache_blocks: usize) -> Self {
        Self {
            layout,
            block_size,
            cache_blocks,
        }
    }

    /// Open every tile stack and check that their depths agree.
    pub async fn open(&self, tiles: &[String]) -> Result<Vec<TileStack>, PipelineError> {
        if tiles.is_empty() {
            return Err(PipelineError::EmptyTileList);
        }

        let mut stacks: Vec<TileStack> = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let path = self.layout.input_path(tile);
            let reader = open_cached(&path, self.block_size, self.cache_blocks).await?;
            let stack = TiffStack::open(reader).await?;

            if let Some(first) = stacks.first() {
                if stack.page_count() != first.page_count() {
                    return Err(PipelineError::StackDepthMismatch {
                        tile: tile.clone(),
                        expected: first.page_count(),
                        actual: stack.page_count(),
                    });
                }
            }

            debug!(
                tile = %tile,
                depth = stack.page_count(),
                hits = stack.reader().stats().hits,
                misses = stack.reader().stats().misses,
                "Opened tile stack"
            );
            stacks.push(stack);
        }
        Ok(stacks)
    }

    /// Depth, size and pixel type of every stack, failing when they
    /// disagree.
    pub async fn inspect(&self, tiles: &[String]) -> Result<Vec<StackInfo>, PipelineError> {
        let stacks = self.open(tiles).await?;
        let infos: Vec<StackInfo> = tiles
            .iter()
            .zip(&stacks)
            .map(|(tile, stack)| StackInfo::new(tile.as_str(), stack))
            .collect();

        let first = &infos[0];
        for (index, info) in infos.iter().enumerate().skip(1) {
            if (info.width, info.height) != (first.width, first.height) {
                return Err(StitchError::TileSizeMismatch {
                    index,
                    width: first.width,
                    height: first.height,
                    actual_width: info.width,
                    actual_height: info.height,
                }
                .into());
            }
        }
        Ok(infos)
    }

    /// Write slices `1..=min(depth, max_slices)` of every tile to the split
    /// folders.
    pub async fn split(
        &self,
        tiles: &[String],
        max_slices: Option<usize>,
        writer: &TiffWriter,
    ) -> Result<SplitSummary, PipelineError> {
        let stacks = self.open(tiles).await?;
        let depth = stacks[0].page_count();
        let slices = max_slices.map_or(depth, |cap| cap.min(depth));

        for slice in 1..=slices {
            self.layout.ensure_slice_dir(slice).await?;
        }

        for (index, stack) in stacks.iter().enumerate() {
            let tile = index + 1;
            for slice in 1..=slices {
                let plane = stack.read_page(slice - 1).await?;
                writer
                    .write_plane(&self.layout.split_tile_path(slice, tile), &plane)
                    .await?;
            }
            let stats = stack.reader().stats();
            debug!(
                tile,
                slices,
                hits = stats.hits,
                misses = stats.misses,
                "Split tile stack"
            );
        }

        info!(tiles = tiles.len(), depth, slices, "Split tile stacks");

        Ok(SplitSummary {
            depth,
            slices,
            stacks: tiles
                .iter()
                .zip(&stacks)
                .map(|(tile, stack)| StackInfo::new(tile.as_str(), stack))
                .collect(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
