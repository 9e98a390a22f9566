//! # stack-stitcher
//!
//! Split multi-tile microscopy TIFF stacks into slices, stitch every slice
//! of the tile grid into one composite, and reassemble the composites into
//! a final 3D stack.
//!
//! ## Features
//!
//! - **Native TIFF**: Classic and BigTIFF stacks in either byte order, 8/16-bit and float pages
//! - **Grid registration**: Phase correlation between neighbours with global optimization
//! - **Fusion**: Linear blending, average, max, min or overwrite
//! - **ImageJ-compatible output**: Per-slice images and a final multi-page stack
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Positional file readers and block caching
//! - [`mod@format`] - TIFF parsing and writing
//! - [`plane`] - Grayscale image planes
//! - [`stitch`] - Layout, registration, optimization and fusion
//! - [`pipeline`] - Project layout and the end-to-end run
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use stack_stitcher::{
//!     GridLayout, GridOrder, GridType, Pipeline, PipelineOptions, ProjectLayout, StitchParams,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = GridLayout::new(2, 2, GridType::ColumnByColumn, GridOrder::DownRight)?;
//!     let tiles = ["tile1_1.tif", "tile1_2.tif", "tile1_3.tif", "tile1_4.tif"]
//!         .map(String::from)
//!         .to_vec();
//!
//!     let options = PipelineOptions::new(ProjectLayout::new("/data/stitching"), tiles, StitchParams::new(grid));
//!     let report = Pipeline::new(options).run().await?;
//!     for line in report.timings.summary_lines() {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod plane;
pub mod stitch;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, RunConfig, SplitConfig};
pub use error::{IoError, PipelineError, StitchError, TiffError};
pub use format::tiff::{
    imagej_description, ByteOrder, Compression, FieldType, Ifd, IfdEntry, PageData, PageInfo,
    TiffHeader, TiffStack, TiffTag, TiffWriter, ValueReader, BIGTIFF_HEADER_SIZE,
    TIFF_HEADER_SIZE,
};
pub use io::{open_cached, BlockCache, LocalFileReader, MemoryReader, RangeReader};
pub use pipeline::{
    Pipeline, PipelineOptions, ProjectLayout, RunReport, RunTimings, SplitSummary, Splitter,
    StackAccumulator, StackInfo,
};
pub use plane::{PixelType, Plane};
pub use stitch::{
    FusionMethod, GridLayout, GridOrder, GridStitcher, GridType, OptimizeParams, StitchParams,
    StitchResult, TileConfiguration, TileLink,
};
