//! The split/stitch/assemble workflow.
//!
//! - [`ProjectLayout`] - directory tree and file names of a project
//! - [`Splitter`] - per-slice files from tile stacks
//! - [`StackAccumulator`] - stitched slices gathered into the final stack
//! - [`RunTimings`] - wall-clock summary
//! - [`Pipeline`] - the whole run

mod accumulator;
mod layout;
mod runner;
mod splitter;
mod timing;

pub use accumulator::StackAccumulator;
pub use layout::{
    ProjectLayout, FINAL_STACK_FILE, REGISTERED_CONFIGURATION_FILE, RUN_REPORT_FILE,
    TILE_CONFIGURATION_FILE,
};
pub use runner::{Pipeline, PipelineOptions, RunReport, SliceReport, DEFAULT_CACHE_BLOCKS};
pub use splitter::{SplitSummary, Splitter, StackInfo, TileStack};
pub use timing::RunTimings;
