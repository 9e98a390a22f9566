//! Grid stitching.
//!
//! This module turns a grid of overlapping tiles into one composite image.
//!
//! # Stages
//!
//! 1. [`layout`]: initial tile positions from the grid and nominal overlap
//! 2. [`phase_correlation`]: shift and correlation between neighbouring tiles
//! 3. [`optimize`]: globally consistent positions, dropping bad links
//! 4. [`fusion`]: blending of the placed tiles
//!
//! [`GridStitcher`] runs all four for one slice.

pub mod fusion;
pub mod layout;
pub mod optimize;
pub mod phase_correlation;
mod stitcher;

pub use fusion::{fuse, FusionMethod};
pub use layout::{GridLayout, GridOrder, GridType, TileConfiguration, TileEntry, TilePlacement};
pub use optimize::{LinkStatus, OptimizeParams, TileLink};
pub use phase_correlation::{PairShift, PhaseCorrelator};
pub use stitcher::{GridStitcher, StitchParams, StitchResult, StitchSummary, DEFAULT_CHECK_PEAKS};
