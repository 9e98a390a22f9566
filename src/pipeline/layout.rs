//! Project directory tree.
//!
//! ```text
//! <root>/
//! ├── input/                      tile stacks
//! ├── split/
//! │   └── slice_<s>/              tile_<s>_<t>.tif, TileConfiguration*.txt
//! └── stitched/
//!     ├── stitched_image_<s>.tif
//!     └── final_stack/            final_stitched_stack.tif, run_report.json
//! ```

use std::path::{Path, PathBuf};

use crate::error::IoError;

const INPUT_DIR: &str = "input";
const SPLIT_DIR: &str = "split";
const STITCHED_DIR: &str = "stitched";
const FINAL_STACK_DIR: &str = "final_stack";

/// Name of the layout file written next to each slice's tiles.
pub const TILE_CONFIGURATION_FILE: &str = "TileConfiguration.txt";

/// Name of the registered layout file.
pub const REGISTERED_CONFIGURATION_FILE: &str = "TileConfiguration.registered.txt";

pub const FINAL_STACK_FILE: &str = "final_stitched_stack.tif";

pub const RUN_REPORT_FILE: &str = "run_report.json";

/// Paths of a stitching project rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn split_dir(&self) -> PathBuf {
        self.root.join(SPLIT_DIR)
    }

    pub fn stitched_dir(&self) -> PathBuf {
        self.root.join(STITCHED_DIR)
    }

    pub fn final_stack_dir(&self) -> PathBuf {
        self.stitched_dir().join(FINAL_STACK_DIR)
    }

    /// Create the four project directories. Existing ones are left alone.
    pub async fn ensure(&self) -> Result<(), IoError> {
        for dir in [
            self.input_dir(),
            self.split_dir(),
            self.stitched_dir(),
            self.final_stack_dir(),
        ] {
            create_dir(&dir).await?;
        }
        Ok(())
    }

    /// Create the folder of one slice.
    pub async fn ensure_slice_dir(&self, slice: usize) -> Result<PathBuf, IoError> {
        let dir = self.slice_dir(slice);
        create_dir(&dir).await?;
        Ok(dir)
    }

    /// Path of an input tile stack. Absolute names are used as they are.
    pub fn input_path(&self, tile: &str) -> PathBuf {
        self.input_dir().join(tile)
    }

    pub fn slice_dir(&self, slice: usize) -> PathBuf {
        self.split_dir().join(format!("slice_{}", slice))
    }

    /// Split file name for `slice` and `tile`, both 1-based.
    pub fn split_tile_name(slice: usize, tile: usize) -> String {
        format!("tile_{}_{}.tif", slice, tile)
    }

    pub fn split_tile_path(&self, slice: usize, tile: usize) -> PathBuf {
        self.slice_dir(slice).join(Self::split_tile_name(slice, tile))
    }

    pub fn stitched_path(&self, slice: usize) -> PathBuf {
        self.stitched_dir().join(format!("stitched_image_{}.tif", slice))
    }

    pub fn final_stack_path(&self) -> PathBuf {
        self.final_stack_dir().join(FINAL_STACK_FILE)
    }

    pub fn tile_configuration_path(&self, slice: usize) -> PathBuf {
        self.slice_dir(slice).join(TILE_CONFIGURATION_FILE)
    }

    pub fn registered_configuration_path(&self, slice: usize) -> PathBuf {
        self.slice_dir(slice).join(REGISTERED_CONFIGURATION_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.final_stack_dir().join(RUN_REPORT_FILE)
    }
}

async fn create_dir(dir: &Path) -> Result<(), IoError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| IoError::from_std(e, &dir.display().to_string()))
}

// =============================================================================
// Tests
// =============================================================================
