//! Grid layouts and tile configuration files.
//!
//! A grid layout maps a tile's index in the input list to its (column, row)
//! cell and from there to an initial pixel offset, given the tile size and
//! the nominal overlap between neighbours.
//!
//! # Tile configuration format
//!
//! ```text
//! # Define the number of dimensions we are working on
//! dim = 2
//!
//! # Define the image coordinates
//! tile_1_1.tif; ; (0.0, 0.0)
//! tile_1_2.tif; ; (0.0, 90.0)
//! ```

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;

use crate::error::StitchError;

// =============================================================================
// Grid type and order
// =============================================================================

/// How tile indices advance through the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GridType {
    /// Fill a row, then move to the next row
    RowByRow,
    /// Fill a column, then move to the next column
    ColumnByColumn,
    /// Rows, alternating direction every row
    SnakeByRows,
    /// Columns, alternating direction every column
    SnakeByColumns,
}

/// Direction in which rows and columns are filled.
///
/// The two words name the horizontal and vertical direction; which one is
/// filled first comes from the [`GridType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GridOrder {
    RightDown,
    LeftDown,
    RightUp,
    LeftUp,
    DownRight,
    DownLeft,
    UpRight,
    UpLeft,
}

impl GridOrder {
    fn leftward(self) -> bool {
        matches!(
            self,
            GridOrder::LeftDown | GridOrder::LeftUp | GridOrder::DownLeft | GridOrder::UpLeft
        )
    }

    fn upward(self) -> bool {
        matches!(
            self,
            GridOrder::RightUp | GridOrder::LeftUp | GridOrder::UpRight | GridOrder::UpLeft
        )
    }
}

// =============================================================================
// GridLayout
// =============================================================================

/// Initial placement of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TilePlacement {
    pub index: usize,
    pub column: u32,
    pub row: u32,
    pub x: f64,
    pub y: f64,
}

/// A `columns` x `rows` grid of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub grid_type: GridType,
    pub order: GridOrder,
}

impl GridLayout {
    pub fn new(
        columns: u32,
        rows: u32,
        grid_type: GridType,
        order: GridOrder,
    ) -> Result<Self, StitchError> {
        if columns == 0 || rows == 0 {
            return Err(StitchError::InvalidGrid(format!(
                "{}x{} grid has no cells",
                columns, rows
            )));
        }
        Ok(Self {
            columns,
            rows,
            grid_type,
            order,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Grid cell (column, row) of the tile at `index`.
    pub fn cell(&self, index: usize) -> (u32, u32) {
        let n = index as u32;
        let (cols, rows) = (self.columns, self.rows);
        let (mut column, mut row) = match self.grid_type {
            GridType::RowByRow => (n % cols, n / cols),
            GridType::ColumnByColumn => (n / rows, n % rows),
            GridType::SnakeByRows => {
                let row = n / cols;
                let column = if row % 2 == 1 {
                    cols - 1 - n % cols
                } else {
                    n % cols
                };
                (column, row)
            }
            GridType::SnakeByColumns => {
                let column = n / rows;
                let row = if column % 2 == 1 {
                    rows - 1 - n % rows
                } else {
                    n % rows
                };
                (column, row)
            }
        };
        if self.order.leftward() {
            column = cols - 1 - column;
        }
        if self.order.upward() {
            row = rows - 1 - row;
        }
        (column, row)
    }

    /// Initial offsets of every tile for tiles of `tile_width` x
    /// `tile_height` overlapping by `overlap_percent`.
    pub fn positions(
        &self,
        tile_width: u32,
        tile_height: u32,
        overlap_percent: f64,
    ) -> Result<Vec<TilePlacement>, StitchError> {
        if !(0.0..100.0).contains(&overlap_percent) {
            return Err(StitchError::InvalidOverlap(overlap_percent));
        }
        let step = 1.0 - overlap_percent / 100.0;
        let step_x = tile_width as f64 * step;
        let step_y = tile_height as f64 * step;

        Ok((0..self.tile_count())
            .map(|index| {
                let (column, row) = self.cell(index);
                TilePlacement {
                    index,
                    column,
                    row,
                    x: column as f64 * step_x,
                    y: row as f64 * step_y,
                }
            })
            .collect())
    }

    /// Pairs of tile indices that are horizontal or vertical neighbours.
    pub fn neighbour_pairs(&self) -> Vec<(usize, usize)> {
        let cells: Vec<(u32, u32)> = (0..self.tile_count()).map(|i| self.cell(i)).collect();
        let mut pairs = Vec::new();
        for i in 0..cells.len() {
            for j in (i + 1)..cells.len() {
                let (ci, ri) = cells[i];
                let (cj, rj) = cells[j];
                if ci.abs_diff(cj) + ri.abs_diff(rj) == 1 {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

// =============================================================================
// TileConfiguration
// =============================================================================

/// One line of a tile configuration file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileEntry {
    pub file: String,
    pub x: f64,
    pub y: f64,
}

/// Tile file names and their offsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TileConfiguration {
    pub entries: Vec<TileEntry>,
}

impl TileConfiguration {
    pub fn new(entries: Vec<TileEntry>) -> Self {
        Self { entries }
    }

    /// Pair file names with positions, in order.
    pub fn from_positions<S: AsRef<str>>(files: &[S], positions: &[(f64, f64)]) -> Self {
        Self {
            entries: files
                .iter()
                .zip(positions)
                .map(|(file, &(x, y))| TileEntry {
                    file: file.as_ref().to_string(),
                    x,
                    y,
                })
                .collect(),
        }
    }

    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.entries.iter().map(|e| (e.x, e.y)).collect()
    }

    pub fn to_text(&self) -> String {
        let mut text = String::from(
            "# Define the number of dimensions we are working on\ndim = 2\n\n# Define the image coordinates\n",
        );
        for entry in &self.entries {
            let _ = writeln!(text, "{}; ; ({:.1}, {:.1})", entry.file, entry.x, entry.y);
        }
        text
    }
}

impl FromStr for TileConfiguration {
    type Err = StitchError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut entries = Vec::new();
        let mut saw_dim = false;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(dim) = line.strip_prefix("dim").filter(|_| !line.contains(';')) {
                let dim = dim.trim_start().trim_start_matches('=').trim();
                if dim != "2" {
                    return Err(StitchError::Layout(format!(
                        "line {}: only dim = 2 is supported, found '{}'",
                        line_no + 1,
                        dim
                    )));
                }
                saw_dim = true;
                continue;
            }

            let mut fields = line.splitn(3, ';');
            let file = fields.next().unwrap_or_default().trim();
            let coords = fields.nth(1).map(str::trim).ok_or_else(|| {
                StitchError::Layout(format!("line {}: expected 'file; ; (x, y)'", line_no + 1))
            })?;
            let (x, y) = parse_point(coords).ok_or_else(|| {
                StitchError::Layout(format!(
                    "line {}: invalid coordinates '{}'",
                    line_no + 1,
                    coords
                ))
            })?;

            entries.push(TileEntry {
                file: file.to_string(),
                x,
                y,
            });
        }

        if !saw_dim {
            return Err(StitchError::Layout("missing 'dim = 2' line".to_string()));
        }
        Ok(Self { entries })
    }
}

fn parse_point(text: &str) -> Option<(f64, f64)> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = inner.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

// =============================================================================
// Tests
// =============================================================================
