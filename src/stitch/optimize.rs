//! Global optimization of tile positions.
//!
//! Pairwise shifts over-determine the layout of a grid. Positions are solved
//! by least squares over all accepted links, with the lowest-index tile of
//! every connected component pinned at its layout position. While the
//! residuals show an outlier, the worst link is dropped and the system is
//! solved again.

use serde::Serialize;
use tracing::debug;

/// Pivots smaller than this make the normal equations singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Why a link did or did not take part in the final solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Used in the final solve
    Kept,
    /// Correlation below the regression threshold
    BelowThreshold,
    /// Dropped by the outlier loop
    Removed,
}

/// Measured offset of tile `to` relative to tile `from`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileLink {
    pub from: usize,
    pub to: usize,
    pub dx: f64,
    pub dy: f64,
    pub r: f64,
    pub status: LinkStatus,
}

impl TileLink {
    pub fn new(from: usize, to: usize, dx: f64, dy: f64, r: f64) -> Self {
        Self {
            from,
            to,
            dx,
            dy,
            r,
            status: LinkStatus::Kept,
        }
    }

    /// Distance between the measured shift and the one `positions` imply.
    pub fn error(&self, positions: &[(f64, f64)]) -> f64 {
        let (ax, ay) = positions[self.from];
        let (bx, by) = positions[self.to];
        ((bx - ax - self.dx).powi(2) + (by - ay - self.dy).powi(2)).sqrt()
    }
}

/// Thresholds of the optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizeParams {
    /// Links with `r` below this are not used
    pub regression_threshold: f64,
    /// Outlier loop runs while max error / average error exceeds this
    pub max_avg_displacement: f64,
    /// ... and the max error exceeds this many pixels
    pub absolute_displacement: f64,
}

impl Default for OptimizeParams {
    fn default() -> Self {
        Self {
            regression_threshold: 0.30,
            max_avg_displacement: 2.50,
            absolute_displacement: 3.50,
        }
    }
}

/// Solved positions and residuals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Optimization {
    pub positions: Vec<(f64, f64)>,
    pub average_error: f64,
    pub max_error: f64,
    pub removed_links: usize,
}

/// Solve positions for `initial.len()` tiles from `links`, updating each
/// link's status.
pub fn optimize(
    initial: &[(f64, f64)],
    links: &mut [TileLink],
    params: &OptimizeParams,
) -> Optimization {
    for link in links.iter_mut() {
        link.status = if link.r >= params.regression_threshold {
            LinkStatus::Kept
        } else {
            LinkStatus::BelowThreshold
        };
    }

    let mut removed_links = 0;
    loop {
        let positions = solve(initial, links);
        let errors: Vec<(usize, f64)> = links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.status == LinkStatus::Kept)
            .map(|(i, l)| (i, l.error(&positions)))
            .collect();

        let (average_error, max_error, worst) = summarize(&errors);
        let is_outlier = max_error > params.absolute_displacement
            && average_error > 0.0
            && max_error / average_error > params.max_avg_displacement;

        match worst {
            Some(worst) if is_outlier => {
                let link = &mut links[worst];
                debug!(
                    from = link.from,
                    to = link.to,
                    error = max_error,
                    average_error,
                    "Removing inconsistent link"
                );
                link.status = LinkStatus::Removed;
                removed_links += 1;
            }
            _ => {
                return Optimization {
                    positions,
                    average_error,
                    max_error,
                    removed_links,
                }
            }
        }
    }
}

fn summarize(errors: &[(usize, f64)]) -> (f64, f64, Option<usize>) {
    if errors.is_empty() {
        return (0.0, 0.0, None);
    }
    let average = errors.iter().map(|(_, e)| e).sum::<f64>() / errors.len() as f64;
    let (worst, max) = errors
        .iter()
        .copied()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, e)| (Some(i), e))
        .unwrap_or((None, 0.0));
    (average, max, worst)
}

/// Least-squares positions over the kept links.
///
/// Minimizes the sum of squared link residuals with the pinned tiles held
/// fixed. Both axes share one set of normal equations, which is solved
/// directly.
fn solve(initial: &[(f64, f64)], links: &[TileLink]) -> Vec<(f64, f64)> {
    let n = initial.len();
    let kept: Vec<&TileLink> = links
        .iter()
        .filter(|l| l.status == LinkStatus::Kept && l.from < n && l.to < n && l.from != l.to)
        .collect();

    let component = components(n, &kept);
    let mut pinned = vec![false; n];
    let mut seen = vec![false; n];
    for tile in 0..n {
        if !seen[component[tile]] {
            seen[component[tile]] = true;
            pinned[tile] = true;
        }
    }

    let mut unknown: Vec<Option<usize>> = vec![None; n];
    let free: Vec<usize> = (0..n).filter(|&tile| !pinned[tile]).collect();
    for (i, &tile) in free.iter().enumerate() {
        unknown[tile] = Some(i);
    }

    let mut positions = initial.to_vec();
    let m = free.len();
    if m == 0 {
        return positions;
    }

    // Row i: degree * p_i - sum of free neighbours = shifts + pinned neighbours
    let mut matrix = vec![0.0; m * m];
    let mut rhs = vec![(0.0, 0.0); m];
    for link in &kept {
        for (tile, other, sign) in [(link.to, link.from, 1.0), (link.from, link.to, -1.0)] {
            let Some(i) = unknown[tile] else {
                continue;
            };
            matrix[i * m + i] += 1.0;
            rhs[i].0 += sign * link.dx;
            rhs[i].1 += sign * link.dy;
            match unknown[other] {
                Some(j) => matrix[i * m + j] -= 1.0,
                None => {
                    rhs[i].0 += initial[other].0;
                    rhs[i].1 += initial[other].1;
                }
            }
        }
    }

    match solve_dense(matrix, rhs, m) {
        Some(solution) => {
            for (&tile, position) in free.iter().zip(solution) {
                positions[tile] = position;
            }
        }
        None => debug!(tiles = m, "Singular tile graph, keeping layout positions"),
    }
    positions
}

/// Gaussian elimination with partial pivoting on a row-major `m` x `m`
/// matrix, for two right-hand sides at once.
fn solve_dense(
    mut matrix: Vec<f64>,
    mut rhs: Vec<(f64, f64)>,
    m: usize,
) -> Option<Vec<(f64, f64)>> {
    for col in 0..m {
        let pivot = (col..m).max_by(|&a, &b| {
            matrix[a * m + col]
                .abs()
                .total_cmp(&matrix[b * m + col].abs())
        })?;
        if matrix[pivot * m + col].abs() < SINGULAR_EPSILON {
            return None;
        }
        if pivot != col {
            for k in 0..m {
                matrix.swap(col * m + k, pivot * m + k);
            }
            rhs.swap(col, pivot);
        }

        let diagonal = matrix[col * m + col];
        for row in (col + 1)..m {
            let factor = matrix[row * m + col] / diagonal;
            if factor == 0.0 {
                continue;
            }
            for k in col..m {
                let value = factor * matrix[col * m + k];
                matrix[row * m + k] -= value;
            }
            let (cx, cy) = rhs[col];
            rhs[row].0 -= factor * cx;
            rhs[row].1 -= factor * cy;
        }
    }

    let mut solution = vec![(0.0, 0.0); m];
    for row in (0..m).rev() {
        let (mut x, mut y) = rhs[row];
        for k in (row + 1)..m {
            x -= matrix[row * m + k] * solution[k].0;
            y -= matrix[row * m + k] * solution[k].1;
        }
        let diagonal = matrix[row * m + row];
        solution[row] = (x / diagonal, y / diagonal);
    }
    Some(solution)
}

/// Connected component id of each tile, by union-find.
fn components(n: usize, links: &[&TileLink]) -> Vec<usize> {
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut parent: Vec<usize> = (0..n).collect();
    for link in links {
        let (a, b) = (find(&mut parent, link.from), find(&mut parent, link.to));
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }
    (0..n).map(|i| find(&mut parent, i)).collect()
}

// =============================================================================
// Tests
// =============================================================================
