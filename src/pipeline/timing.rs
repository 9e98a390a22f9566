//! Wall-clock timing of a run and its console summary.

use std::time::Duration;

use serde::Serialize;

/// Wall-clock time of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTimings {
    /// Whole run, from directory creation to the final stack on disk
    pub total: Duration,
    pub slices: usize,
    /// Time spent stitching and saving each slice
    pub per_slice: Vec<Duration>,
}

impl RunTimings {
    pub fn new(total: Duration, slices: usize) -> Self {
        Self {
            total,
            slices,
            per_slice: Vec::new(),
        }
    }

    /// Total time divided by the slice count; zero when nothing ran.
    pub fn average(&self) -> Duration {
        match u32::try_from(self.slices) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.slices as f64),
        }
    }

    /// The two lines printed at the end of a run.
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!("Total time taken: {:.2} seconds", self.total.as_secs_f64()),
            format!(
                "Average time per slice: {:.2} seconds",
                self.average().as_secs_f64()
            ),
        ]
    }
}
