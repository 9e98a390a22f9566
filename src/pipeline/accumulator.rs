//! Gathering stitched slices into the final stack.

use crate::plane::Plane;

/// Stitched slices collected in order for the final stack.
///
/// Registration can make consecutive composites differ by a few pixels, so
/// [`finish`](Self::finish) pads every slice to the largest width and height.
#[derive(Debug, Default)]
pub struct StackAccumulator {
    slices: Vec<Plane>,
}

impl StackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slice: Plane) {
        self.slices.push(slice);
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Largest width and height among the slices.
    pub fn dimensions(&self) -> (u32, u32) {
        self.slices.iter().fold((0, 0), |(w, h), slice| {
            (w.max(slice.width()), h.max(slice.height()))
        })
    }

    /// The slices, each padded to [`dimensions`](Self::dimensions).
    pub fn finish(self) -> Vec<Plane> {
        let (width, height) = self.dimensions();
        self.slices
            .into_iter()
            .map(|slice| {
                if slice.dimensions() == (width, height) {
                    slice
                } else {
                    slice.pad_to(width, height)
                }
            })
            .collect()
    }
}
