//! Image file formats.
//!
//! Tile stacks are read and written as TIFF. See [`tiff::TiffStack`] for
//! reading and [`tiff::TiffWriter`] for writing.

pub mod tiff;

pub use tiff::{TiffStack, TiffWriter};
