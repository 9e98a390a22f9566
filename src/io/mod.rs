//! I/O layer: positional readers over tile stack files.
//!
//! The TIFF parser only ever asks for byte ranges. [`LocalFileReader`] serves
//! those from disk and [`BlockCache`] coalesces the many small IFD reads into
//! a handful of block-sized ones.

mod block_cache;
mod local_reader;
mod range_reader;

pub use block_cache::{BlockCache, CacheStats, DEFAULT_BLOCK_SIZE};
pub use local_reader::{open_cached, LocalFileReader};
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, MemoryReader,
    RangeReader,
};
