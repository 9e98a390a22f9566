//! TIFF reading and writing for microscopy tile stacks.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. Both are read; output is always classic.
//!
//! - **IFD (Image File Directory)**: One per page. In a tile stack every
//!   full-resolution page is one slice, in chain order.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod stack;
mod tags;
mod validation;
mod values;
mod writer;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use stack::{PageData, PageInfo, TiffStack};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
pub use writer::{imagej_description, TiffWriter};
