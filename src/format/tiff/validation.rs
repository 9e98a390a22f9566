//! Page validation for grayscale stacks.
//!
//! Tile stacks are rejected early with a clear error when a page cannot be
//! decoded into a [`Plane`](crate::plane::Plane).
//!
//! # Supported Subset
//!
//! - **Compression**: none
//! - **Samples**: one per pixel, 8/16-bit unsigned or 32-bit IEEE float
//! - **Photometric**: MinIsBlack or MinIsWhite
//! - **Organization**: strips or tiles
//! - **Stack**: every page has the dimensions and pixel type of page 0

use crate::error::TiffError;
use crate::plane::PixelType;

use super::parser::{ByteOrder, Ifd};
use super::tags::{
    Compression, TiffTag, PHOTOMETRIC_MIN_IS_BLACK, PHOTOMETRIC_MIN_IS_WHITE, SAMPLE_FORMAT_IEEE_FP,
    SAMPLE_FORMAT_UINT,
};

/// NewSubfileType bit marking a reduced-resolution copy of another page.
const SUBFILE_REDUCED_RESOLUTION: u32 = 0x1;

/// Check that a page is stored uncompressed.
///
/// A missing Compression tag means uncompressed.
pub fn check_compression(ifd: &Ifd, byte_order: ByteOrder) -> Result<(), TiffError> {
    let Some(value) = ifd.compression(byte_order) else {
        return Ok(());
    };
    match Compression::from_u16(value) {
        Some(compression) if compression.is_supported() => Ok(()),
        Some(compression) => Err(TiffError::UnsupportedCompression(
            compression.name().to_string(),
        )),
        None => Err(TiffError::UnsupportedCompression(format!(
            "Unknown ({})",
            value
        ))),
    }
}

/// Check that a page carries a single sample per pixel.
pub fn check_samples_per_pixel(ifd: &Ifd, byte_order: ByteOrder) -> Result<(), TiffError> {
    match ifd.get_u32(TiffTag::SamplesPerPixel, byte_order).unwrap_or(1) {
        1 => Ok(()),
        n => Err(TiffError::UnsupportedPixelFormat(format!(
            "{} samples per pixel, only grayscale is supported",
            n
        ))),
    }
}

/// Whether the page stores 0 as white. Palette and color pages are rejected.
pub fn check_photometric(ifd: &Ifd, byte_order: ByteOrder) -> Result<bool, TiffError> {
    match ifd
        .get_u32(TiffTag::PhotometricInterpretation, byte_order)
        .unwrap_or(PHOTOMETRIC_MIN_IS_BLACK)
    {
        PHOTOMETRIC_MIN_IS_BLACK => Ok(false),
        PHOTOMETRIC_MIN_IS_WHITE => Ok(true),
        other => Err(TiffError::UnsupportedPixelFormat(format!(
            "photometric interpretation {}",
            other
        ))),
    }
}

/// Map BitsPerSample and SampleFormat to a pixel type.
pub fn pixel_type_for(bits_per_sample: u32, sample_format: u32) -> Result<PixelType, TiffError> {
    match (bits_per_sample, sample_format) {
        (8, SAMPLE_FORMAT_UINT) => Ok(PixelType::U8),
        (16, SAMPLE_FORMAT_UINT) => Ok(PixelType::U16),
        (32, SAMPLE_FORMAT_IEEE_FP) => Ok(PixelType::F32),
        (bits, format) => Err(TiffError::UnsupportedPixelFormat(format!(
            "{}-bit samples with sample format {}",
            bits, format
        ))),
    }
}

/// Whether the page is a reduced-resolution preview rather than a slice.
pub fn is_reduced_resolution(ifd: &Ifd, byte_order: ByteOrder) -> bool {
    ifd.get_u32(TiffTag::NewSubfileType, byte_order)
        .map(|v| v & SUBFILE_REDUCED_RESOLUTION != 0)
        .unwrap_or(false)
}

/// Check that a page either has strip tags or tile tags.
pub fn check_data_tags(ifd: &Ifd) -> Result<(), TiffError> {
    if ifd.is_tiled() {
        for (tag, name) in [
            (TiffTag::TileWidth, "TileWidth"),
            (TiffTag::TileLength, "TileLength"),
            (TiffTag::TileByteCounts, "TileByteCounts"),
        ] {
            if ifd.get_entry_by_tag(tag).is_none() {
                return Err(TiffError::MissingTag(name));
            }
        }
        return Ok(());
    }

    if ifd.get_entry_by_tag(TiffTag::StripOffsets).is_none() {
        return Err(TiffError::MissingTag("StripOffsets"));
    }
    if ifd.get_entry_by_tag(TiffTag::StripByteCounts).is_none() {
        return Err(TiffError::MissingTag("StripByteCounts"));
    }
    Ok(())
}

/// Check that page `index` matches the first page of its stack.
pub fn check_consistent(
    index: usize,
    dimensions: (u32, u32),
    pixel_type: PixelType,
    first_dimensions: (u32, u32),
    first_pixel_type: PixelType,
) -> Result<(), TiffError> {
    if dimensions != first_dimensions {
        return Err(TiffError::InvalidTagValue {
            tag: "ImageWidth",
            message: format!(
                "page {} is {}x{}, page 0 is {}x{}",
                index, dimensions.0, dimensions.1, first_dimensions.0, first_dimensions.1
            ),
        });
    }
    if pixel_type != first_pixel_type {
        return Err(TiffError::UnsupportedPixelFormat(format!(
            "page {} is {}, page 0 is {}",
            index,
            pixel_type.name(),
            first_pixel_type.name()
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
