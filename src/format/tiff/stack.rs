//! Multi-page TIFF stacks.
//!
//! A tile stack is a chain of IFDs where every full-resolution IFD is one
//! slice. ImageJ writes them as a flat chain of uncompressed strip pages;
//! reduced-resolution previews (NewSubfileType bit 0) are skipped.
//!
//! Opening a stack parses and validates every page up front. Pixel data is
//! only read when a page is decoded with [`TiffStack::read_page`].

use std::collections::HashSet;

use bytes::BytesMut;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::plane::{PixelType, Plane};

use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{TiffTag, SAMPLE_FORMAT_UINT};
use super::validation::{
    check_compression, check_consistent, check_data_tags, check_photometric,
    check_samples_per_pixel, is_reduced_resolution, pixel_type_for,
};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs followed in one file
const MAX_IFDS: usize = 65_536;

/// BitsPerSample when the tag is absent
const DEFAULT_BITS_PER_SAMPLE: u32 = 1;

// =============================================================================
// PageInfo
// =============================================================================

/// Where a page's pixel data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageData {
    Strips {
        rows_per_strip: u32,
        offsets: Vec<u64>,
        byte_counts: Vec<u64>,
    },
    Tiles {
        tile_width: u32,
        tile_height: u32,
        offsets: Vec<u64>,
        byte_counts: Vec<u64>,
    },
}

/// A validated page of a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// Position of the IFD in the file's chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,

    /// Samples are stored inverted (PhotometricInterpretation 0)
    pub min_is_white: bool,

    pub data: PageData,
}

impl PageInfo {
    /// Uncompressed size of the page's pixels.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_type.bytes_per_sample()
    }
}

// =============================================================================
// TiffStack
// =============================================================================

/// An opened tile stack.
pub struct TiffStack<R> {
    reader: R,
    header: TiffHeader,
    pages: Vec<PageInfo>,
    description: Option<String>,
}

impl<R: RangeReader> TiffStack<R> {
    /// Parse the header and every IFD, validating each page.
    pub async fn open(reader: R) -> Result<Self, TiffError> {
        let size = reader.size();
        let header_len = BIGTIFF_HEADER_SIZE.min(size as usize);
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, size)?;

        let ifds = read_ifd_chain(&reader, &header).await?;
        let byte_order = header.byte_order;

        let mut pages: Vec<PageInfo> = Vec::with_capacity(ifds.len());
        let mut description = None;
        {
            let values = ValueReader::new(&reader, &header);
            for (ifd_index, ifd) in ifds.iter().enumerate() {
                if is_reduced_resolution(ifd, byte_order) {
                    debug!(
                        identifier = reader.identifier(),
                        ifd_index, "Skipping reduced-resolution page"
                    );
                    continue;
                }

                let page = read_page_info(&values, ifd, ifd_index).await?;
                if let Some(first) = pages.first() {
                    check_consistent(
                        pages.len(),
                        (page.width, page.height),
                        page.pixel_type,
                        (first.width, first.height),
                        first.pixel_type,
                    )?;
                }

                if description.is_none() {
                    if let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) {
                        description = values.read_string(entry).await.ok();
                    }
                }

                pages.push(page);
            }
        }

        if pages.is_empty() {
            return Err(TiffError::NoPages);
        }

        debug!(
            identifier = reader.identifier(),
            pages = pages.len(),
            width = pages[0].width,
            height = pages[0].height,
            pixel_type = pages[0].pixel_type.name(),
            "Opened TIFF stack"
        );

        Ok(Self {
            reader,
            header,
            pages,
            description,
        })
    }

    /// Number of slices.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Dimensions shared by every page.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.pages[0].width, self.pages[0].height)
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pages[0].pixel_type
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// ImageDescription of the first page, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Decode page `index` (0-based).
    pub async fn read_page(&self, index: usize) -> Result<Plane, TiffError> {
        let page = self.pages.get(index).ok_or(TiffError::PageOutOfRange {
            page: index,
            count: self.pages.len(),
        })?;

        let bytes = match &page.data {
            PageData::Strips {
                rows_per_strip,
                offsets,
                byte_counts,
            } => {
                self.read_strips(page, *rows_per_strip, offsets, byte_counts)
                    .await?
            }
            PageData::Tiles {
                tile_width,
                tile_height,
                offsets,
                byte_counts,
            } => {
                self.read_tiles(page, (*tile_width, *tile_height), offsets, byte_counts)
                    .await?
            }
        };

        Plane::decode(
            page.width,
            page.height,
            page.pixel_type,
            &bytes,
            self.header.byte_order,
            page.min_is_white,
        )
    }

    async fn read_strips(
        &self,
        page: &PageInfo,
        rows_per_strip: u32,
        offsets: &[u64],
        byte_counts: &[u64],
    ) -> Result<Vec<u8>, TiffError> {
        let total = page.byte_len();
        let row_bytes = page.width as usize * page.pixel_type.bytes_per_sample();

        // ImageJ writes strips back to back; one read covers them all.
        if is_contiguous(offsets, byte_counts) {
            let available: u64 = byte_counts.iter().sum();
            let len = (available as usize).min(total);
            return Ok(self.reader.read_exact_at(offsets[0], len).await?.to_vec());
        }

        let mut out = BytesMut::with_capacity(total);
        let mut rows_left = page.height as usize;
        for (&offset, &count) in offsets.iter().zip(byte_counts) {
            if rows_left == 0 {
                break;
            }
            let rows = rows_left.min(rows_per_strip as usize);
            let len = (rows * row_bytes).min(count as usize);
            out.extend_from_slice(&self.reader.read_exact_at(offset, len).await?);
            rows_left -= rows;
        }
        Ok(out.to_vec())
    }

    async fn read_tiles(
        &self,
        page: &PageInfo,
        (tile_width, tile_height): (u32, u32),
        offsets: &[u64],
        byte_counts: &[u64],
    ) -> Result<Vec<u8>, TiffError> {
        let bps = page.pixel_type.bytes_per_sample();
        let width = page.width as usize;
        let height = page.height as usize;
        let (tw, th) = (tile_width as usize, tile_height as usize);
        let tiles_across = width.div_ceil(tw);
        let tile_row_bytes = tw * bps;

        let mut out = vec![0u8; page.byte_len()];
        for (tile_index, (&offset, &count)) in offsets.iter().zip(byte_counts).enumerate() {
            let x0 = (tile_index % tiles_across) * tw;
            let y0 = (tile_index / tiles_across) * th;
            if y0 >= height {
                break;
            }

            let len = (tile_row_bytes * th).min(count as usize);
            let tile = self.reader.read_exact_at(offset, len).await?;
            let cols = tw.min(width - x0);

            for row in 0..th.min(height - y0) {
                let src = row * tile_row_bytes;
                let src_end = src + cols * bps;
                if src_end > tile.len() {
                    return Err(TiffError::InvalidTagValue {
                        tag: "TileByteCounts",
                        message: format!("tile {} is truncated", tile_index),
                    });
                }
                let dst = ((y0 + row) * width + x0) * bps;
                out[dst..dst + cols * bps].copy_from_slice(&tile[src..src_end]);
            }
        }
        Ok(out)
    }
}

// =============================================================================
// IFD chain
// =============================================================================

/// Follow the next-IFD chain from the header.
///
/// Offsets are checked against the file size and cycles end the walk.
async fn read_ifd_chain<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;
    let size = reader.size();

    while offset != 0 && ifds.len() < MAX_IFDS {
        if offset >= size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        if !visited.insert(offset) {
            debug!(
                identifier = reader.identifier(),
                offset, "IFD chain loops back, stopping"
            );
            break;
        }

        let count_size = header.ifd_count_size();
        let count_bytes = reader.read_exact_at(offset, count_size).await?;
        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(&count_bytes)
        } else {
            header.byte_order.read_u16(&count_bytes) as u64
        };

        let ifd_size = Ifd::calculate_size(entry_count, header);
        let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
        let ifd = Ifd::parse(&ifd_bytes, header)?;

        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}

async fn read_page_info<R: RangeReader>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    ifd_index: usize,
) -> Result<PageInfo, TiffError> {
    let byte_order = values.byte_order();

    check_compression(ifd, byte_order)?;
    check_samples_per_pixel(ifd, byte_order)?;
    check_data_tags(ifd)?;
    let min_is_white = check_photometric(ifd, byte_order)?;

    let width = ifd
        .image_width(byte_order)
        .ok_or(TiffError::MissingTag("ImageWidth"))?;
    let height = ifd
        .image_height(byte_order)
        .ok_or(TiffError::MissingTag("ImageLength"))?;
    if width == 0 || height == 0 {
        return Err(TiffError::InvalidTagValue {
            tag: "ImageWidth",
            message: format!("page {} has zero size {}x{}", ifd_index, width, height),
        });
    }

    let bits = match ifd.get_entry_by_tag(TiffTag::BitsPerSample) {
        Some(entry) => values.read_first_u32(entry).await?,
        None => DEFAULT_BITS_PER_SAMPLE,
    };
    let sample_format = match ifd.get_entry_by_tag(TiffTag::SampleFormat) {
        Some(entry) => values.read_first_u32(entry).await?,
        None => SAMPLE_FORMAT_UINT,
    };
    let pixel_type = pixel_type_for(bits, sample_format)?;

    let data = if ifd.is_tiled() {
        read_tile_layout(values, ifd, byte_order, width, height).await?
    } else {
        read_strip_layout(values, ifd, byte_order, height).await?
    };

    Ok(PageInfo {
        ifd_index,
        width,
        height,
        pixel_type,
        min_is_white,
        data,
    })
}

async fn read_strip_layout<R: RangeReader>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    byte_order: ByteOrder,
    height: u32,
) -> Result<PageData, TiffError> {
    let rows_per_strip = ifd
        .get_u32(TiffTag::RowsPerStrip, byte_order)
        .unwrap_or(height)
        .clamp(1, height);

    let offsets = read_array(values, ifd, TiffTag::StripOffsets, "StripOffsets").await?;
    let byte_counts = read_array(values, ifd, TiffTag::StripByteCounts, "StripByteCounts").await?;

    let expected = height.div_ceil(rows_per_strip) as usize;
    check_array_lengths("StripOffsets", expected, &offsets, &byte_counts)?;

    Ok(PageData::Strips {
        rows_per_strip,
        offsets,
        byte_counts,
    })
}

async fn read_tile_layout<R: RangeReader>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    byte_order: ByteOrder,
    width: u32,
    height: u32,
) -> Result<PageData, TiffError> {
    let tile_width = ifd
        .get_u32(TiffTag::TileWidth, byte_order)
        .ok_or(TiffError::MissingTag("TileWidth"))?;
    let tile_height = ifd
        .get_u32(TiffTag::TileLength, byte_order)
        .ok_or(TiffError::MissingTag("TileLength"))?;
    if tile_width == 0 || tile_height == 0 {
        return Err(TiffError::InvalidTagValue {
            tag: "TileWidth",
            message: "tile dimensions cannot be zero".to_string(),
        });
    }

    let offsets = read_array(values, ifd, TiffTag::TileOffsets, "TileOffsets").await?;
    let byte_counts = read_array(values, ifd, TiffTag::TileByteCounts, "TileByteCounts").await?;

    let expected = (width.div_ceil(tile_width) * height.div_ceil(tile_height)) as usize;
    check_array_lengths("TileOffsets", expected, &offsets, &byte_counts)?;

    Ok(PageData::Tiles {
        tile_width,
        tile_height,
        offsets,
        byte_counts,
    })
}

async fn read_array<R: RangeReader>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    tag: TiffTag,
    name: &'static str,
) -> Result<Vec<u64>, TiffError> {
    let entry = ifd.get_entry_by_tag(tag).ok_or(TiffError::MissingTag(name))?;
    values.read_u64_array(entry).await
}

fn check_array_lengths(
    tag: &'static str,
    expected: usize,
    offsets: &[u64],
    byte_counts: &[u64],
) -> Result<(), TiffError> {
    if offsets.len() < expected || byte_counts.len() < expected {
        return Err(TiffError::InvalidTagValue {
            tag,
            message: format!(
                "expected {} entries, found {} offsets and {} byte counts",
                expected,
                offsets.len(),
                byte_counts.len()
            ),
        });
    }
    Ok(())
}

fn is_contiguous(offsets: &[u64], byte_counts: &[u64]) -> bool {
    !offsets.is_empty()
        && offsets
            .windows(2)
            .zip(byte_counts)
            .all(|(pair, &count)| pair[0] + count == pair[1])
}

// =============================================================================
// Tests
// =============================================================================
