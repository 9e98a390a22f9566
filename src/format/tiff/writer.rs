//! TIFF encoding for split slices, stitched slices and the final stack.
//!
//! Output is little-endian classic TIFF, uncompressed, one strip per page.
//! Pages are laid out as pixel data followed by their IFD:
//!
//! ```text
//! header | pixels 0 | IFD 0 | values 0 | pixels 1 | IFD 1 | values 1 | ...
//! ```
//!
//! The first IFD carries an ImageJ description so stacks open as stacks.

use std::path::Path;

use crate::error::{IoError, TiffError};
use crate::plane::{PixelType, Plane};

use super::tags::{FieldType, TiffTag, PHOTOMETRIC_MIN_IS_BLACK, SAMPLE_FORMAT_IEEE_FP};

/// ImageJ version advertised in the description.
const IMAGEJ_VERSION: &str = "1.54f";

/// ResolutionUnit: no absolute unit.
const RESOLUTION_UNIT_NONE: u16 = 1;

/// ImageJ-compatible ImageDescription for a stack of `images` pages.
pub fn imagej_description(images: usize) -> String {
    if images > 1 {
        format!(
            "ImageJ={}\nimages={}\nslices={}\n",
            IMAGEJ_VERSION, images, images
        )
    } else {
        format!("ImageJ={}\n", IMAGEJ_VERSION)
    }
}

/// Encoder for single planes and multi-page stacks.
#[derive(Debug, Clone)]
pub struct TiffWriter {
    software: Option<String>,
}

impl Default for TiffWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffWriter {
    pub fn new() -> Self {
        Self {
            software: Some(format!("stack-stitcher {}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Set or clear the Software tag.
    pub fn with_software(mut self, software: Option<String>) -> Self {
        self.software = software;
        self
    }

    /// Encode one plane as a single-page file.
    pub fn encode_plane(&self, plane: &Plane) -> Result<Vec<u8>, TiffError> {
        self.encode_stack(std::slice::from_ref(plane))
    }

    /// Encode pages in order as one multi-page file.
    pub fn encode_stack(&self, pages: &[Plane]) -> Result<Vec<u8>, TiffError> {
        if pages.is_empty() {
            return Err(TiffError::NoPages);
        }

        let description = imagej_description(pages.len());
        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        // Position of the pointer that the next IFD offset is patched into
        let mut next_pointer = 4;

        for (index, page) in pages.iter().enumerate() {
            let strip_offset = to_u32(out.len())?;
            let pixels = page.encode_le();
            let strip_len = to_u32(pixels.len())?;
            out.extend_from_slice(&pixels);
            pad_to_word(&mut out);

            let ifd_offset = to_u32(out.len())?;
            out[next_pointer..next_pointer + 4].copy_from_slice(&ifd_offset.to_le_bytes());

            let header_text = (index == 0).then_some(description.as_str());
            let entries = self.page_entries(page, strip_offset, strip_len, header_text);
            next_pointer = write_ifd(&mut out, &entries)?;
        }

        Ok(out)
    }

    /// Encode and write a single plane to `path`.
    pub async fn write_plane(&self, path: &Path, plane: &Plane) -> Result<(), TiffError> {
        let bytes = self.encode_plane(plane)?;
        write_file(path, bytes).await
    }

    /// Encode and write a stack to `path`.
    pub async fn write_stack(&self, path: &Path, pages: &[Plane]) -> Result<(), TiffError> {
        let bytes = self.encode_stack(pages)?;
        write_file(path, bytes).await
    }

    fn page_entries(
        &self,
        page: &Plane,
        strip_offset: u32,
        strip_len: u32,
        description: Option<&str>,
    ) -> Vec<Entry> {
        let pixel_type = page.pixel_type();
        let mut entries = vec![
            Entry::long(TiffTag::NewSubfileType, 0),
            Entry::long(TiffTag::ImageWidth, page.width()),
            Entry::long(TiffTag::ImageLength, page.height()),
            Entry::short(TiffTag::BitsPerSample, pixel_type.bits_per_sample()),
            Entry::short(TiffTag::Compression, 1),
            Entry::short(
                TiffTag::PhotometricInterpretation,
                PHOTOMETRIC_MIN_IS_BLACK as u16,
            ),
        ];
        if let Some(text) = description {
            entries.push(Entry::ascii(TiffTag::ImageDescription, text));
        }
        entries.extend([
            Entry::long(TiffTag::StripOffsets, strip_offset),
            Entry::short(TiffTag::SamplesPerPixel, 1),
            Entry::long(TiffTag::RowsPerStrip, page.height()),
            Entry::long(TiffTag::StripByteCounts, strip_len),
            Entry::rational(TiffTag::XResolution, 1, 1),
            Entry::rational(TiffTag::YResolution, 1, 1),
            Entry::short(TiffTag::ResolutionUnit, RESOLUTION_UNIT_NONE),
        ]);
        if description.is_some() {
            if let Some(software) = &self.software {
                entries.push(Entry::ascii(TiffTag::Software, software));
            }
        }
        if pixel_type == PixelType::F32 {
            entries.push(Entry::short(
                TiffTag::SampleFormat,
                SAMPLE_FORMAT_IEEE_FP as u16,
            ));
        }
        entries
    }
}

// =============================================================================
// IFD encoding
// =============================================================================

struct Entry {
    tag: TiffTag,
    field_type: FieldType,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn short(tag: TiffTag, value: u16) -> Self {
        Self {
            tag,
            field_type: FieldType::Short,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    fn long(tag: TiffTag, value: u32) -> Self {
        Self {
            tag,
            field_type: FieldType::Long,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    fn rational(tag: TiffTag, numerator: u32, denominator: u32) -> Self {
        let mut data = numerator.to_le_bytes().to_vec();
        data.extend_from_slice(&denominator.to_le_bytes());
        Self {
            tag,
            field_type: FieldType::Rational,
            count: 1,
            data,
        }
    }

    fn ascii(tag: TiffTag, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            field_type: FieldType::Ascii,
            count: data.len() as u32,
            data,
        }
    }

    fn is_inline(&self) -> bool {
        self.data.len() <= FieldType::INLINE_THRESHOLD_TIFF
    }
}

/// Append an IFD and its out-of-line values. Returns the position of its
/// next-IFD pointer.
fn write_ifd(out: &mut Vec<u8>, entries: &[Entry]) -> Result<usize, TiffError> {
    let ifd_start = out.len();
    let ifd_len = 2 + entries.len() * 12 + 4;
    let mut external_offset = ifd_start + ifd_len;
    let mut external = Vec::new();

    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&entry.tag.as_u16().to_le_bytes());
        out.extend_from_slice(&entry.field_type.as_u16().to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        if entry.is_inline() {
            let mut value = [0u8; 4];
            value[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&value);
        } else {
            out.extend_from_slice(&to_u32(external_offset)?.to_le_bytes());
            external.extend_from_slice(&entry.data);
            pad_to_word(&mut external);
            external_offset = ifd_start + ifd_len + external.len();
        }
    }

    let next_pointer = out.len();
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&external);
    Ok(next_pointer)
}

fn pad_to_word(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.push(0);
    }
}

fn to_u32(value: usize) -> Result<u32, TiffError> {
    u32::try_from(value).map_err(|_| TiffError::InvalidTagValue {
        tag: "StripOffsets",
        message: "output exceeds the 4 GiB limit of classic TIFF".to_string(),
    })
}

async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), TiffError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| IoError::from_std(e, &path.display().to_string()).into())
}

// =============================================================================
// Tests
// =============================================================================
