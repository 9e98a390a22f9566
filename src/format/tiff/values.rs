//! TIFF tag value reading.
//!
//! Values live either inline in the IFD entry or at an offset in the file.
//! Arrays (strip offsets, byte counts) are fetched in a single read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag values from a TIFF file, respecting its byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw bytes of an entry's value, inline or fetched.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// Read the first value of a Short/Long entry, fetching if needed.
    ///
    /// BitsPerSample and SampleFormat are arrays for multi-sample images;
    /// the first element is enough for grayscale pages.
    pub async fn read_first_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }
        let values = self.read_u64_array(entry).await?;
        values
            .first()
            .map(|&v| v as u32)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "unknown",
                message: "empty value array".to_string(),
            })
    }

    /// Read an array of offsets or counts as u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        match field_type {
            FieldType::Byte | FieldType::Short | FieldType::Long | FieldType::Long8 => {}
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag: "unknown",
                    message: format!("expected an integer array, got {:?}", other),
                })
            }
        }

        let bytes = self.read_bytes(entry).await?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.header.byte_order,
        ))
    }

    /// Read an ASCII value, stripping the NUL terminator.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: "ImageDescription",
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Decode `count` integers of `field_type` from `bytes`.
///
/// Missing trailing bytes yield a shorter array rather than a panic.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| match field_type {
            FieldType::Short => byte_order.read_u16(chunk) as u64,
            FieldType::Long => byte_order.read_u32(chunk) as u64,
            FieldType::Long8 => byte_order.read_u64(chunk),
            _ => chunk[0] as u64,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
