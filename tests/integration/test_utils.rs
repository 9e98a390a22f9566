//! Test utilities for integration tests.
//!
//! This module provides a tracking mock reader, a raw TIFF builder for
//! layouts the writer never produces (big-endian, BigTIFF, tiled,
//! compressed), and a generator for overlapping tile stacks.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use stack_stitcher::error::IoError;
use stack_stitcher::io::RangeReader;
use stack_stitcher::{PixelType, Plane, TiffWriter};

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A mock range reader that tracks all read requests.
///
/// This is useful for verifying cache behavior and request patterns.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }
}

impl Clone for TrackingMockReader {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            identifier: self.identifier.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Raw TIFF Builder
// =============================================================================

/// Byte order type for test TIFF creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const LONG8: u16 = 16;

/// One page of a test TIFF.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub width: u32,
    pub height: u32,
    pub bits: u16,
    /// 1 = unsigned integer, 3 = IEEE float
    pub sample_format: u16,
    pub samples_per_pixel: u16,
    pub compression: u16,
    /// 0 = WhiteIsZero, 1 = BlackIsZero
    pub photometric: u16,
    pub new_subfile_type: u32,
    pub rows_per_strip: Option<u32>,
    pub tile_size: Option<(u32, u32)>,
    pub description: Option<String>,
    /// Row-major sample values
    pub samples: Vec<f64>,
}

impl PageSpec {
    /// A BlackIsZero page of unsigned `bits`-bit samples.
    pub fn gray(width: u32, height: u32, bits: u16, samples: Vec<f64>) -> Self {
        Self {
            width,
            height,
            bits,
            sample_format: 1,
            samples_per_pixel: 1,
            compression: 1,
            photometric: 1,
            new_subfile_type: 0,
            rows_per_strip: None,
            tile_size: None,
            description: None,
            samples,
        }
    }

    /// A gradient page with `value = x + y * width + offset`.
    pub fn gradient(width: u32, height: u32, bits: u16, offset: f64) -> Self {
        let samples = (0..width * height).map(|i| i as f64 + offset).collect();
        Self::gray(width, height, bits, samples)
    }

    pub fn float(mut self) -> Self {
        self.bits = 32;
        self.sample_format = 3;
        self
    }

    pub fn with_strips(mut self, rows_per_strip: u32) -> Self {
        self.rows_per_strip = Some(rows_per_strip);
        self
    }

    pub fn with_tiles(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_size = Some((tile_width, tile_height));
        self
    }
}

/// Builds TIFF files byte by byte.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    bigtiff: bool,
    pages: Vec<PageSpec>,
}

impl TiffBuilder {
    pub fn new(byte_order: ByteOrderType) -> Self {
        Self {
            byte_order,
            bigtiff: false,
            pages: Vec::new(),
        }
    }

    pub fn bigtiff(mut self) -> Self {
        self.bigtiff = true;
        self
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(match self.byte_order {
            ByteOrderType::LittleEndian => b"II",
            ByteOrderType::BigEndian => b"MM",
        });
        let mut next_pointer;
        if self.bigtiff {
            self.put_u16(&mut out, 43);
            self.put_u16(&mut out, 8);
            self.put_u16(&mut out, 0);
            next_pointer = out.len();
            self.put_u64(&mut out, 0);
        } else {
            self.put_u16(&mut out, 42);
            next_pointer = out.len();
            self.put_u32(&mut out, 0);
        }

        for page in &self.pages {
            let chunks = self.encode_chunks(page);
            let mut offsets = Vec::new();
            let mut counts = Vec::new();
            for chunk in &chunks {
                offsets.push(out.len() as u64);
                counts.push(chunk.len() as u64);
                out.extend_from_slice(chunk);
            }
            if out.len() % 2 == 1 {
                out.push(0);
            }

            let entries = self.page_entries(page, &offsets, &counts);
            // External values go before the IFD so their offsets are known
            let mut encoded = Vec::new();
            for (tag, field_type, count, data) in entries {
                let inline = if self.bigtiff { 8 } else { 4 };
                let value = if data.len() <= inline {
                    let mut value = data.clone();
                    value.resize(inline, 0);
                    value
                } else {
                    let offset = out.len() as u64;
                    out.extend_from_slice(&data);
                    if out.len() % 2 == 1 {
                        out.push(0);
                    }
                    let mut value = Vec::new();
                    if self.bigtiff {
                        self.put_u64(&mut value, offset);
                    } else {
                        self.put_u32(&mut value, offset as u32);
                    }
                    value
                };
                encoded.push((tag, field_type, count, value));
            }

            let ifd_offset = out.len() as u64;
            self.patch(&mut out, next_pointer, ifd_offset);

            if self.bigtiff {
                self.put_u64(&mut out, encoded.len() as u64);
            } else {
                self.put_u16(&mut out, encoded.len() as u16);
            }
            for (tag, field_type, count, value) in encoded {
                self.put_u16(&mut out, tag);
                self.put_u16(&mut out, field_type);
                if self.bigtiff {
                    self.put_u64(&mut out, count);
                } else {
                    self.put_u32(&mut out, count as u32);
                }
                out.extend_from_slice(&value);
            }
            next_pointer = out.len();
            if self.bigtiff {
                self.put_u64(&mut out, 0);
            } else {
                self.put_u32(&mut out, 0);
            }
        }

        out
    }

    fn page_entries(
        &self,
        page: &PageSpec,
        offsets: &[u64],
        counts: &[u64],
    ) -> Vec<(u16, u16, u64, Vec<u8>)> {
        let mut entries = Vec::new();
        let short = |v: u16| self.u16_bytes(v);
        let long = |v: u32| self.u32_bytes(v);

        entries.push((254, LONG, 1, long(page.new_subfile_type)));
        entries.push((256, LONG, 1, long(page.width)));
        entries.push((257, LONG, 1, long(page.height)));
        entries.push((258, SHORT, 1, short(page.bits)));
        entries.push((259, SHORT, 1, short(page.compression)));
        entries.push((262, SHORT, 1, short(page.photometric)));
        if let Some(ref text) = page.description {
            let mut bytes = text.as_bytes().to_vec();
            bytes.push(0);
            entries.push((270, ASCII, bytes.len() as u64, bytes));
        }

        let offset_type = if self.bigtiff { LONG8 } else { LONG };
        let array = |values: &[u64]| -> Vec<u8> {
            values
                .iter()
                .flat_map(|&v| {
                    if self.bigtiff {
                        self.u64_bytes(v)
                    } else {
                        self.u32_bytes(v as u32)
                    }
                })
                .collect()
        };

        match page.tile_size {
            None => {
                entries.push((273, offset_type, offsets.len() as u64, array(offsets)));
                entries.push((277, SHORT, 1, short(page.samples_per_pixel)));
                let rows = page.rows_per_strip.unwrap_or(page.height);
                entries.push((278, LONG, 1, long(rows)));
                entries.push((279, offset_type, counts.len() as u64, array(counts)));
            }
            Some((tw, th)) => {
                entries.push((277, SHORT, 1, short(page.samples_per_pixel)));
                entries.push((322, LONG, 1, long(tw)));
                entries.push((323, LONG, 1, long(th)));
                entries.push((324, offset_type, offsets.len() as u64, array(offsets)));
                entries.push((325, offset_type, counts.len() as u64, array(counts)));
            }
        }
        if page.sample_format != 1 {
            entries.push((339, SHORT, 1, short(page.sample_format)));
        }
        entries
    }

    /// Strips or tiles of encoded samples.
    fn encode_chunks(&self, page: &PageSpec) -> Vec<Vec<u8>> {
        let (w, h) = (page.width as usize, page.height as usize);
        let sample = |x: usize, y: usize| page.samples.get(y * w + x).copied().unwrap_or(0.0);

        match page.tile_size {
            None => {
                let rows = page.rows_per_strip.unwrap_or(page.height) as usize;
                (0..h)
                    .step_by(rows.max(1))
                    .map(|y0| {
                        let mut chunk = Vec::new();
                        for y in y0..(y0 + rows).min(h) {
                            for x in 0..w {
                                self.put_sample(&mut chunk, page, sample(x, y));
                            }
                        }
                        chunk
                    })
                    .collect()
            }
            Some((tw, th)) => {
                let (tw, th) = (tw as usize, th as usize);
                let mut chunks = Vec::new();
                for ty in (0..h).step_by(th) {
                    for tx in (0..w).step_by(tw) {
                        let mut chunk = Vec::new();
                        for y in ty..ty + th {
                            for x in tx..tx + tw {
                                let v = if x < w && y < h { sample(x, y) } else { 0.0 };
                                self.put_sample(&mut chunk, page, v);
                            }
                        }
                        chunks.push(chunk);
                    }
                }
                chunks
            }
        }
    }

    fn put_sample(&self, out: &mut Vec<u8>, page: &PageSpec, value: f64) {
        match (page.bits, page.sample_format) {
            (8, _) => out.push(value as u8),
            (16, _) => self.put_u16(out, value as u16),
            (32, 3) => out.extend_from_slice(&self.u32_bytes((value as f32).to_bits())),
            (32, _) => self.put_u32(out, value as u32),
            (bits, _) => panic!("unsupported test sample width {}", bits),
        }
    }

    fn patch(&self, out: &mut [u8], at: usize, value: u64) {
        if self.bigtiff {
            out[at..at + 8].copy_from_slice(&self.u64_bytes(value));
        } else {
            out[at..at + 4].copy_from_slice(&self.u32_bytes(value as u32));
        }
    }

    fn u16_bytes(&self, v: u16) -> Vec<u8> {
        match self.byte_order {
            ByteOrderType::LittleEndian => v.to_le_bytes().to_vec(),
            ByteOrderType::BigEndian => v.to_be_bytes().to_vec(),
        }
    }

    fn u32_bytes(&self, v: u32) -> Vec<u8> {
        match self.byte_order {
            ByteOrderType::LittleEndian => v.to_le_bytes().to_vec(),
            ByteOrderType::BigEndian => v.to_be_bytes().to_vec(),
        }
    }

    fn u64_bytes(&self, v: u64) -> Vec<u8> {
        match self.byte_order {
            ByteOrderType::LittleEndian => v.to_le_bytes().to_vec(),
            ByteOrderType::BigEndian => v.to_be_bytes().to_vec(),
        }
    }

    fn put_u16(&self, out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&self.u16_bytes(v));
    }

    fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&self.u32_bytes(v));
    }

    fn put_u64(&self, out: &mut Vec<u8>, v: u64) {
        out.extend_from_slice(&self.u64_bytes(v));
    }
}

// =============================================================================
// Synthetic Tile Stacks
// =============================================================================

/// Deterministic noise scene, one depth per call with a different seed.
pub fn scene(width: u32, height: u32, seed: u32) -> Plane {
    let mut state = 0x1234_5678_u32 ^ seed.wrapping_mul(0x9e37_79b9);
    let samples = (0..width * height)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 4000) as f32
        })
        .collect();
    Plane::from_samples(width, height, PixelType::U16, samples).unwrap()
}

pub fn crop(plane: &Plane, x: u32, y: u32, width: u32, height: u32) -> Plane {
    let mut out = Plane::new(width, height, plane.pixel_type());
    for row in 0..height {
        for col in 0..width {
            out.put(col, row, plane.get(x + col, y + row));
        }
    }
    out
}

/// A 2x2 column-by-column grid cut from `depth` scenes.
pub struct GridStacks {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Top-left of every tile in the scene, in grid index order
    pub origins: Vec<(u32, u32)>,
    pub scenes: Vec<Plane>,
}

impl GridStacks {
    /// 64x48 tiles with about 20% overlap and a few pixels of jitter.
    pub fn jittered(depth: usize) -> Self {
        let (tile_width, tile_height) = (64, 48);
        let origins = vec![(1, 2), (3, 40), (52, 0), (53, 41)];
        let scenes = (0..depth)
            .map(|z| scene(128, 96, z as u32 + 1))
            .collect();
        Self {
            tile_width,
            tile_height,
            origins,
            scenes,
        }
    }

    /// The stack of tile `index`, one page per depth.
    pub fn tile_stack(&self, index: usize) -> Vec<Plane> {
        let (x, y) = self.origins[index];
        self.scenes
            .iter()
            .map(|scene| crop(scene, x, y, self.tile_width, self.tile_height))
            .collect()
    }

    /// Write `tile1_<n>.tif` for every tile into `input_dir`.
    pub async fn write(&self, input_dir: &Path) -> Vec<String> {
        tokio::fs::create_dir_all(input_dir).await.unwrap();
        let writer = TiffWriter::new();
        let mut names = Vec::new();
        for index in 0..self.origins.len() {
            let name = format!("tile1_{}.tif", index + 1);
            writer
                .write_stack(&input_dir.join(&name), &self.tile_stack(index))
                .await
                .unwrap();
            names.push(name);
        }
        names
    }
}

/// Check if data starts with TIFF magic bytes.
pub fn is_tiff_magic(data: &[u8]) -> bool {
    data.len() >= 4
        && ((data[0] == b'I' && data[1] == b'I' && data[2] == 42 && data[3] == 0)
            || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 42))
}
