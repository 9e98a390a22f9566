//! Grayscale image planes.
//!
//! Every slice, tile and stitched composite is held as an `f32` buffer. The
//! source [`PixelType`] travels with it so outputs are written back at the
//! bit depth they were read at.

use image::{ImageBuffer, Luma};
use serde::Serialize;

use crate::error::TiffError;
use crate::format::tiff::ByteOrder;

/// Working pixel buffer.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Sample encodings a page may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    U8,
    U16,
    F32,
}

impl PixelType {
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            PixelType::U8 => 8,
            PixelType::U16 => 16,
            PixelType::F32 => 32,
        }
    }

    pub const fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    /// Largest representable value; `f32::MAX` for float samples.
    pub const fn max_value(self) -> f32 {
        match self {
            PixelType::U8 => u8::MAX as f32,
            PixelType::U16 => u16::MAX as f32,
            PixelType::F32 => f32::MAX,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelType::U8 => "8-bit",
            PixelType::U16 => "16-bit",
            PixelType::F32 => "32-bit float",
        }
    }
}

/// A single grayscale image.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pixels: GrayF32,
    pixel_type: PixelType,
}

impl Plane {
    /// A zero-filled plane.
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            pixels: ImageBuffer::new(width, height),
            pixel_type,
        }
    }

    /// Wrap row-major samples. Returns `None` if the length does not match.
    pub fn from_samples(
        width: u32,
        height: u32,
        pixel_type: PixelType,
        samples: Vec<f32>,
    ) -> Option<Self> {
        ImageBuffer::from_raw(width, height, samples).map(|pixels| Self { pixels, pixel_type })
    }

    /// Decode packed samples as stored in an uncompressed TIFF page.
    ///
    /// `min_is_white` inverts integer samples so that larger values are
    /// always brighter.
    pub fn decode(
        width: u32,
        height: u32,
        pixel_type: PixelType,
        bytes: &[u8],
        byte_order: ByteOrder,
        min_is_white: bool,
    ) -> Result<Self, TiffError> {
        let count = width as usize * height as usize;
        let needed = count * pixel_type.bytes_per_sample();
        if bytes.len() < needed {
            return Err(TiffError::InvalidTagValue {
                tag: "StripByteCounts",
                message: format!("page needs {} bytes, found {}", needed, bytes.len()),
            });
        }

        let mut samples: Vec<f32> = match pixel_type {
            PixelType::U8 => bytes[..count].iter().map(|&b| b as f32).collect(),
            PixelType::U16 => bytes[..needed]
                .chunks_exact(2)
                .map(|c| byte_order.read_u16(c) as f32)
                .collect(),
            PixelType::F32 => bytes[..needed]
                .chunks_exact(4)
                .map(|c| byte_order.read_f32(c))
                .collect(),
        };

        if min_is_white && pixel_type != PixelType::F32 {
            let max = pixel_type.max_value();
            samples.iter_mut().for_each(|v| *v = max - *v);
        }

        Self::from_samples(width, height, pixel_type, samples).ok_or_else(|| {
            TiffError::InvalidTagValue {
                tag: "ImageWidth",
                message: "sample count does not match dimensions".to_string(),
            }
        })
    }

    /// Encode samples little-endian at the plane's pixel type.
    ///
    /// Integer outputs are rounded and clamped; NaN becomes 0.
    pub fn encode_le(&self) -> Vec<u8> {
        let raw = self.pixels.as_raw();
        let mut out = Vec::with_capacity(raw.len() * self.pixel_type.bytes_per_sample());
        match self.pixel_type {
            PixelType::U8 => out.extend(raw.iter().map(|&v| quantize(v, u8::MAX as f32) as u8)),
            PixelType::U16 => {
                for &v in raw {
                    out.extend_from_slice(&(quantize(v, u16::MAX as f32) as u16).to_le_bytes());
                }
            }
            PixelType::F32 => {
                for &v in raw {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        out
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Sample at (x, y). Panics when out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.pixels.get_pixel(x, y)[0]
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, value: f32) {
        self.pixels.put_pixel(x, y, Luma([value]));
    }

    /// Row-major samples.
    pub fn samples(&self) -> &[f32] {
        self.pixels.as_raw()
    }

    pub fn pixels(&self) -> &GrayF32 {
        &self.pixels
    }

    /// Copy into a larger zero-filled canvas anchored at the top-left.
    ///
    /// Dimensions smaller than the current ones are kept as they are.
    pub fn pad_to(&self, width: u32, height: u32) -> Plane {
        let (w, h) = self.dimensions();
        if w >= width && h >= height {
            return self.clone();
        }
        let mut padded = Plane::new(width.max(w), height.max(h), self.pixel_type);
        image::imageops::replace(&mut padded.pixels, &self.pixels, 0, 0);
        padded
    }
}

#[inline]
fn quantize(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.round().clamp(0.0, max)
    }
}
