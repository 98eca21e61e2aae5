use std::{fmt, path::Path};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::{lights::Color, LightDeckError, Result};

/// Bytes per RGBA pixel.
pub const PIXEL_BYTES: usize = 4;

/// Walks a static RGBA picture and hands out one colour per light.
///
/// The cursor is a byte offset that always points at the start of a pixel.
/// Each frame it moves forward by `stride` bytes, wrapping around the end
/// of the picture; lights read consecutive pixels starting at the cursor.
pub struct ImageSampler {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    cursor: usize,
    stride: usize,
    rng: Pcg32,
}

impl ImageSampler {
    /// Wraps raw RGBA8 pixels, seeding the stride generator from the OS.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        Self::with_seed(width, height, rgba, rand::random())
    }

    /// Same as [`ImageSampler::new`] with a fixed seed, giving a repeatable walk.
    pub fn with_seed(width: u32, height: u32, rgba: Vec<u8>, seed: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LightDeckError::InvalidImage(format!(
                "image has no pixels ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * PIXEL_BYTES;
        if rgba.len() != expected {
            return Err(LightDeckError::InvalidImage(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                rgba.len()
            )));
        }

        Ok(Self {
            width,
            height,
            rgba,
            cursor: 0,
            stride: 0,
            rng: Pcg32::seed_from_u64(seed),
        })
    }

    /// Decodes any format supported by the `image` crate.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::info!(path = %path.display(), width, height, "loaded sampler image");
        Self::new(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the picture in bytes.
    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Moves the cursor by one stride, wrapping modulo the picture size.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + self.stride) % self.byte_len();
    }

    /// Picks a new random jump: a random column and row, both scaled by
    /// `sample_speed`, folded back into the picture. Speed 0 freezes the walk.
    pub fn recompute_stride(&mut self, sample_speed: f32) {
        let speed = if sample_speed.is_nan() {
            0.0
        } else {
            sample_speed.clamp(0.0, 1.0)
        };
        let column = (self.rng.random_range(0..self.width) as f32 * speed) as u64;
        let row = (self.rng.random_range(0..self.height) as f32 * speed) as u64;
        let pixels = (self.byte_len() / PIXEL_BYTES) as u64;
        let pixel = (column + row * u64::from(self.width)) % pixels;

        self.stride = pixel as usize * PIXEL_BYTES;
        tracing::debug!(speed, stride = self.stride, "sampler stride updated");
    }

    /// Colour of the pixel `light_index` pixels past the cursor. Alpha is ignored.
    pub fn sample(&self, light_index: usize) -> Color {
        let len = self.byte_len();
        let offset = (self.cursor + (light_index % (len / PIXEL_BYTES)) * PIXEL_BYTES) % len;
        let pixel = &self.rgba[offset..offset + PIXEL_BYTES];

        Color::new(
            f32::from(pixel[0]) / 255.0,
            f32::from(pixel[1]) / 255.0,
            f32::from(pixel[2]) / 255.0,
        )
    }
}

impl fmt::Debug for ImageSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSampler")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("cursor", &self.cursor)
            .field("stride", &self.stride)
            .finish()
    }
}
