//! Captured frame container.
//!
//! A [`Frame`] is one still image pulled from a camera source: packed RGB8
//! pixels plus the native dimensions of the feed. The native dimensions are
//! what the overlay surface is sized to, so they are re-read from the latest
//! frame before every draw rather than fixed at connect time.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// One captured still image in packed RGB8.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wraps packed RGB8 pixel data.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "pixel buffer is {} bytes; {}x{} RGB8 needs {}",
                pixels.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Decodes an encoded image (JPEG, PNG, ...) into a frame.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode frame image")?;
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            pixels: rgb.into_raw(),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Encodes the frame as JPEG, the wire format the detection service takes.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let rgb = RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("pixel buffer does not match frame dimensions"))?;
        let mut encoded = Vec::new();
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .context("encode frame as jpeg")?;
        Ok(encoded)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn encodes_and_decodes_jpeg() -> Result<()> {
        let frame = Frame::new(vec![128u8; 16 * 8 * 3], 16, 8)?;
        let jpeg = frame.encode_jpeg()?;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = Frame::from_encoded(&jpeg)?;
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
        Ok(())
    }
}
