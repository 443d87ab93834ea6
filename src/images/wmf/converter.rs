// WMF to PNG converter
//
// Full metafile rendering needs a GDI engine. Metafiles embedded by word
// processors are mostly a single bitmap blit, so the embedded DIB is
// extracted when present; anything else becomes a bordered placeholder.

use super::parser::WmfParser;
use crate::common::error::Result;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Largest raster side produced.
const MAX_DIMENSION: u32 = 4096;
const DEFAULT_DIMENSION: u32 = 96;

const META_DIBBITBLT: u16 = 0x0940;
const META_DIBSTRETCHBLT: u16 = 0x0B41;
const META_STRETCHDIB: u16 = 0x0F43;

pub struct WmfConverter {
    parser: WmfParser,
    size_hint: Option<(u32, u32)>,
}

impl WmfConverter {
    pub fn new(parser: WmfParser, size_hint: Option<(u32, u32)>) -> Self {
        Self { parser, size_hint }
    }

    fn dimensions(&self) -> (u32, u32) {
        let (width, height) = self
            .parser
            .placeable
            .map(|p| p.size_px())
            .or(self.size_hint)
            .unwrap_or((DEFAULT_DIMENSION, DEFAULT_DIMENSION));
        (width.clamp(1, MAX_DIMENSION), height.clamp(1, MAX_DIMENSION))
    }

    /// Offset of the DIB inside a blit record's parameters.
    fn dib_offset(function: u16) -> Option<usize> {
        match function {
            // raster op, 6 coordinates
            META_DIBBITBLT => Some(16),
            // raster op, 8 coordinates
            META_DIBSTRETCHBLT => Some(20),
            // raster op, color usage, 8 coordinates
            META_STRETCHDIB => Some(22),
            _ => None,
        }
    }

    fn extract_embedded_bitmap(&self) -> Option<DynamicImage> {
        self.parser.records.iter().find_map(|record| {
            let offset = Self::dib_offset(record.function)?;
            let dib = record.params.get(offset..)?;
            dib_to_image(dib)
        })
    }

    fn placeholder(width: u32, height: u32) -> RgbaImage {
        let border = Rgba([128, 128, 128, 255]);
        let mut img = ImageBuffer::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for x in 0..width {
            img.put_pixel(x, 0, border);
            img.put_pixel(x, height - 1, border);
        }
        for y in 0..height {
            img.put_pixel(0, y, border);
            img.put_pixel(width - 1, y, border);
        }
        img
    }

    pub fn convert_to_image(&self) -> DynamicImage {
        match self.extract_embedded_bitmap() {
            Some(bitmap) => bitmap,
            None => {
                let (width, height) = self.dimensions();
                DynamicImage::ImageRgba8(Self::placeholder(width, height))
            },
        }
    }

    pub fn convert_to_png(&self) -> Result<Vec<u8>> {
        let image = self.convert_to_image();
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

/// Wrap a packed DIB in a BMP file header and decode it.
fn dib_to_image(dib: &[u8]) -> Option<DynamicImage> {
    if dib.len() < 40 {
        return None;
    }
    let header_size = u32::from_le_bytes([dib[0], dib[1], dib[2], dib[3]]);
    let bit_count = u16::from_le_bytes([dib[14], dib[15]]);
    let compression = u32::from_le_bytes([dib[16], dib[17], dib[18], dib[19]]);
    let colors_used = u32::from_le_bytes([dib[32], dib[33], dib[34], dib[35]]);

    let palette = if bit_count <= 8 {
        let count = if colors_used > 0 { colors_used } else { 1 << bit_count };
        count.checked_mul(4)?
    } else {
        0
    };
    // BI_BITFIELDS masks follow a BITMAPINFOHEADER.
    let masks = if compression == 3 && header_size == 40 { 12 } else { 0 };
    let pixel_offset = 14u32
        .checked_add(header_size)?
        .checked_add(palette)?
        .checked_add(masks)?;
    let file_size = u32::try_from(dib.len()).ok()?.checked_add(14)?;
    if pixel_offset > file_size {
        log::debug!("embedded DIB header points past its pixels");
        return None;
    }

    let mut bmp = Vec::with_capacity(file_size as usize);
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&file_size.to_le_bytes());
    bmp.extend_from_slice(&[0u8; 4]);
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(dib);

    match image::load_from_memory_with_format(&bmp, ImageFormat::Bmp) {
        Ok(img) => Some(img),
        Err(e) => {
            log::debug!("embedded DIB not decodable: {}", e);
            None
        },
    }
}
