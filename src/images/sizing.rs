//! Payload sniffing and stretch-mode sizing.

use crate::document::format::{Stretch, StretchDirection};

/// Raster payload kinds the converters pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Png,
    Jpeg,
}

impl PayloadKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// RTF picture-type control word.
    pub fn control_word(self) -> &'static str {
        match self {
            Self::Png => "pngblip",
            Self::Jpeg => "jpegblip",
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Identify a payload by its magic bytes.
pub fn sniff(data: &[u8]) -> Option<PayloadKind> {
    if data.starts_with(&PNG_SIGNATURE) {
        Some(PayloadKind::Png)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        Some(PayloadKind::Jpeg)
    } else {
        None
    }
}

#[inline]
fn be_u16(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as u32)
}

#[inline]
fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn png_size(data: &[u8]) -> Option<(u32, u32)> {
    // IHDR is always the first chunk.
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(data, 16)?, be_u32(data, 20)?))
}

fn jpeg_size(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = be_u16(data, pos + 2)? as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = be_u16(data, pos + 5)?;
            let width = be_u16(data, pos + 7)?;
            return Some((width, height));
        }
        pos += 2 + length;
    }
    None
}

/// Pixel size recorded in a PNG or JPEG header.
pub fn natural_size(data: &[u8]) -> Option<(u32, u32)> {
    match sniff(data)? {
        PayloadKind::Png => png_size(data),
        PayloadKind::Jpeg => jpeg_size(data),
    }
}

/// Scale factors that fit content of `natural` size into an available box
/// under a stretch policy. An absent box dimension leaves that axis
/// unconstrained.
pub fn compute_scale(
    natural: (f64, f64),
    available: (Option<f64>, Option<f64>),
    stretch: Stretch,
    direction: StretchDirection,
) -> (f64, f64) {
    let (width, height) = natural;
    let (avail_w, avail_h) = available;
    let constrained_w = avail_w.is_some_and(f64::is_finite) && width > 0.0;
    let constrained_h = avail_h.is_some_and(f64::is_finite) && height > 0.0;

    if stretch == Stretch::None || (!constrained_w && !constrained_h) {
        return (1.0, 1.0);
    }

    let mut scale_x = if constrained_w { avail_w.unwrap_or(width) / width } else { 0.0 };
    let mut scale_y = if constrained_h { avail_h.unwrap_or(height) / height } else { 0.0 };

    if !constrained_w {
        scale_x = scale_y;
    } else if !constrained_h {
        scale_y = scale_x;
    } else {
        match stretch {
            Stretch::Uniform => {
                let s = scale_x.min(scale_y);
                scale_x = s;
                scale_y = s;
            },
            Stretch::UniformToFill => {
                let s = scale_x.max(scale_y);
                scale_x = s;
                scale_y = s;
            },
            Stretch::Fill | Stretch::None => {},
        }
    }

    match direction {
        StretchDirection::UpOnly => {
            scale_x = scale_x.max(1.0);
            scale_y = scale_y.max(1.0);
        },
        StretchDirection::DownOnly => {
            scale_x = scale_x.min(1.0);
            scale_y = scale_y.min(1.0);
        },
        StretchDirection::Both => {},
    }
    (scale_x, scale_y)
}
