// WMF parser
//
// Reads the optional placeable header, the standard header and the record
// list. Record parameters are kept raw; the converter interprets the few
// records it needs.

use crate::common::error::{Error, Result};

#[inline]
fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
fn le_i16(data: &[u8], at: usize) -> Option<i16> {
    le_u16(data, at).map(|v| v as i16)
}

#[inline]
fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Aldus placeable header: bounding box and logical units per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceableHeader {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
    pub units_per_inch: u16,
}

impl PlaceableHeader {
    pub const KEY: u32 = 0x9AC6_CDD7;
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Option<Self> {
        if le_u32(data, 0)? != Self::KEY {
            return None;
        }
        Some(Self {
            left: le_i16(data, 6)?,
            top: le_i16(data, 8)?,
            right: le_i16(data, 10)?,
            bottom: le_i16(data, 12)?,
            units_per_inch: le_u16(data, 14)?,
        })
    }

    /// Bounding box size in pixels at 96 dpi.
    pub fn size_px(&self) -> (u32, u32) {
        let per_inch = f64::from(self.units_per_inch.max(1));
        let width = (i32::from(self.right) - i32::from(self.left)).unsigned_abs();
        let height = (i32::from(self.bottom) - i32::from(self.top)).unsigned_abs();
        (
            (f64::from(width) * 96.0 / per_inch).round() as u32,
            (f64::from(height) * 96.0 / per_inch).round() as u32,
        )
    }
}

/// One metafile record.
#[derive(Debug, Clone)]
pub struct WmfRecord {
    pub function: u16,
    pub params: Vec<u8>,
}

impl WmfRecord {
    pub const EOF: u16 = 0x0000;
}

#[derive(Debug)]
pub struct WmfParser {
    pub placeable: Option<PlaceableHeader>,
    pub records: Vec<WmfRecord>,
}

impl WmfParser {
    const HEADER_SIZE: usize = 18;

    pub fn new(data: &[u8]) -> Result<Self> {
        let placeable = PlaceableHeader::parse(data);
        let mut offset = if placeable.is_some() { PlaceableHeader::SIZE } else { 0 };

        let header_words = le_u16(data, offset + 2)
            .ok_or_else(|| Error::InvalidFormat("WMF data too short for header".into()))?;
        if header_words != 9 {
            return Err(Error::InvalidFormat(format!(
                "unexpected WMF header size {}",
                header_words
            )));
        }
        offset += Self::HEADER_SIZE;

        let mut records = Vec::new();
        while let (Some(size), Some(function)) = (le_u32(data, offset), le_u16(data, offset + 4)) {
            let size_bytes = (size as usize).saturating_mul(2);
            if size < 3 || offset + size_bytes > data.len() {
                break;
            }
            records.push(WmfRecord {
                function,
                params: data[offset + 6..offset + size_bytes].to_vec(),
            });
            offset += size_bytes;
            if function == WmfRecord::EOF {
                break;
            }
        }

        Ok(Self { placeable, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_wmf() -> Vec<u8> {
        let mut data = Vec::new();
        // Standard header: type, header words, version, size, objects, max record, params
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&9u16.to_le_bytes());
        data.extend_from_slice(&0x0300u16.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        // EOF record
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_minimal() {
        let parser = WmfParser::new(&minimal_wmf()).unwrap();
        assert!(parser.placeable.is_none());
        assert_eq!(parser.records.len(), 1);
        assert_eq!(parser.records[0].function, WmfRecord::EOF);
    }

    #[test]
    fn test_placeable_size() {
        let header = PlaceableHeader {
            left: 0,
            top: 0,
            right: 1440,
            bottom: 720,
            units_per_inch: 1440,
        };
        assert_eq!(header.size_px(), (96, 48));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(WmfParser::new(b"abc").is_err());
    }
}
