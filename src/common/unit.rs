//! Unit conversion utilities.
//!
//! RTF measures lengths in twips (1/1440 inch) and font sizes in half-points;
//! the flow-document markup measures both in device-independent pixels
//! (1/96 inch). All conversions are linear and round half up.

use std::fmt::Write;

pub const TWIPS_PER_INCH: f64 = 1440.0;
pub const TWIPS_PER_PX: f64 = 15.0;
pub const PX_PER_INCH: f64 = 96.0;
pub const PX_PER_POINT: f64 = 96.0 / 72.0;

/// Round to the nearest integer, ties toward positive infinity.
#[inline]
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[inline]
pub fn twips_to_px(twips: i64) -> f64 {
    twips as f64 / TWIPS_PER_PX
}

#[inline]
pub fn px_to_twips(px: f64) -> i64 {
    round_half_up(px * TWIPS_PER_PX)
}

/// `\fsN` half-points to pixels: `fs24` is 12pt is 16px.
#[inline]
pub fn half_points_to_px(half_points: i64) -> f64 {
    half_points as f64 * 2.0 / 3.0
}

#[inline]
pub fn px_to_half_points(px: f64) -> i64 {
    round_half_up(px * 1.5)
}

/// Length units accepted in markup attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// Pixel (1/96 inch), the unqualified default
    Pixel,
    /// Inch
    Inch,
    /// Centimeter
    Centimeter,
    /// Point (1/72 inch)
    Point,
}

impl LengthUnit {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pixel => "px",
            Self::Inch => "in",
            Self::Centimeter => "cm",
            Self::Point => "pt",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "" | "px" => Some(Self::Pixel),
            "in" => Some(Self::Inch),
            "cm" => Some(Self::Centimeter),
            "pt" => Some(Self::Point),
            _ => None,
        }
    }

    #[inline]
    fn px_factor(&self) -> f64 {
        match self {
            Self::Pixel => 1.0,
            Self::Inch => PX_PER_INCH,
            Self::Centimeter => PX_PER_INCH / 2.54,
            Self::Point => PX_PER_POINT,
        }
    }
}

/// Parse a markup length (`"12"`, `"12px"`, `"0.5in"`, `"10pt"`) into pixels.
///
/// `Auto` and unparseable values yield `None`.
///
/// ```
/// use flowrtf::common::unit::parse_length_px;
///
/// assert_eq!(parse_length_px("1in"), Some(96.0));
/// assert_eq!(parse_length_px(" 12 "), Some(12.0));
/// assert_eq!(parse_length_px("Auto"), None);
/// ```
pub fn parse_length_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let (number, consumed) = fast_float2::parse_partial::<f64, _>(value).ok()?;
    let unit = LengthUnit::from_suffix(value[consumed..].trim())?;
    if !number.is_finite() {
        return None;
    }
    Some(number * unit.px_factor())
}

/// Parse a comma or space separated thickness (`"1"`, `"1,2"`, `"1,2,3,4"`)
/// into `[left, top, right, bottom]` pixels.
pub fn parse_thickness_px(value: &str) -> Option<[f64; 4]> {
    let parts = value
        .split([',', ' '])
        .filter(|s| !s.is_empty())
        .map(parse_length_px)
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [a] => Some([*a; 4]),
        [h, v] => Some([*h, *v, *h, *v]),
        [l, t, r, b] => Some([*l, *t, *r, *b]),
        _ => None,
    }
}

/// Append a number with at most two decimals and no trailing zeros.
#[inline]
pub fn write_num(buf: &mut String, n: f64) {
    if n.fract() == 0.0 && n.abs() < 1e10 {
        let _ = write!(buf, "{}", n as i64);
    } else {
        let rounded = (n * 100.0).round() / 100.0;
        let mut buffer = ryu::Buffer::new();
        let s = buffer.format(rounded);
        if s.contains('.') {
            let trimmed = s.trim_end_matches('0').trim_end_matches('.');
            buf.push_str(trimmed);
        } else {
            buf.push_str(s);
        }
    }
}

/// Format a number the way [`write_num`] appends it.
#[inline]
pub fn format_num(n: f64) -> String {
    let mut s = String::new();
    write_num(&mut s, n);
    s
}
