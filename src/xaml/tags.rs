//! Static lookup tables for the flow-document vocabulary.
//!
//! All maps are compile-time perfect hashes; element and attribute names are
//! matched case-sensitively, enumeration values case-insensitively through
//! their lowercase keys.

use crate::document::{FontStretch, MarkerStyle, Stretch, StretchDirection, TextAlignment};
use crate::rtf::tables::Color;
use phf::phf_map;

/// Markup namespace written on the root element.
pub const XAML_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml/presentation";

/// Elements of the flow-document vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XamlElement {
    FlowDocument,
    Section,
    Span,
    Run,
    Bold,
    Italic,
    Underline,
    Hyperlink,
    LineBreak,
    Paragraph,
    InlineUIContainer,
    BlockUIContainer,
    Image,
    BitmapImage,
    List,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    TableColumn,
    Figure,
    Floater,
    TextDecoration,
}

pub static ELEMENTS: phf::Map<&'static str, XamlElement> = phf_map! {
    "FlowDocument" => XamlElement::FlowDocument,
    "Section" => XamlElement::Section,
    "Span" => XamlElement::Span,
    "Run" => XamlElement::Run,
    "Bold" => XamlElement::Bold,
    "Italic" => XamlElement::Italic,
    "Underline" => XamlElement::Underline,
    "Hyperlink" => XamlElement::Hyperlink,
    "LineBreak" => XamlElement::LineBreak,
    "Paragraph" => XamlElement::Paragraph,
    "InlineUIContainer" => XamlElement::InlineUIContainer,
    "BlockUIContainer" => XamlElement::BlockUIContainer,
    "Image" => XamlElement::Image,
    "BitmapImage" => XamlElement::BitmapImage,
    "List" => XamlElement::List,
    "ListItem" => XamlElement::ListItem,
    "Table" => XamlElement::Table,
    "TableRowGroup" => XamlElement::TableRowGroup,
    "TableRow" => XamlElement::TableRow,
    "TableCell" => XamlElement::TableCell,
    "TableColumn" => XamlElement::TableColumn,
    "Figure" => XamlElement::Figure,
    "Floater" => XamlElement::Floater,
    "TextDecoration" => XamlElement::TextDecoration,
};

/// Attributes the markup reader maps onto format state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XamlAttribute {
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    FontStretch,
    Foreground,
    Background,
    TextDecorations,
    TypographyVariants,
    BaselineAlignment,
    Language,
    FlowDirection,
    TextAlignment,
    TextIndent,
    Margin,
    Padding,
    LineHeight,
    BorderThickness,
    BorderBrush,
    MarkerStyle,
    StartIndex,
    ColumnSpan,
    RowSpan,
    Width,
    Height,
    Stretch,
    StretchDirection,
    Source,
    UriSource,
    NavigateUri,
    TargetName,
    Location,
    BaselineOffset,
}

pub static ATTRIBUTES: phf::Map<&'static str, XamlAttribute> = phf_map! {
    "FontFamily" => XamlAttribute::FontFamily,
    "FontSize" => XamlAttribute::FontSize,
    "FontWeight" => XamlAttribute::FontWeight,
    "FontStyle" => XamlAttribute::FontStyle,
    "FontStretch" => XamlAttribute::FontStretch,
    "Foreground" => XamlAttribute::Foreground,
    "Background" => XamlAttribute::Background,
    "TextDecorations" => XamlAttribute::TextDecorations,
    "Typography.Variants" => XamlAttribute::TypographyVariants,
    "BaselineAlignment" => XamlAttribute::BaselineAlignment,
    "xml:lang" => XamlAttribute::Language,
    "Language" => XamlAttribute::Language,
    "FlowDirection" => XamlAttribute::FlowDirection,
    "TextAlignment" => XamlAttribute::TextAlignment,
    "TextIndent" => XamlAttribute::TextIndent,
    "Margin" => XamlAttribute::Margin,
    "Padding" => XamlAttribute::Padding,
    "LineHeight" => XamlAttribute::LineHeight,
    "BorderThickness" => XamlAttribute::BorderThickness,
    "BorderBrush" => XamlAttribute::BorderBrush,
    "MarkerStyle" => XamlAttribute::MarkerStyle,
    "StartIndex" => XamlAttribute::StartIndex,
    "ColumnSpan" => XamlAttribute::ColumnSpan,
    "RowSpan" => XamlAttribute::RowSpan,
    "Width" => XamlAttribute::Width,
    "Height" => XamlAttribute::Height,
    "Stretch" => XamlAttribute::Stretch,
    "StretchDirection" => XamlAttribute::StretchDirection,
    "Source" => XamlAttribute::Source,
    "UriSource" => XamlAttribute::UriSource,
    "NavigateUri" => XamlAttribute::NavigateUri,
    "TargetName" => XamlAttribute::TargetName,
    "Location" => XamlAttribute::Location,
    "TextBlock.BaselineOffset" => XamlAttribute::BaselineOffset,
};

static TEXT_ALIGNMENTS: phf::Map<&'static str, TextAlignment> = phf_map! {
    "left" => TextAlignment::Left,
    "right" => TextAlignment::Right,
    "center" => TextAlignment::Center,
    "justify" => TextAlignment::Justify,
};

static MARKER_STYLES: phf::Map<&'static str, MarkerStyle> = phf_map! {
    "none" => MarkerStyle::None,
    "disc" => MarkerStyle::Disc,
    "circle" => MarkerStyle::Circle,
    "square" => MarkerStyle::Square,
    "box" => MarkerStyle::Box,
    "lowerroman" => MarkerStyle::LowerRoman,
    "upperroman" => MarkerStyle::UpperRoman,
    "lowerlatin" => MarkerStyle::LowerLatin,
    "upperlatin" => MarkerStyle::UpperLatin,
    "decimal" => MarkerStyle::Decimal,
};

static STRETCHES: phf::Map<&'static str, Stretch> = phf_map! {
    "none" => Stretch::None,
    "fill" => Stretch::Fill,
    "uniform" => Stretch::Uniform,
    "uniformtofill" => Stretch::UniformToFill,
};

static STRETCH_DIRECTIONS: phf::Map<&'static str, StretchDirection> = phf_map! {
    "both" => StretchDirection::Both,
    "uponly" => StretchDirection::UpOnly,
    "downonly" => StretchDirection::DownOnly,
};

static FONT_STRETCHES: phf::Map<&'static str, FontStretch> = phf_map! {
    "ultracondensed" => FontStretch::UltraCondensed,
    "extracondensed" => FontStretch::ExtraCondensed,
    "condensed" => FontStretch::Condensed,
    "semicondensed" => FontStretch::SemiCondensed,
    "normal" => FontStretch::Normal,
    "medium" => FontStretch::Normal,
    "semiexpanded" => FontStretch::SemiExpanded,
    "expanded" => FontStretch::Expanded,
    "extraexpanded" => FontStretch::ExtraExpanded,
    "ultraexpanded" => FontStretch::UltraExpanded,
};

/// Named brushes, as `0xRRGGBB`.
static NAMED_COLORS: phf::Map<&'static str, u32> = phf_map! {
    "black" => 0x000000,
    "white" => 0xFFFFFF,
    "red" => 0xFF0000,
    "green" => 0x008000,
    "lime" => 0x00FF00,
    "blue" => 0x0000FF,
    "yellow" => 0xFFFF00,
    "cyan" => 0x00FFFF,
    "aqua" => 0x00FFFF,
    "magenta" => 0xFF00FF,
    "fuchsia" => 0xFF00FF,
    "gray" => 0x808080,
    "grey" => 0x808080,
    "darkgray" => 0xA9A9A9,
    "lightgray" => 0xD3D3D3,
    "silver" => 0xC0C0C0,
    "maroon" => 0x800000,
    "navy" => 0x000080,
    "olive" => 0x808000,
    "purple" => 0x800080,
    "teal" => 0x008080,
    "orange" => 0xFFA500,
    "brown" => 0xA52A2A,
    "pink" => 0xFFC0CB,
    "darkblue" => 0x00008B,
    "darkred" => 0x8B0000,
    "darkgreen" => 0x006400,
};

/// Windows language identifiers and their markup language tags.
static LANGUAGE_TAGS: phf::Map<u32, &'static str> = phf_map! {
    1025u32 => "ar-sa",
    1026u32 => "bg-bg",
    1027u32 => "ca-es",
    1028u32 => "zh-tw",
    1029u32 => "cs-cz",
    1030u32 => "da-dk",
    1031u32 => "de-de",
    1032u32 => "el-gr",
    1033u32 => "en-us",
    1034u32 => "es-es",
    1035u32 => "fi-fi",
    1036u32 => "fr-fr",
    1037u32 => "he-il",
    1038u32 => "hu-hu",
    1040u32 => "it-it",
    1041u32 => "ja-jp",
    1042u32 => "ko-kr",
    1043u32 => "nl-nl",
    1044u32 => "nb-no",
    1045u32 => "pl-pl",
    1046u32 => "pt-br",
    1049u32 => "ru-ru",
    1053u32 => "sv-se",
    1054u32 => "th-th",
    1055u32 => "tr-tr",
    1058u32 => "uk-ua",
    1066u32 => "vi-vn",
    2052u32 => "zh-cn",
    2057u32 => "en-gb",
    2070u32 => "pt-pt",
    3076u32 => "zh-hk",
    3082u32 => "es-es",
    4100u32 => "zh-sg",
};

static LANGUAGE_IDS: phf::Map<&'static str, u32> = phf_map! {
    "ar-sa" => 1025,
    "bg-bg" => 1026,
    "ca-es" => 1027,
    "zh-tw" => 1028,
    "cs-cz" => 1029,
    "da-dk" => 1030,
    "de-de" => 1031,
    "el-gr" => 1032,
    "en-us" => 1033,
    "es-es" => 1034,
    "fi-fi" => 1035,
    "fr-fr" => 1036,
    "he-il" => 1037,
    "hu-hu" => 1038,
    "it-it" => 1040,
    "ja-jp" => 1041,
    "ko-kr" => 1042,
    "nl-nl" => 1043,
    "nb-no" => 1044,
    "pl-pl" => 1045,
    "pt-br" => 1046,
    "ru-ru" => 1049,
    "sv-se" => 1053,
    "th-th" => 1054,
    "tr-tr" => 1055,
    "uk-ua" => 1058,
    "vi-vn" => 1066,
    "zh-cn" => 2052,
    "en-gb" => 2057,
    "pt-pt" => 2070,
    "zh-hk" => 3076,
    "zh-sg" => 4100,
};

#[inline]
fn lookup<T: Copy>(map: &phf::Map<&'static str, T>, value: &str) -> Option<T> {
    map.get(value.trim().to_ascii_lowercase().as_str()).copied()
}

pub fn parse_text_alignment(value: &str) -> Option<TextAlignment> {
    lookup(&TEXT_ALIGNMENTS, value)
}

pub fn parse_marker_style(value: &str) -> Option<MarkerStyle> {
    lookup(&MARKER_STYLES, value)
}

pub fn parse_stretch(value: &str) -> Option<Stretch> {
    lookup(&STRETCHES, value)
}

pub fn parse_stretch_direction(value: &str) -> Option<StretchDirection> {
    lookup(&STRETCH_DIRECTIONS, value)
}

pub fn parse_font_stretch(value: &str) -> Option<FontStretch> {
    lookup(&FONT_STRETCHES, value)
}

/// Parse a brush: `#RGB`, `#ARGB`, `#RRGGBB`, `#AARRGGBB` or a named color.
pub fn parse_color(value: &str) -> Option<Color> {
    if let Some(color) = Color::from_hex(value) {
        return Some(color);
    }
    let rgb = lookup(&NAMED_COLORS, value)?;
    Some(Color::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
}

/// Language tag for a Windows language identifier.
pub fn language_tag(lcid: i64) -> Option<&'static str> {
    u32::try_from(lcid).ok().and_then(|id| LANGUAGE_TAGS.get(&id).copied())
}

/// Windows language identifier for a language tag.
pub fn language_id(tag: &str) -> Option<i64> {
    lookup(&LANGUAGE_IDS, tag).map(i64::from)
}

pub fn text_alignment_name(align: TextAlignment) -> &'static str {
    match align {
        TextAlignment::Left => "Left",
        TextAlignment::Right => "Right",
        TextAlignment::Center => "Center",
        TextAlignment::Justify => "Justify",
    }
}

/// Markup name of a marker style. Hidden markers render as `None`.
pub fn marker_style_name(marker: MarkerStyle) -> &'static str {
    match marker {
        MarkerStyle::None | MarkerStyle::Hidden => "None",
        MarkerStyle::Disc => "Disc",
        MarkerStyle::Circle => "Circle",
        MarkerStyle::Square => "Square",
        MarkerStyle::Box => "Box",
        MarkerStyle::LowerRoman => "LowerRoman",
        MarkerStyle::UpperRoman => "UpperRoman",
        MarkerStyle::LowerLatin => "LowerLatin",
        MarkerStyle::UpperLatin => "UpperLatin",
        MarkerStyle::Decimal => "Decimal",
    }
}

pub fn stretch_name(stretch: Stretch) -> &'static str {
    match stretch {
        Stretch::None => "None",
        Stretch::Fill => "Fill",
        Stretch::Uniform => "Uniform",
        Stretch::UniformToFill => "UniformToFill",
    }
}

pub fn font_stretch_name(stretch: FontStretch) -> &'static str {
    match stretch {
        FontStretch::UltraCondensed => "UltraCondensed",
        FontStretch::ExtraCondensed => "ExtraCondensed",
        FontStretch::Condensed => "Condensed",
        FontStretch::SemiCondensed => "SemiCondensed",
        FontStretch::Normal => "Normal",
        FontStretch::SemiExpanded => "SemiExpanded",
        FontStretch::Expanded => "Expanded",
        FontStretch::ExtraExpanded => "ExtraExpanded",
        FontStretch::UltraExpanded => "UltraExpanded",
    }
}
