//! RTF lookup tables: fonts, colors, lists and list overrides.
//!
//! The tables are mutable while a document is decoded (the header groups fill
//! them in) and are synthesized from the markup tree before encoding.

use crate::common::encoding::charset_to_codepage;
use crate::document::format::MarkerStyle;

/// RTF color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    /// Red component (0-255)
    pub red: u8,
    /// Green component (0-255)
    pub green: u8,
    /// Blue component (0-255)
    pub blue: u8,
}

impl Color {
    #[inline]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// `#FFRRGGBB`, the form brush attributes are written in.
    pub fn to_argb_hex(self) -> String {
        format!("#FF{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }

    /// Parse `#RGB`, `#ARGB`, `#RRGGBB` or `#AARRGGBB`. Alpha is dropped.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        let digit = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
        let bytes = hex.as_bytes();
        let nibbles = bytes.iter().map(|&b| digit(b)).collect::<Option<Vec<u8>>>()?;
        let (r, g, b) = match nibbles.as_slice() {
            [r, g, b] | [_, r, g, b] => (r * 17, g * 17, b * 17),
            [r1, r2, g1, g2, b1, b2] | [_, _, r1, r2, g1, g2, b1, b2] => {
                (r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)
            },
            _ => return None,
        };
        Some(Self::new(r, g, b))
    }
}

/// Color table. Entry 0 is conventionally the "auto" color.
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    colors: Vec<Option<Color>>,
    pending: Option<Color>,
}

impl ColorTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding just the auto entry, as the encoder starts with.
    pub fn with_auto() -> Self {
        Self {
            colors: vec![None],
            pending: None,
        }
    }

    /// Record one component of the entry being read.
    pub fn set_component(&mut self, component: ColorComponent, value: i64) {
        let color = self.pending.get_or_insert_with(Color::black);
        let value = value.clamp(0, 255) as u8;
        match component {
            ColorComponent::Red => color.red = value,
            ColorComponent::Green => color.green = value,
            ColorComponent::Blue => color.blue = value,
        }
    }

    /// A `;` terminates the entry being read; one with no components is auto.
    pub fn commit(&mut self) {
        let entry = self.pending.take();
        self.colors.push(entry);
    }

    #[inline]
    pub fn get(&self, index: i64) -> Option<Color> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.colors.get(i).copied().flatten())
    }

    /// Index of `color`, adding it when absent.
    pub fn find_or_add(&mut self, color: Color) -> i64 {
        if let Some(i) = self.colors.iter().position(|c| *c == Some(color)) {
            return i as i64;
        }
        self.colors.push(Some(color));
        (self.colors.len() - 1) as i64
    }

    #[inline]
    pub fn entries(&self) -> &[Option<Color>] {
        &self.colors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponent {
    Red,
    Green,
    Blue,
}

/// Font family categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontFamily {
    /// Nil (unknown or default)
    #[default]
    Nil,
    /// Roman (serif) fonts
    Roman,
    /// Swiss (sans-serif) fonts
    Swiss,
    /// Modern (monospace) fonts
    Modern,
    /// Script fonts
    Script,
    /// Decorative fonts
    Decor,
    /// Technical, symbol, and mathematical fonts
    Tech,
}

impl FontFamily {
    pub fn control_word(self) -> &'static str {
        match self {
            Self::Nil => "fnil",
            Self::Roman => "froman",
            Self::Swiss => "fswiss",
            Self::Modern => "fmodern",
            Self::Script => "fscript",
            Self::Decor => "fdecor",
            Self::Tech => "ftech",
        }
    }
}

/// Font definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    /// `\fN` identifier
    pub id: i64,
    pub name: String,
    pub family: FontFamily,
    /// `\fcharsetN`, -1 when not declared
    pub charset: i64,
    /// Code page implied by `\cpgN` or the charset
    pub code_page: Option<u32>,
    /// Name terminated; later text belongs to alternate names
    pub sealed: bool,
}

impl Font {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            charset: -1,
            ..Default::default()
        }
    }

    pub fn set_charset(&mut self, charset: i64) {
        self.charset = charset;
        if self.code_page.is_none() {
            self.code_page = charset_to_codepage(charset);
        }
    }

    /// Append name text; a `;` terminates the name.
    pub fn append_name(&mut self, text: &str) {
        if self.sealed {
            return;
        }
        match text.find(';') {
            Some(end) => {
                self.name.push_str(&text[..end]);
                self.seal();
            },
            None => self.name.push_str(text),
        }
    }

    pub fn seal(&mut self) {
        if !self.sealed {
            let trimmed = self.name.trim().to_string();
            self.name = trimmed;
            self.sealed = true;
        }
    }
}

/// Font table keyed by `\fN` identifier.
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    fonts: Vec<Font>,
}

impl FontTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `id`, created on first use.
    pub fn define(&mut self, id: i64) -> &mut Font {
        let pos = match self.fonts.iter().position(|f| f.id == id) {
            Some(pos) => pos,
            None => {
                self.fonts.push(Font::new(id));
                self.fonts.len() - 1
            },
        };
        &mut self.fonts[pos]
    }

    #[inline]
    pub fn get(&self, id: i64) -> Option<&Font> {
        self.fonts.iter().find(|f| f.id == id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: i64) -> Option<&mut Font> {
        self.fonts.iter_mut().find(|f| f.id == id)
    }

    /// Identifier of a font named `name`, adding it when absent.
    pub fn find_or_add(&mut self, name: &str) -> i64 {
        if let Some(f) = self.fonts.iter().find(|f| f.name.eq_ignore_ascii_case(name)) {
            return f.id;
        }
        let id = self.fonts.iter().map(|f| f.id + 1).max().unwrap_or(0);
        let font = self.define(id);
        font.name = name.to_string();
        font.sealed = true;
        id
    }

    #[inline]
    pub fn fonts(&self) -> &[Font] {
        &self.fonts
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// A single level of a list definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLevel {
    pub marker: MarkerStyle,
    /// `\levelstartatN`
    pub start_at: i64,
}

impl Default for ListLevel {
    fn default() -> Self {
        Self {
            marker: MarkerStyle::Decimal,
            start_at: 1,
        }
    }
}

/// RTF list definition (`\list`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    /// `\listidN`
    pub id: i64,
    pub levels: Vec<ListLevel>,
}

impl List {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            levels: Vec::new(),
        }
    }

    /// Level `ilvl`, falling back to the last defined one.
    pub fn level(&self, ilvl: i64) -> Option<&ListLevel> {
        usize::try_from(ilvl)
            .ok()
            .and_then(|i| self.levels.get(i))
            .or_else(|| self.levels.last())
    }
}

/// List override entry (`\listoverride`), the instance `\lsN` refers to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOverride {
    /// `\lsN`
    pub index: i64,
    pub list_id: i64,
    /// `\levelstartat` inside an `\lfolevel`; consumed by its first use
    pub start_override: Option<i64>,
    /// `\lfolevel` entries in level order, `Some` where the entry replaces
    /// the level format through `\listoverrideformat`
    pub levels: Vec<Option<ListLevel>>,
}

impl ListOverride {
    pub fn new(list_id: i64) -> Self {
        Self {
            index: 0,
            list_id,
            start_override: None,
            levels: Vec::new(),
        }
    }

    /// Replacement format for level `ilvl`, if this override carries one.
    pub fn level(&self, ilvl: usize) -> Option<&ListLevel> {
        self.levels.get(ilvl).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListTable {
    lists: Vec<List>,
}

impl ListTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, list: List) {
        self.lists.push(list);
    }

    #[inline]
    pub fn get(&self, id: i64) -> Option<&List> {
        self.lists.iter().find(|l| l.id == id)
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut List> {
        self.lists.last_mut()
    }

    #[inline]
    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOverrideTable {
    overrides: Vec<ListOverride>,
}

impl ListOverrideTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, entry: ListOverride) {
        self.overrides.push(entry);
    }

    #[inline]
    pub fn get(&self, index: i64) -> Option<&ListOverride> {
        self.overrides.iter().find(|o| o.index == index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: i64) -> Option<&mut ListOverride> {
        self.overrides.iter_mut().find(|o| o.index == index)
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut ListOverride> {
        self.overrides.last_mut()
    }

    #[inline]
    pub fn overrides(&self) -> &[ListOverride] {
        &self.overrides
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Every table a conversion consults.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub fonts: FontTable,
    pub colors: ColorTable,
    pub lists: ListTable,
    pub overrides: ListOverrideTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_table_auto_entry() {
        let mut table = ColorTable::new();
        table.commit();
        table.set_component(ColorComponent::Red, 255);
        table.commit();
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(1), Some(Color::new(255, 0, 0)));
        assert_eq!(table.get(-1), None);
    }

    #[test]
    fn test_color_find_or_add() {
        let mut table = ColorTable::with_auto();
        let red = table.find_or_add(Color::new(255, 0, 0));
        assert_eq!(red, 1);
        assert_eq!(table.find_or_add(Color::new(255, 0, 0)), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::new(255, 0, 0)));
        assert_eq!(Color::from_hex("#800000FF"), Some(Color::new(0, 0, 255)));
        assert_eq!(Color::from_hex("#0F0"), Some(Color::new(0, 255, 0)));
        assert_eq!(Color::from_hex("red"), None);
        assert_eq!(Color::new(1, 2, 255).to_argb_hex(), "#FF0102FF");
    }

    #[test]
    fn test_font_name_sealing() {
        let mut table = FontTable::new();
        let font = table.define(2);
        font.set_charset(128);
        font.append_name("MS ");
        font.append_name("Gothic;");
        font.append_name("ignored");
        assert_eq!(table.get(2).map(|f| f.name.as_str()), Some("MS Gothic"));
        assert_eq!(table.get(2).and_then(|f| f.code_page), Some(932));
    }

    #[test]
    fn test_font_find_or_add() {
        let mut table = FontTable::new();
        assert_eq!(table.find_or_add("Arial"), 0);
        assert_eq!(table.find_or_add("Calibri"), 1);
        assert_eq!(table.find_or_add("arial"), 0);
    }

    #[test]
    fn test_list_level_fallback() {
        let mut list = List::new(7);
        list.levels.push(ListLevel {
            marker: MarkerStyle::Disc,
            start_at: 1,
        });
        assert_eq!(list.level(3).map(|l| l.marker), Some(MarkerStyle::Disc));
    }
}
