//! Format state: the complete inheritable formatting context in effect at a
//! point in the source, plus the stack that tracks it across nested groups
//! and elements.
//!
//! Lengths are stored in RTF units (twips, half-points) in both conversion
//! directions; the markup side converts at its boundary.

use crate::common::encoding::DEFAULT_CODE_PAGE;

/// Deepest list nesting a paragraph can ask for.
pub const MAX_LIST_DEPTH: i64 = 9;
/// Deepest table nesting a paragraph can ask for.
pub const MAX_TABLE_DEPTH: i64 = 64;

/// Role of the RTF group currently being read. Routes text and control words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Document body text
    #[default]
    Normal,
    ColorTable,
    FontTable,
    /// A single `{\fN ...}` entry inside the font table
    FontEntry,
    ListTable,
    List,
    ListLevel,
    ListOverrideTable,
    ListOverride,
    /// `\lfolevel` inside an override
    ListOverrideLevel,
    /// `\listlevel` replacing a level format inside an `\lfolevel`
    ListOverrideFormat,
    /// `\listtext` / `\pntext`: the rendered marker of a list paragraph
    ListText,
    /// Old-style `\pn` numbering properties
    Pn,
    Field,
    FieldInstruction,
    FieldResult,
    Picture,
    Shape,
    ShapeInstruction,
    ShapeText,
    Object,
    /// `\upr`: ANSI rendition, skipped in favour of the `\ud` group
    Upr,
    /// Any destination whose content is discarded
    Ignore,
}

impl Destination {
    /// Destinations whose text becomes document content.
    #[inline]
    pub fn is_content(self) -> bool {
        matches!(self, Self::Normal | Self::FieldResult | Self::ShapeText)
    }

    #[inline]
    pub fn is_field(self) -> bool {
        matches!(self, Self::Field | Self::FieldInstruction | Self::FieldResult)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnderlineKind {
    #[default]
    None,
    Single,
    Double,
    Dotted,
    Dash,
    Wave,
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrikeKind {
    #[default]
    None,
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptKind {
    #[default]
    Normal,
    Super,
    Sub,
}

/// Horizontal glyph scaling, stored as the `\charscalex` percentage bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStretch {
    UltraCondensed,
    ExtraCondensed,
    Condensed,
    SemiCondensed,
    #[default]
    Normal,
    SemiExpanded,
    Expanded,
    ExtraExpanded,
    UltraExpanded,
}

impl FontStretch {
    const BANDS: [(FontStretch, i64); 9] = [
        (FontStretch::UltraCondensed, 50),
        (FontStretch::ExtraCondensed, 62),
        (FontStretch::Condensed, 75),
        (FontStretch::SemiCondensed, 87),
        (FontStretch::Normal, 100),
        (FontStretch::SemiExpanded, 112),
        (FontStretch::Expanded, 125),
        (FontStretch::ExtraExpanded, 150),
        (FontStretch::UltraExpanded, 200),
    ];

    /// Nearest stretch band for a `\charscalexN` percentage.
    pub fn from_percent(percent: i64) -> Self {
        Self::BANDS
            .iter()
            .min_by_key(|(_, p)| (p - percent).abs())
            .map_or(Self::Normal, |(s, _)| *s)
    }

    pub fn percent(self) -> i64 {
        Self::BANDS
            .iter()
            .find(|(s, _)| *s == self)
            .map_or(100, |(_, p)| *p)
    }
}

/// List marker style shared by both vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerStyle {
    None,
    #[default]
    Disc,
    Circle,
    Square,
    Box,
    LowerRoman,
    UpperRoman,
    LowerLatin,
    UpperLatin,
    Decimal,
    /// Marker present in the source but rendered as whitespace
    Hidden,
}

impl MarkerStyle {
    /// Map an RTF `\levelnfcN` / `\pnXXX` number format code.
    pub fn from_nfc(nfc: i64) -> Self {
        match nfc {
            0 => Self::Decimal,
            1 => Self::UpperRoman,
            2 => Self::LowerRoman,
            3 => Self::UpperLatin,
            4 => Self::LowerLatin,
            23 => Self::Disc,
            255 => Self::None,
            _ => Self::Decimal,
        }
    }

    pub fn to_nfc(self) -> i64 {
        match self {
            Self::Decimal => 0,
            Self::UpperRoman => 1,
            Self::LowerRoman => 2,
            Self::UpperLatin => 3,
            Self::LowerLatin => 4,
            Self::Disc | Self::Circle | Self::Square | Self::Box => 23,
            Self::None | Self::Hidden => 255,
        }
    }

    #[inline]
    pub fn is_bullet(self) -> bool {
        matches!(self, Self::Disc | Self::Circle | Self::Square | Self::Box)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderKind {
    #[default]
    None,
    Single,
    Thick,
    Double,
    Dotted,
    Dashed,
}

/// One border edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorderFormat {
    pub kind: BorderKind,
    /// Width in twips
    pub width: i64,
    /// Color table index, -1 for auto
    pub color: i64,
}

impl BorderFormat {
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.kind != BorderKind::None
    }

    /// Effective width in twips, with the one-twip-wide default Word assumes
    /// for a declared border lacking `\brdrw`.
    #[inline]
    pub fn effective_width(&self) -> i64 {
        if !self.is_visible() {
            0
        } else if self.width > 0 {
            self.width
        } else {
            15
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Borders {
    pub left: BorderFormat,
    pub top: BorderFormat,
    pub right: BorderFormat,
    pub bottom: BorderFormat,
}

impl Borders {
    #[inline]
    pub fn any(&self) -> bool {
        self.left.is_visible()
            || self.top.is_visible()
            || self.right.is_visible()
            || self.bottom.is_visible()
    }

    pub fn side_mut(&mut self, side: BorderSide) -> &mut BorderFormat {
        match side {
            BorderSide::Left => &mut self.left,
            BorderSide::Top => &mut self.top,
            BorderSide::Right => &mut self.right,
            BorderSide::Bottom => &mut self.bottom,
        }
    }

    /// First visible color, used when a single brush stands for all sides.
    pub fn color(&self) -> i64 {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .find(|b| b.is_visible() && b.color >= 0)
            .map_or(-1, |b| b.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderSide {
    Left,
    Top,
    Right,
    Bottom,
}

impl BorderSide {
    pub const ALL: [Self; 4] = [Self::Left, Self::Top, Self::Right, Self::Bottom];

    /// Position in a [`Padding`] array.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Top => 1,
            Self::Right => 2,
            Self::Bottom => 3,
        }
    }
}

/// Which border the next `\brdrXXX` word applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderTarget {
    #[default]
    None,
    Paragraph(BorderSide),
    /// All four paragraph sides (`\box`)
    ParagraphBox,
    Row(BorderSide),
    Cell(BorderSide),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlignment {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Padding in twips, ordered left, top, right, bottom.
pub type Padding = [i64; 4];

/// Properties of one table cell (`\clXXX ... \cellxN`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellFormat {
    /// Right boundary in twips from the row's left edge
    pub cellx: i64,
    pub borders: Borders,
    pub padding: Padding,
    /// Shading color table index, -1 for none
    pub background: i64,
    pub vmerge_first: bool,
    pub vmerge_cont: bool,
    pub hmerge_first: bool,
    pub hmerge_cont: bool,
    pub valign: VerticalAlignment,
}

impl CellFormat {
    pub fn new() -> Self {
        Self {
            background: -1,
            ..Default::default()
        }
    }
}

/// Properties of one table row (`\trowd ...`).
///
/// Owned by value: cloning a [`FormatState`] deep-copies the cell
/// definitions so sibling groups never alias them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowFormat {
    pub cells: Vec<CellFormat>,
    /// Cell being defined, committed by `\cellx`
    pub pending_cell: CellFormat,
    /// `\trleft`
    pub left: i64,
    /// `\trgaph`: half the space between cells
    pub gap: i64,
    /// `\trrh`
    pub height: i64,
    pub padding: Padding,
    pub borders: Borders,
    pub dir: Direction,
}

impl RowFormat {
    pub fn new() -> Self {
        Self {
            pending_cell: CellFormat::new(),
            ..Default::default()
        }
    }

    /// Commit the pending cell with its right boundary.
    pub fn commit_cell(&mut self, cellx: i64) {
        let mut cell = std::mem::replace(&mut self.pending_cell, CellFormat::new());
        cell.cellx = cellx;
        self.cells.push(cell);
    }

    /// Cell widths in twips, derived from consecutive right boundaries.
    pub fn cell_widths(&self) -> impl Iterator<Item = i64> + '_ {
        let mut left = self.left;
        self.cells.iter().map(move |c| {
            let w = (c.cellx - left).max(0);
            left = c.cellx;
            w
        })
    }
}

/// Embedded picture payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Unknown,
    Png,
    Jpeg,
    Wmf,
    Emf,
    Bmp,
    Macpict,
}

impl ImageFormat {
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            Self::Png | Self::Wmf => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            _ => None,
        }
    }
}

/// How an image fills its layout box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stretch {
    None,
    Fill,
    #[default]
    Uniform,
    UniformToFill,
}

/// Which scalings a [`Stretch`] may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StretchDirection {
    #[default]
    Both,
    UpOnly,
    DownOnly,
}

/// Snapshot of every inheritable attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatState {
    pub dest: Destination,

    // Character
    /// Font table index, -1 when none is selected
    pub font: i64,
    /// Size in half-points
    pub font_size: i64,
    pub bold: bool,
    pub italic: bool,
    pub engrave: bool,
    pub outline: bool,
    pub shadow: bool,
    pub hidden: bool,
    pub underline: UnderlineKind,
    pub strike: StrikeKind,
    pub script: ScriptKind,
    /// `\upN` / `\dnN` offset in half-points
    pub script_offset: i64,
    /// Color table indices, -1 for auto
    pub foreground: i64,
    pub background: i64,
    /// Language identifiers (LCID), -1 when unset
    pub lang: i64,
    pub lang_fe: i64,
    pub code_page: u32,
    pub char_dir: Direction,
    pub font_stretch: FontStretch,
    /// `\ucN`: fallback characters following a `\u` escape
    pub unicode_skip: i64,

    // Paragraph
    pub align: TextAlignment,
    pub li: i64,
    pub ri: i64,
    pub fi: i64,
    pub sb: i64,
    pub sa: i64,
    /// `\slN`; negative means exact
    pub sl: i64,
    pub sl_mult: bool,
    pub para_dir: Direction,
    pub para_borders: Borders,
    pub para_shading: i64,
    pub border_target: BorderTarget,

    // List
    /// `\lsN` override index, 0 when the paragraph is not in a list
    pub ils: i64,
    /// `\ilvlN`
    pub ilvl: i64,
    /// Old-style `\pnlvlN`, 0 when unset
    pub pn_level: i64,
    pub marker: MarkerStyle,
    pub start_index: i64,
    /// `\pnlvlcont`: paragraph continues the previous list item
    pub is_continue: bool,

    // Table
    pub in_table: bool,
    /// `\itapN` nesting depth
    pub itap: i64,
    pub row_format: RowFormat,
    /// Cell attributes of the node this state belongs to
    pub cell: CellFormat,

    // Image
    pub image_format: ImageFormat,
    pub pic_width: i64,
    pub pic_height: i64,
    pub pic_width_goal: i64,
    pub pic_height_goal: i64,
    /// Percent; 0 means unscaled, negative suppresses the picture
    pub pic_scale_x: i64,
    pub pic_scale_y: i64,
}

impl Default for FormatState {
    fn default() -> Self {
        Self {
            dest: Destination::Normal,
            font: -1,
            font_size: 24,
            bold: false,
            italic: false,
            engrave: false,
            outline: false,
            shadow: false,
            hidden: false,
            underline: UnderlineKind::None,
            strike: StrikeKind::None,
            script: ScriptKind::Normal,
            script_offset: 0,
            foreground: -1,
            background: -1,
            lang: -1,
            lang_fe: -1,
            code_page: DEFAULT_CODE_PAGE,
            char_dir: Direction::LeftToRight,
            font_stretch: FontStretch::Normal,
            unicode_skip: 1,
            align: TextAlignment::Left,
            li: 0,
            ri: 0,
            fi: 0,
            sb: 0,
            sa: 0,
            sl: 0,
            sl_mult: false,
            para_dir: Direction::LeftToRight,
            para_borders: Borders::default(),
            para_shading: -1,
            border_target: BorderTarget::None,
            ils: 0,
            ilvl: 0,
            pn_level: 0,
            marker: MarkerStyle::Disc,
            start_index: -1,
            is_continue: false,
            in_table: false,
            itap: 0,
            row_format: RowFormat::new(),
            cell: CellFormat::new(),
            image_format: ImageFormat::Unknown,
            pic_width: 0,
            pic_height: 0,
            pic_width_goal: 0,
            pic_height_goal: 0,
            pic_scale_x: 100,
            pic_scale_y: 100,
        }
    }
}

impl FormatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `\plain`: reset character attributes, keeping font selection state
    /// the document default supplies.
    pub fn reset_character(&mut self) {
        let d = Self::default();
        self.bold = d.bold;
        self.italic = d.italic;
        self.engrave = d.engrave;
        self.outline = d.outline;
        self.shadow = d.shadow;
        self.hidden = d.hidden;
        self.underline = d.underline;
        self.strike = d.strike;
        self.script = d.script;
        self.script_offset = d.script_offset;
        self.foreground = d.foreground;
        self.background = d.background;
        self.font_size = d.font_size;
        self.font_stretch = d.font_stretch;
        self.char_dir = d.char_dir;
        self.lang = d.lang;
        self.lang_fe = d.lang_fe;
    }

    /// `\pard`: reset paragraph attributes, including list and table
    /// membership.
    pub fn reset_paragraph(&mut self) {
        let d = Self::default();
        self.align = d.align;
        self.li = d.li;
        self.ri = d.ri;
        self.fi = d.fi;
        self.sb = d.sb;
        self.sa = d.sa;
        self.sl = d.sl;
        self.sl_mult = d.sl_mult;
        self.para_dir = d.para_dir;
        self.para_borders = d.para_borders;
        self.para_shading = d.para_shading;
        self.border_target = d.border_target;
        self.ils = d.ils;
        self.ilvl = d.ilvl;
        self.pn_level = d.pn_level;
        self.marker = d.marker;
        self.start_index = d.start_index;
        self.is_continue = d.is_continue;
        self.in_table = d.in_table;
        self.itap = d.itap;
    }

    /// `\trowd`: start a fresh row definition.
    pub fn reset_row(&mut self) {
        self.row_format = RowFormat::new();
    }

    /// Copy of this state with character attributes reset, as carried by
    /// block-level nodes.
    pub fn block_only(&self) -> Self {
        let mut state = self.clone();
        state.reset_character();
        state.font = -1;
        state
    }

    /// Equality restricted to what a text run renders.
    pub fn char_format_eq(&self, other: &Self) -> bool {
        self.font == other.font
            && self.font_size == other.font_size
            && self.bold == other.bold
            && self.italic == other.italic
            && self.engrave == other.engrave
            && self.outline == other.outline
            && self.shadow == other.shadow
            && self.hidden == other.hidden
            && self.underline == other.underline
            && self.strike == other.strike
            && self.script == other.script
            && self.script_offset == other.script_offset
            && self.foreground == other.foreground
            && self.background == other.background
            && self.lang == other.lang
            && self.lang_fe == other.lang_fe
            && self.char_dir == other.char_dir
            && self.font_stretch == other.font_stretch
    }

    /// Declared table nesting depth.
    #[inline]
    pub fn table_depth(&self) -> usize {
        if self.itap > 0 {
            self.itap.min(MAX_TABLE_DEPTH) as usize
        } else if self.in_table {
            1
        } else {
            0
        }
    }

    /// List level the paragraph asks for, 0 when it is not a list paragraph.
    #[inline]
    pub fn list_level(&self) -> i64 {
        if self.ils > 0 {
            self.ilvl.clamp(0, MAX_LIST_DEPTH - 1) + 1
        } else if self.pn_level > 0 {
            self.pn_level.min(MAX_LIST_DEPTH)
        } else {
            0
        }
    }
}

/// Stack of format states, one per open group or element.
///
/// The base entry is never popped.
#[derive(Debug, Clone)]
pub struct FormatStack {
    states: Vec<FormatState>,
}

impl FormatStack {
    pub fn new(base: FormatState) -> Self {
        Self { states: vec![base] }
    }

    /// Enter a group: push a copy of the current state.
    pub fn push(&mut self) {
        let top = self.top().clone();
        self.states.push(top);
    }

    /// Push an explicit state.
    pub fn push_state(&mut self, state: FormatState) {
        self.states.push(state);
    }

    /// Leave a group. Returns `false` for an unmatched close at base depth.
    pub fn pop(&mut self) -> bool {
        if self.states.len() > 1 {
            self.states.pop();
            true
        } else {
            false
        }
    }

    /// Leave a group, handing back the state it carried.
    pub fn pop_state(&mut self) -> Option<FormatState> {
        if self.states.len() > 1 {
            self.states.pop()
        } else {
            None
        }
    }

    #[inline]
    pub fn top(&self) -> &FormatState {
        // The base entry is never removed.
        &self.states[self.states.len() - 1]
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut FormatState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    /// The state `n` entries below the top, if any.
    #[inline]
    pub fn top_minus(&self, n: usize) -> Option<&FormatState> {
        self.states.len().checked_sub(n + 1).map(|i| &self.states[i])
    }

    /// Entry at `depth` counted from the base (0).
    #[inline]
    pub fn state_mut(&mut self, depth: usize) -> Option<&mut FormatState> {
        self.states.get_mut(depth)
    }

    /// Number of entries above the base.
    #[inline]
    pub fn depth(&self) -> usize {
        self.states.len() - 1
    }

    /// Iterate from the top down.
    pub fn iter_from_top(&self) -> impl Iterator<Item = &FormatState> {
        self.states.iter().rev()
    }
}

impl Default for FormatStack {
    fn default() -> Self {
        Self::new(FormatState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clone_does_not_alias_row_format() {
        let mut parent = FormatState::default();
        parent.row_format.commit_cell(1440);
        let mut child = parent.clone();
        child.row_format.commit_cell(2880);
        assert_eq!(parent.row_format.cells.len(), 1);
        assert_eq!(child.row_format.cells.len(), 2);
    }

    #[test]
    fn test_cell_widths() {
        let mut row = RowFormat::new();
        row.left = -108;
        row.commit_cell(1000);
        row.commit_cell(3000);
        assert_eq!(row.cell_widths().collect::<Vec<_>>(), vec![1108, 2000]);
    }

    #[test]
    fn test_block_only_resets_character() {
        let mut state = FormatState::default();
        state.bold = true;
        state.font = 3;
        state.li = 720;
        let block = state.block_only();
        assert!(!block.bold);
        assert_eq!(block.font, -1);
        assert_eq!(block.li, 720);
    }

    #[test]
    fn test_list_level() {
        let mut state = FormatState::default();
        assert_eq!(state.list_level(), 0);
        state.pn_level = 2;
        assert_eq!(state.list_level(), 2);
        state.ils = 1;
        state.ilvl = 0;
        assert_eq!(state.list_level(), 1);
    }

    #[test]
    fn test_nesting_depths_are_bounded() {
        let mut state = FormatState::default();
        state.pn_level = i64::MAX;
        assert_eq!(state.list_level(), MAX_LIST_DEPTH);
        state.ils = 3;
        state.ilvl = 40;
        assert_eq!(state.list_level(), MAX_LIST_DEPTH);
        state.itap = 3_000_000;
        assert_eq!(state.table_depth(), MAX_TABLE_DEPTH as usize);
    }

    #[test]
    fn test_font_stretch_bands() {
        assert_eq!(FontStretch::from_percent(100), FontStretch::Normal);
        assert_eq!(FontStretch::from_percent(74), FontStretch::Condensed);
        assert_eq!(FontStretch::Expanded.percent(), 125);
    }

    #[test]
    fn test_stack_never_pops_base() {
        let mut stack = FormatStack::default();
        assert!(!stack.pop());
        stack.push();
        stack.top_mut().bold = true;
        assert!(stack.top_minus(1).is_some_and(|s| !s.bold));
        assert!(stack.pop());
        assert!(!stack.top().bold);
        assert!(stack.top_minus(1).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_stack_depth_balanced(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut stack = FormatStack::default();
            let mut expected = 0usize;
            for open in ops {
                if open {
                    stack.push();
                    expected += 1;
                } else {
                    let popped = stack.pop();
                    prop_assert_eq!(popped, expected > 0);
                    expected = expected.saturating_sub(1);
                }
                prop_assert_eq!(stack.depth(), expected);
            }
        }
    }
}
