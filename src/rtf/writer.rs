//! Flow-document markup to RTF writer.
//!
//! [`XamlToRtfWriter`] builds the shared document tree from markup and
//! serializes it: a prolog carrying the font, color and list tables, then
//! one group per paragraph. Depth-one table rows are preceded by their
//! `\trowd` definition; nested rows carry theirs in a trailing
//! `\*\nesttableprops` group, the way Word writes them.

use super::tables::{ListLevel, LookupTables};
use crate::common::encoding::{encode_char, is_multibyte_codepage};
use crate::common::error::Result;
use crate::common::unit::{px_to_half_points, px_to_twips, round_half_up};
use crate::document::{
    BorderFormat, BorderKind, Borders, CellFormat, Direction, DocumentNodeArray, DocumentNodeType,
    FormatState, ImageInfo, MAX_LIST_DEPTH, MarkerStyle, ScriptKind, StrikeKind, TextAlignment, UnderlineKind,
    VerticalAlignment,
};
use crate::images::{ImagePackage, compute_scale, natural_size, sniff};
use crate::options::ConvertOptions;
use crate::xaml::builder::build_tree;
use crate::xaml::lists::{LIST_INDENT, list_label};
use std::io::Read;

/// Text width shared by table columns that declare no width, in twips.
const DEFAULT_TABLE_WIDTH: i64 = 9360;
const MIN_COLUMN_WIDTH: i64 = 360;
const CELL_GAP: i64 = 108;
const HEX_LINE: usize = 128;

/// Markup to RTF encoder.
///
/// # Examples
///
/// ```
/// use flowrtf::{ConvertOptions, MemoryImagePackage, XamlToRtfWriter};
///
/// let options = ConvertOptions::default();
/// let package = MemoryImagePackage::new();
/// let rtf = XamlToRtfWriter::new("<Paragraph><Run>Hello</Run></Paragraph>", &package, &options)
///     .convert()?;
/// assert!(rtf.starts_with("{\\rtf1"));
/// assert!(rtf.contains("Hello\\par}"));
/// # Ok::<(), flowrtf::Error>(())
/// ```
pub struct XamlToRtfWriter<'a> {
    xaml: &'a str,
    package: &'a dyn ImagePackage,
    options: &'a ConvertOptions,
    doc: DocumentNodeArray,
    tables: LookupTables,
    rtf: String,
}

impl<'a> XamlToRtfWriter<'a> {
    pub fn new(xaml: &'a str, package: &'a dyn ImagePackage, options: &'a ConvertOptions) -> Self {
        Self {
            xaml,
            package,
            options,
            doc: DocumentNodeArray::new(),
            tables: LookupTables::default(),
            rtf: String::new(),
        }
    }

    /// Parse the markup and encode it.
    pub fn process(&mut self) -> Result<()> {
        let (doc, tables) = build_tree(self.xaml, self.options)?;
        let mut emitter = RtfEmitter::new(&doc, &tables, self.package, self.options);
        emitter.write_document()?;
        self.rtf = emitter.out;
        log::debug!("encoded {} nodes into {} bytes of RTF", doc.len(), self.rtf.len());
        self.doc = doc;
        self.tables = tables;
        Ok(())
    }

    /// Parse and encode in one step.
    pub fn convert(mut self) -> Result<String> {
        self.process()?;
        Ok(std::mem::take(&mut self.rtf))
    }

    /// The tree built from the markup.
    #[inline]
    pub fn document(&self) -> &DocumentNodeArray {
        &self.doc
    }

    #[inline]
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// RTF produced by the last [`process`](Self::process).
    #[inline]
    pub fn to_rtf(&self) -> &str {
        &self.rtf
    }
}

/// How a paragraph group is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphEnd {
    Par,
    Cell,
    NestCell,
}

impl ParagraphEnd {
    fn cell(depth: usize) -> Self {
        if depth > 1 { Self::NestCell } else { Self::Cell }
    }

    fn control_word(self) -> &'static str {
        match self {
            Self::Par => "par",
            Self::Cell => "cell",
            Self::NestCell => "nestcell",
        }
    }
}

/// List marking of a paragraph written directly under a list item.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListMark {
    /// First paragraph of the item, preceded by its label
    Label(String),
    /// Later paragraph joining the same item
    Continue,
}

/// One column position of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    /// Cell node; the owning cell for continuations
    cell: usize,
    col: usize,
    span: usize,
    /// Covered by a cell spanning down from an earlier row
    continuation: bool,
}

#[derive(Debug, Clone, Copy)]
struct Carry {
    rows_left: u32,
    span: usize,
    owner: usize,
}

struct RtfEmitter<'d> {
    doc: &'d DocumentNodeArray,
    tables: &'d LookupTables,
    package: &'d dyn ImagePackage,
    options: &'d ConvertOptions,
    out: String,
    /// A control word was just written; literal text needs a delimiter
    delimit: bool,
    /// Character state in effect after `\plain`
    plain: FormatState,
}

impl<'d> RtfEmitter<'d> {
    fn new(
        doc: &'d DocumentNodeArray,
        tables: &'d LookupTables,
        package: &'d dyn ImagePackage,
        options: &'d ConvertOptions,
    ) -> Self {
        Self {
            doc,
            tables,
            package,
            options,
            out: String::with_capacity(doc.len() * 32 + 256),
            delimit: false,
            plain: FormatState {
                font: 0,
                ..FormatState::default()
            },
        }
    }

    fn write_control_word(&mut self, word: &str, param: Option<i64>) {
        self.out.push('\\');
        self.out.push_str(word);
        if let Some(p) = param {
            let mut buf = itoa::Buffer::new();
            self.out.push_str(buf.format(p));
        }
        self.delimit = true;
    }

    fn write_str(&mut self, s: &str) {
        self.out.push_str(s);
        self.delimit = false;
    }

    fn write_hex_escape(&mut self, byte: u8) {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        self.out.push_str("\\'");
        self.out.push(HEX[(byte >> 4) as usize] as char);
        self.out.push(HEX[(byte & 0x0F) as usize] as char);
        self.delimit = false;
    }

    /// Escaped literal text.
    fn write_text(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\\' | '{' | '}' => {
                    self.out.push('\\');
                    self.out.push(ch);
                    self.delimit = false;
                },
                '\t' => self.write_control_word("tab", None),
                '\n' => self.write_control_word("line", None),
                ' '..='~' => {
                    if self.delimit {
                        self.out.push(' ');
                        self.delimit = false;
                    }
                    self.out.push(ch);
                },
                c if (c as u32) < 0x20 => {},
                c => self.write_non_ascii(c),
            }
        }
    }

    fn write_non_ascii(&mut self, c: char) {
        let code_page = self.options.default_code_page;
        if !is_multibyte_codepage(code_page)
            && let Some(bytes) = encode_char(c, code_page)
        {
            for b in bytes {
                self.write_hex_escape(b);
            }
            return;
        }
        let mut units = [0u16; 2];
        for &unit in c.encode_utf16(&mut units).iter() {
            // \uN takes a signed 16-bit value
            self.write_control_word("u", Some(unit as i16 as i64));
            self.write_str("?");
        }
    }

    fn write_document(&mut self) -> Result<()> {
        self.write_document_header();
        self.write_font_table();
        self.write_color_table();
        self.write_list_table();
        self.write_str("\n");

        let doc = self.doc;
        for child in doc.children(None) {
            self.write_block(child, 0)?;
        }
        self.write_str("}");
        Ok(())
    }

    fn write_document_header(&mut self) {
        self.write_str("{");
        self.write_control_word("rtf", Some(1));
        self.write_control_word("ansi", None);
        self.write_control_word("ansicpg", Some(self.options.default_code_page as i64));
        self.write_control_word("uc", Some(1));
        self.write_control_word("deff", Some(0));
        self.write_control_word("deftab", Some(self.options.default_tab_width as i64));
    }

    fn write_font_table(&mut self) {
        let tables = self.tables;
        if tables.fonts.is_empty() {
            return;
        }
        self.write_str("{");
        self.write_control_word("fonttbl", None);
        for font in tables.fonts.fonts() {
            self.write_str("{");
            self.write_control_word("f", Some(font.id));
            self.write_control_word(font.family.control_word(), None);
            if font.charset >= 0 {
                self.write_control_word("fcharset", Some(font.charset));
            }
            self.write_text(&font.name);
            self.write_str(";}");
        }
        self.write_str("}");
    }

    fn write_color_table(&mut self) {
        let tables = self.tables;
        if tables.colors.is_empty() {
            return;
        }
        self.write_str("{");
        self.write_control_word("colortbl", None);
        for entry in tables.colors.entries() {
            if let Some(color) = entry {
                self.write_control_word("red", Some(color.red as i64));
                self.write_control_word("green", Some(color.green as i64));
                self.write_control_word("blue", Some(color.blue as i64));
            }
            self.write_str(";");
        }
        self.write_str("}");
    }

    fn write_list_table(&mut self) {
        let tables = self.tables;
        if tables.lists.lists().is_empty() {
            return;
        }
        self.write_str("{\\*");
        self.write_control_word("listtable", None);
        for list in tables.lists.lists() {
            self.write_str("{");
            self.write_control_word("list", None);
            self.write_control_word("listtemplateid", Some(list.id));
            for (k, level) in list.levels.iter().enumerate() {
                self.write_list_level(k as i64, level);
            }
            self.write_control_word("listid", Some(list.id));
            self.write_str("}");
        }
        self.write_str("}");

        self.write_str("{\\*");
        self.write_control_word("listoverridetable", None);
        for entry in tables.overrides.overrides() {
            self.write_str("{");
            self.write_control_word("listoverride", None);
            self.write_control_word("listid", Some(entry.list_id));
            let count = if entry.levels.is_empty() { 0 } else { MAX_LIST_DEPTH };
            self.write_control_word("listoverridecount", Some(count));
            for ilvl in 0..count {
                self.write_str("{");
                self.write_control_word("lfolevel", None);
                if let Some(level) = entry.level(ilvl as usize) {
                    self.write_control_word("listoverrideformat", None);
                    self.write_list_level(ilvl, level);
                }
                self.write_str("}");
            }
            self.write_control_word("ls", Some(entry.index));
            self.write_str("}");
        }
        self.write_str("}");
    }

    fn write_list_level(&mut self, ilvl: i64, level: &ListLevel) {
        let nfc = level.marker.to_nfc();
        self.write_str("{");
        self.write_control_word("listlevel", None);
        self.write_control_word("levelnfc", Some(nfc));
        self.write_control_word("levelnfcn", Some(nfc));
        self.write_control_word("leveljc", Some(0));
        self.write_control_word("levelstartat", Some(level.start_at));

        self.write_str("{");
        self.write_control_word("leveltext", None);
        match level.marker {
            MarkerStyle::None | MarkerStyle::Hidden => self.write_hex_escape(0),
            marker if marker.is_bullet() => {
                self.write_hex_escape(1);
                self.write_text(&list_label(marker, 1));
            },
            _ => {
                self.write_hex_escape(2);
                self.write_hex_escape(ilvl as u8);
                self.write_str(".");
            },
        }
        self.write_str(";}");

        self.write_str("{");
        self.write_control_word("levelnumbers", None);
        if !level.marker.is_bullet() && !matches!(level.marker, MarkerStyle::None | MarkerStyle::Hidden) {
            self.write_hex_escape(1);
        }
        self.write_str(";}");

        self.write_control_word("fi", Some(-LIST_INDENT));
        self.write_control_word("li", Some(LIST_INDENT * (ilvl + 1)));
        self.write_str("}");
    }

    /// Write a block node at table nesting `depth`.
    fn write_block(&mut self, index: usize, depth: usize) -> Result<()> {
        let doc = self.doc;
        let node = &doc[index];
        if node.is_hidden() {
            return Ok(());
        }
        match node.kind {
            DocumentNodeType::Paragraph | DocumentNodeType::BlockUIContainer => {
                self.write_paragraph(index, depth, None, ParagraphEnd::Par)
            },
            DocumentNodeType::List => self.write_list(index, depth),
            DocumentNodeType::ListItem => self.write_list_item(index, depth),
            DocumentNodeType::Table => self.write_table(index, depth + 1),
            kind if kind.is_inline() => {
                let plain = self.plain.clone();
                self.write_inline(index, &plain)
            },
            _ => {
                for child in doc.children(Some(index)) {
                    self.write_block(child, depth)?;
                }
                Ok(())
            },
        }
    }

    fn write_paragraph(
        &mut self,
        index: usize,
        depth: usize,
        mark: Option<&ListMark>,
        end: ParagraphEnd,
    ) -> Result<()> {
        let doc = self.doc;
        let node = &doc[index];
        self.write_str("{");
        self.write_control_word("pard", None);
        self.write_control_word("plain", None);
        if depth > 0 {
            self.write_control_word("intbl", None);
            self.write_control_word("itap", Some(depth as i64));
        }
        self.write_paragraph_format(&node.format);

        if let Some(mark) = mark
            && node.format.ils > 0
        {
            self.write_control_word("ls", Some(node.format.ils));
            self.write_control_word("ilvl", Some(node.format.ilvl));
            match mark {
                ListMark::Label(label) => {
                    self.write_str("{");
                    self.write_control_word("listtext", None);
                    self.write_control_word("plain", None);
                    self.write_text(label);
                    self.write_control_word("tab", None);
                    self.write_str("}");
                },
                ListMark::Continue => {
                    self.write_str("{\\*");
                    self.write_control_word("pn", None);
                    self.write_control_word("pnlvlcont", None);
                    self.write_str("}");
                },
            }
        }

        let plain = self.plain.clone();
        for child in doc.children(Some(index)) {
            self.write_inline(child, &plain)?;
        }
        self.write_control_word(end.control_word(), None);
        self.write_str("}\n");
        Ok(())
    }

    fn write_paragraph_format(&mut self, format: &FormatState) {
        match format.align {
            TextAlignment::Left => {},
            TextAlignment::Right => self.write_control_word("qr", None),
            TextAlignment::Center => self.write_control_word("qc", None),
            TextAlignment::Justify => self.write_control_word("qj", None),
        }
        for (word, value) in [
            ("li", format.li),
            ("ri", format.ri),
            ("fi", format.fi),
            ("sb", format.sb),
            ("sa", format.sa),
        ] {
            if value != 0 {
                self.write_control_word(word, Some(value));
            }
        }
        if format.sl != 0 {
            self.write_control_word("sl", Some(format.sl));
            self.write_control_word("slmult", Some(format.sl_mult as i64));
        }
        if format.para_dir == Direction::RightToLeft {
            self.write_control_word("rtlpar", None);
        }
        self.write_borders(["brdrl", "brdrt", "brdrr", "brdrb"], &format.para_borders);
        if format.para_shading > 0 {
            self.write_control_word("cbpat", Some(format.para_shading));
        }
    }

    /// Visible sides of `borders`, with the side words ordered left, top,
    /// right, bottom.
    fn write_borders(&mut self, words: [&str; 4], borders: &Borders) {
        let sides = [&borders.left, &borders.top, &borders.right, &borders.bottom];
        for (word, border) in words.into_iter().zip(sides) {
            if border.is_visible() {
                self.write_border(word, border);
            }
        }
    }

    fn write_border(&mut self, control: &str, border: &BorderFormat) {
        let style = match border.kind {
            BorderKind::None => return,
            BorderKind::Single => "brdrs",
            BorderKind::Thick => "brdrth",
            BorderKind::Double => "brdrdb",
            BorderKind::Dotted => "brdrdot",
            BorderKind::Dashed => "brdrdash",
        };
        self.write_control_word(control, None);
        self.write_control_word(style, None);
        self.write_control_word("brdrw", Some(border.effective_width()));
        if border.color > 0 {
            self.write_control_word("brdrcf", Some(border.color));
        }
    }

    /// Control words turning character state `from` into `to`.
    fn write_character_format(&mut self, from: &FormatState, to: &FormatState) {
        if to.font != from.font && to.font >= 0 {
            self.write_control_word("f", Some(to.font));
        }
        if to.font_size != from.font_size {
            self.write_control_word("fs", Some(to.font_size));
        }
        for (word, on, was) in [
            ("b", to.bold, from.bold),
            ("i", to.italic, from.italic),
            ("v", to.hidden, from.hidden),
            ("impr", to.engrave, from.engrave),
            ("outl", to.outline, from.outline),
            ("shad", to.shadow, from.shadow),
        ] {
            if on != was {
                self.write_control_word(word, (!on).then_some(0));
            }
        }
        if to.underline != from.underline {
            let word = match to.underline {
                UnderlineKind::None => "ulnone",
                UnderlineKind::Single => "ul",
                UnderlineKind::Double => "uldb",
                UnderlineKind::Dotted => "uld",
                UnderlineKind::Dash => "uldash",
                UnderlineKind::Wave => "ulwave",
                UnderlineKind::Word => "ulw",
            };
            self.write_control_word(word, None);
        }
        if to.strike != from.strike {
            match to.strike {
                StrikeKind::None if from.strike == StrikeKind::Double => {
                    self.write_control_word("striked", Some(0))
                },
                StrikeKind::None => self.write_control_word("strike", Some(0)),
                StrikeKind::Single => self.write_control_word("strike", None),
                StrikeKind::Double => self.write_control_word("striked", Some(1)),
            }
        }
        if to.script != from.script {
            let word = match to.script {
                ScriptKind::Normal => "nosupersub",
                ScriptKind::Super => "super",
                ScriptKind::Sub => "sub",
            };
            self.write_control_word(word, None);
        }
        if to.foreground != from.foreground {
            self.write_control_word("cf", Some(to.foreground.max(0)));
        }
        if to.background != from.background {
            self.write_control_word("chcbpat", Some(to.background.max(0)));
        }
        if to.lang != from.lang && to.lang >= 0 {
            self.write_control_word("lang", Some(to.lang));
        }
        if to.char_dir != from.char_dir {
            let word = match to.char_dir {
                Direction::LeftToRight => "ltrch",
                Direction::RightToLeft => "rtlch",
            };
            self.write_control_word(word, None);
        }
        if to.font_stretch != from.font_stretch {
            self.write_control_word("charscalex", Some(to.font_stretch.percent()));
        }
    }

    /// Write an inline node whose enclosing RTF group renders as `inherited`.
    fn write_inline(&mut self, index: usize, inherited: &FormatState) -> Result<()> {
        let doc = self.doc;
        let node = &doc[index];
        if node.is_hidden() {
            return Ok(());
        }
        match node.kind {
            DocumentNodeType::Text => {
                if node.content.is_empty() {
                    return Ok(());
                }
                if node.format.char_format_eq(inherited) {
                    self.write_text(&node.content);
                } else {
                    self.write_str("{");
                    self.write_character_format(inherited, &node.format);
                    self.write_text(&node.content);
                    self.write_str("}");
                }
            },
            DocumentNodeType::LineBreak => self.write_control_word("line", None),
            DocumentNodeType::Hyperlink => self.write_hyperlink(index, inherited)?,
            DocumentNodeType::Image => self.write_image(index)?,
            DocumentNodeType::FieldBegin | DocumentNodeType::FieldEnd => {},
            _ => {
                self.write_str("{");
                self.write_character_format(inherited, &node.format);
                for child in doc.children(Some(index)) {
                    self.write_inline(child, &node.format)?;
                }
                self.write_str("}");
            },
        }
        Ok(())
    }

    fn write_hyperlink(&mut self, index: usize, inherited: &FormatState) -> Result<()> {
        let doc = self.doc;
        let node = &doc[index];
        let uri = node.navigate_uri.as_deref().unwrap_or_default();

        let mut instruction = String::from("HYPERLINK ");
        if let Some(bookmark) = uri.strip_prefix('#') {
            instruction.push_str("\\l ");
            push_quoted(&mut instruction, bookmark);
        } else {
            push_quoted(&mut instruction, uri);
        }
        if let Some(target) = node.target_name.as_deref() {
            instruction.push_str(" \\t ");
            push_quoted(&mut instruction, target);
        }

        self.write_str("{");
        self.write_control_word("field", None);
        self.write_str("{\\*");
        self.write_control_word("fldinst", None);
        self.write_str("{");
        self.write_text(&instruction);
        self.write_str("}}");

        self.write_str("{");
        self.write_control_word("fldrslt", None);
        self.write_str("{");
        self.write_character_format(inherited, &node.format);
        for child in doc.children(Some(index)) {
            self.write_inline(child, &node.format)?;
        }
        self.write_str("}}}");
        Ok(())
    }

    fn read_payload(&self, name: &str) -> Result<Vec<u8>> {
        let mut stream = self.package.get_image_stream(name)?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Embed the payload of an image node as a `\pict` group.
    fn write_image(&mut self, index: usize) -> Result<()> {
        let doc = self.doc;
        let Some(info) = doc[index].image.as_deref() else {
            return Ok(());
        };
        let data = match self.read_payload(&info.source) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("image {:?} skipped: {}", info.source, e);
                return Ok(());
            },
        };
        let Some(kind) = sniff(&data) else {
            log::warn!("image {:?} skipped: unsupported payload", info.source);
            return Ok(());
        };

        let (width, height, scale_x, scale_y) = picture_geometry(info, natural_size(&data));
        let drop = info
            .baseline_offset
            .map(|baseline| px_to_half_points(height * scale_y - baseline))
            .filter(|&dn| dn > 0);

        if let Some(dn) = drop {
            self.write_str("{");
            self.write_control_word("dn", Some(dn));
        }
        self.write_str("{");
        self.write_control_word("pict", None);
        self.write_control_word(kind.control_word(), None);
        self.write_control_word("picw", Some(round_half_up(width)));
        self.write_control_word("pich", Some(round_half_up(height)));
        self.write_control_word("picwgoal", Some(px_to_twips(width)));
        self.write_control_word("pichgoal", Some(px_to_twips(height)));
        self.write_control_word("picscalex", Some(round_half_up(scale_x * 100.0)));
        self.write_control_word("picscaley", Some(round_half_up(scale_y * 100.0)));
        self.write_hex_payload(&data);
        self.write_str("}");
        if drop.is_some() {
            self.write_str("}");
        }
        Ok(())
    }

    fn write_hex_payload(&mut self, data: &[u8]) {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        self.out.reserve(data.len() * 2 + data.len() / (HEX_LINE / 2) + 2);
        for line in data.chunks(HEX_LINE / 2) {
            self.out.push('\n');
            for &b in line {
                self.out.push(HEX[(b >> 4) as usize] as char);
                self.out.push(HEX[(b & 0x0F) as usize] as char);
            }
        }
        self.delimit = false;
    }

    fn write_list(&mut self, list: usize, depth: usize) -> Result<()> {
        let doc = self.doc;
        for child in doc.children(Some(list)) {
            self.write_block(child, depth)?;
        }
        Ok(())
    }

    fn write_list_item(&mut self, item: usize, depth: usize) -> Result<()> {
        let doc = self.doc;
        let mut labelled = false;
        for child in doc.children(Some(item)) {
            match doc[child].kind {
                DocumentNodeType::Paragraph => {
                    let mark = if labelled {
                        ListMark::Continue
                    } else {
                        labelled = true;
                        ListMark::Label(doc[item].list_label.clone().unwrap_or_default())
                    };
                    self.write_paragraph(child, depth, Some(&mark), ParagraphEnd::Par)?;
                },
                DocumentNodeType::List => {
                    labelled = true;
                    self.write_list(child, depth)?;
                },
                _ => self.write_block(child, depth)?,
            }
        }
        Ok(())
    }

    /// Write a table whose cells sit at nesting `depth` (1 for top level).
    fn write_table(&mut self, table: usize, depth: usize) -> Result<()> {
        let doc = self.doc;
        let rows = table_rows(doc, table);
        let grid = layout_rows(doc, &rows);
        let used = grid
            .iter()
            .filter_map(|slots| slots.last().map(|s| s.col + s.span))
            .max()
            .unwrap_or(0);
        let bounds = column_bounds(&doc[table].columns, used.max(doc[table].columns.len()));

        for slots in grid.iter().filter(|slots| !slots.is_empty()) {
            if depth == 1 {
                self.write_row_definition(slots, &bounds);
            }
            for slot in slots {
                if slot.continuation {
                    self.write_empty_cell(depth);
                } else {
                    self.write_cell(slot.cell, depth)?;
                }
            }
            if depth == 1 {
                self.write_control_word("row", None);
                self.write_str("\n");
            } else {
                self.write_str("{\\*");
                self.write_control_word("nesttableprops", None);
                self.write_row_definition(slots, &bounds);
                self.write_control_word("nestrow", None);
                self.write_str("}{");
                self.write_control_word("nonesttables", None);
                self.write_control_word("par", None);
                self.write_str("}\n");
            }
        }
        Ok(())
    }

    fn write_row_definition(&mut self, slots: &[Slot], bounds: &[i64]) {
        let doc = self.doc;
        self.write_control_word("trowd", None);
        self.write_control_word("trgaph", Some(CELL_GAP));
        self.write_control_word("trleft", Some(0));
        for slot in slots {
            let node = &doc[slot.cell];
            if slot.continuation {
                self.write_control_word("clvmrg", None);
            } else if node.row_span > 1 {
                self.write_control_word("clvmgf", None);
            }
            self.write_cell_format(&node.format.cell);
            let right = bounds.get(slot.col + slot.span).copied().unwrap_or_default();
            self.write_control_word("cellx", Some(right));
        }
    }

    fn write_cell_format(&mut self, cell: &CellFormat) {
        match cell.valign {
            VerticalAlignment::Top => {},
            VerticalAlignment::Center => self.write_control_word("clvertalc", None),
            VerticalAlignment::Bottom => self.write_control_word("clvertalb", None),
        }
        self.write_borders(["clbrdrl", "clbrdrt", "clbrdrr", "clbrdrb"], &cell.borders);
        for (side, value) in ["l", "t", "r", "b"].into_iter().zip(cell.padding) {
            if value != 0 {
                let mut word = String::from("clpad");
                word.push_str(side);
                self.write_control_word(&word, Some(value));
                word.insert(5, 'f');
                self.write_control_word(&word, Some(3));
            }
        }
        if cell.background > 0 {
            self.write_control_word("clcbpat", Some(cell.background));
        }
    }

    fn write_cell(&mut self, cell: usize, depth: usize) -> Result<()> {
        let doc = self.doc;
        let children = doc.children(Some(cell));
        let last = children.last().copied();
        for child in children {
            if Some(child) == last && doc[child].kind == DocumentNodeType::Paragraph {
                return self.write_paragraph(child, depth, None, ParagraphEnd::cell(depth));
            }
            self.write_block(child, depth)?;
        }
        self.write_empty_cell(depth);
        Ok(())
    }

    /// Close a cell that does not end in a paragraph of its own.
    fn write_empty_cell(&mut self, depth: usize) {
        self.write_str("{");
        self.write_control_word("pard", None);
        self.write_control_word("plain", None);
        self.write_control_word("intbl", None);
        self.write_control_word("itap", Some(depth as i64));
        self.write_control_word(ParagraphEnd::cell(depth).control_word(), None);
        self.write_str("}\n");
    }
}

/// Quote a field argument, escaping backslashes and quotes.
fn push_quoted(buf: &mut String, value: &str) {
    buf.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            buf.push('\\');
        }
        buf.push(c);
    }
    buf.push('"');
}

#[inline]
fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Declared picture size in pixels and the scale that renders it at the
/// markup's layout size.
fn picture_geometry(info: &ImageInfo, natural: Option<(u32, u32)>) -> (f64, f64, f64, f64) {
    match natural.filter(|&(w, h)| w > 0 && h > 0) {
        Some((w, h)) => {
            let natural = (w as f64, h as f64);
            let available = (positive(info.width), positive(info.height));
            let (sx, sy) = compute_scale(natural, available, info.stretch, info.stretch_direction);
            (natural.0, natural.1, sx, sy)
        },
        None => (info.width.max(1.0), info.height.max(1.0), 1.0, 1.0),
    }
}

/// Rows of a table, whether or not they sit in a row group.
fn table_rows(doc: &DocumentNodeArray, table: usize) -> Vec<usize> {
    let mut rows = Vec::new();
    for child in doc.children(Some(table)) {
        match doc[child].kind {
            DocumentNodeType::Row => rows.push(child),
            DocumentNodeType::TableBody => rows.extend(
                doc.children(Some(child))
                    .into_iter()
                    .filter(|&r| doc[r].kind == DocumentNodeType::Row),
            ),
            _ => {},
        }
    }
    rows
}

/// Place every cell on the column grid, inserting continuation slots where a
/// cell from an earlier row spans down.
fn layout_rows(doc: &DocumentNodeArray, rows: &[usize]) -> Vec<Vec<Slot>> {
    let mut carry: Vec<Option<Carry>> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());
    for &row in rows {
        let mut cells = doc
            .children(Some(row))
            .into_iter()
            .filter(|&c| doc[c].kind == DocumentNodeType::Cell);
        let mut slots = Vec::new();
        let mut col = 0;
        loop {
            if let Some(Some(covered)) = carry.get(col).copied() {
                slots.push(Slot {
                    cell: covered.owner,
                    col,
                    span: covered.span,
                    continuation: true,
                });
                carry[col] = (covered.rows_left > 1).then_some(Carry {
                    rows_left: covered.rows_left - 1,
                    ..covered
                });
                col += covered.span;
                continue;
            }
            if let Some(cell) = cells.next() {
                let span = doc[cell].col_span.max(1) as usize;
                let rows_down = doc[cell].row_span.max(1);
                if rows_down > 1 {
                    if carry.len() <= col {
                        carry.resize(col + 1, None);
                    }
                    carry[col] = Some(Carry {
                        rows_left: rows_down - 1,
                        span,
                        owner: cell,
                    });
                }
                slots.push(Slot {
                    cell,
                    col,
                    span,
                    continuation: false,
                });
                col += span;
                continue;
            }
            match (col..carry.len()).find(|&j| carry[j].is_some()) {
                Some(next) => col = next,
                None => break,
            }
        }
        grid.push(slots);
    }
    grid
}

/// Cumulative right boundaries: `bounds[k]` is the left edge of column `k`.
fn column_bounds(columns: &[i64], count: usize) -> Vec<i64> {
    let fallback = if count > 0 {
        (DEFAULT_TABLE_WIDTH / count as i64).max(MIN_COLUMN_WIDTH)
    } else {
        DEFAULT_TABLE_WIDTH
    };
    let mut bounds = Vec::with_capacity(count + 1);
    let mut edge = 0;
    bounds.push(edge);
    for k in 0..count {
        edge += columns.get(k).copied().filter(|&w| w > 0).unwrap_or(fallback);
        bounds.push(edge);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::MemoryImagePackage;
    use crate::rtf::reader::RtfToXamlReader;

    fn encode(xaml: &str) -> String {
        encode_with(xaml, &MemoryImagePackage::new())
    }

    fn encode_with(xaml: &str, package: &MemoryImagePackage) -> String {
        let options = ConvertOptions::default();
        XamlToRtfWriter::new(xaml, package, &options).convert().unwrap()
    }

    fn decode(rtf: &str) -> String {
        let options = ConvertOptions::default();
        let mut package = MemoryImagePackage::new();
        RtfToXamlReader::new(rtf.as_bytes(), &mut package, &options)
            .convert()
            .unwrap()
    }

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn test_prolog() {
        let rtf = encode("<Paragraph><Run>Hello</Run></Paragraph>");
        assert!(rtf.starts_with("{\\rtf1\\ansi\\ansicpg1252\\uc1\\deff0\\deftab720"));
        assert!(rtf.contains("{\\fonttbl{\\f0\\fnil Times New Roman;}}"));
        assert!(rtf.contains("{\\colortbl;}"));
        assert!(!rtf.contains("listtable"));
        assert!(rtf.ends_with('}'));
    }

    #[test]
    fn test_paragraph_group() {
        let rtf = encode("<Paragraph><Run>Hello</Run></Paragraph>");
        assert!(rtf.contains("{\\pard\\plain Hello\\par}"));
    }

    #[test]
    fn test_character_formatting() {
        let rtf = encode(
            r##"<Paragraph><Run FontWeight="Bold">Hi</Run><Run FontStyle="Italic" Foreground="#FF0000">there</Run></Paragraph>"##,
        );
        assert!(rtf.contains("{\\b Hi}"));
        assert!(rtf.contains("{\\i\\cf1 there}"));
        assert!(rtf.contains("{\\colortbl;\\red255\\green0\\blue0;}"));
    }

    #[test]
    fn test_paragraph_properties() {
        let rtf = encode(r#"<Paragraph TextAlignment="Center" Margin="10,0,0,20"><Run>x</Run></Paragraph>"#);
        assert!(rtf.contains("\\pard\\plain\\qc\\li150\\sa300 x\\par"));
    }

    #[test]
    fn test_text_escapes() {
        let rtf = encode("<Paragraph><Run>a{b}\\c\u{e9}\u{4e2d}\u{1F600}</Run></Paragraph>");
        assert!(rtf.contains("a\\{b\\}\\\\c\\'e9\\u20013?\\u-10179?\\u-8704?"));
    }

    #[test]
    fn test_line_break() {
        let rtf = encode("<Paragraph><Run>a</Run><LineBreak/><Run>b</Run></Paragraph>");
        assert!(rtf.contains("a\\line b\\par"));
    }

    #[test]
    fn test_hyperlink_field() {
        let rtf = encode(
            r#"<Paragraph><Hyperlink NavigateUri="http://x" TargetName="_blank"><Run>go</Run></Hyperlink></Paragraph>"#,
        );
        assert!(rtf.contains(
            "{\\field{\\*\\fldinst{HYPERLINK \"http://x\" \\\\t \"_blank\"}}{\\fldrslt{go}}}"
        ));
    }

    #[test]
    fn test_list_tables_and_labels() {
        let rtf = encode(
            r#"<List MarkerStyle="Decimal" StartIndex="2"><ListItem><Paragraph><Run>a</Run></Paragraph></ListItem><ListItem><Paragraph><Run>b</Run></Paragraph></ListItem></List>"#,
        );
        assert!(rtf.contains("{\\*\\listtable{\\list\\listtemplateid1{\\listlevel\\levelnfc0"));
        assert!(rtf.contains("\\levelstartat2"));
        assert!(rtf.contains("{\\listoverride\\listid1\\listoverridecount0\\ls1}"));
        assert!(rtf.contains("\\ls1\\ilvl0{\\listtext\\plain 2.\\tab}a\\par"));
        assert!(rtf.contains("{\\listtext\\plain 3.\\tab}b"));
    }

    #[test]
    fn test_override_carries_differing_nested_level() {
        let rtf = encode(concat!(
            r#"<List><ListItem><Paragraph><Run>a</Run></Paragraph><List MarkerStyle="Decimal"><ListItem><Paragraph><Run>b</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"<ListItem><Paragraph><Run>c</Run></Paragraph><List MarkerStyle="Square"><ListItem><Paragraph><Run>d</Run></Paragraph></ListItem></List></ListItem></List>"#,
        ));
        assert!(rtf.contains("{\\listoverride\\listid1\\listoverridecount0\\ls1}"));
        assert!(rtf.contains("{\\listoverride\\listid1\\listoverridecount9{\\lfolevel}{\\lfolevel\\listoverrideformat{\\listlevel\\levelnfc23"));
        assert!(rtf.contains("\\ls2\\ilvl1{\\listtext"));
        assert_eq!(rtf.matches("\\lfolevel").count(), 9);
    }

    #[test]
    fn test_second_paragraph_continues_item() {
        let rtf = encode(
            "<List><ListItem><Paragraph><Run>a</Run></Paragraph><Paragraph><Run>b</Run></Paragraph></ListItem></List>",
        );
        assert!(rtf.contains("{\\*\\pn\\pnlvlcont}b\\par"));
        let xaml = decode(&rtf);
        assert_eq!(xaml.matches("<ListItem").count(), 1);
    }

    #[test]
    fn test_table_rows() {
        let rtf = encode(
            r#"<Table><Table.Columns><TableColumn Width="100"/><TableColumn Width="50"/></Table.Columns><TableRowGroup><TableRow><TableCell><Paragraph><Run>a</Run></Paragraph></TableCell><TableCell><Paragraph><Run>b</Run></Paragraph></TableCell></TableRow></TableRowGroup></Table>"#,
        );
        assert!(rtf.contains("\\trowd\\trgaph108\\trleft0\\cellx1500\\cellx2250"));
        assert!(rtf.contains("{\\pard\\plain\\intbl\\itap1 a\\cell}"));
        assert!(rtf.contains("{\\pard\\plain\\intbl\\itap1 b\\cell}"));
        assert!(rtf.contains("\\row"));
    }

    #[test]
    fn test_nested_table_props() {
        let rtf = encode(
            "<Table><TableRowGroup><TableRow><TableCell><Table><TableRowGroup><TableRow><TableCell><Paragraph><Run>in</Run></Paragraph></TableCell></TableRow></TableRowGroup></Table></TableCell></TableRow></TableRowGroup></Table>",
        );
        assert!(rtf.contains("{\\pard\\plain\\intbl\\itap2 in\\nestcell}"));
        assert!(rtf.contains("{\\*\\nesttableprops\\trowd"));
        assert!(rtf.contains("\\nestrow}{\\nonesttables\\par}"));
        // the outer cell ends in a table, so it is closed by an empty paragraph
        assert!(rtf.contains("{\\pard\\plain\\intbl\\itap1\\cell}"));
    }

    #[test]
    fn test_row_span_continuation() {
        let rtf = encode(
            r#"<Table><TableRowGroup><TableRow><TableCell RowSpan="2"><Paragraph><Run>a</Run></Paragraph></TableCell><TableCell><Paragraph><Run>b</Run></Paragraph></TableCell></TableRow><TableRow><TableCell><Paragraph><Run>c</Run></Paragraph></TableCell></TableRow></TableRowGroup></Table>"#,
        );
        assert!(rtf.contains("\\clvmgf\\cellx4680\\cellx9360"));
        assert!(rtf.contains("\\clvmrg\\cellx4680\\cellx9360"));
    }

    #[test]
    fn test_layout_rows_column_span() {
        let rtf = encode(
            r#"<Table><TableRowGroup><TableRow><TableCell ColumnSpan="2"><Paragraph><Run>a</Run></Paragraph></TableCell></TableRow><TableRow><TableCell><Paragraph><Run>b</Run></Paragraph></TableCell><TableCell><Paragraph><Run>c</Run></Paragraph></TableCell></TableRow></TableRowGroup></Table>"#,
        );
        assert!(rtf.contains("\\trleft0\\cellx9360"));
        assert!(rtf.contains("\\trleft0\\cellx4680\\cellx9360"));
    }

    #[test]
    fn test_image_embedded_with_scale() {
        let mut package = MemoryImagePackage::new();
        let data = png_header(10, 10);
        package.insert("a.png", data);
        let rtf = encode_with(r#"<Paragraph><Image Source="a.png" Width="20"/></Paragraph>"#, &package);
        assert!(rtf.contains("{\\pict\\pngblip\\picw10\\pich10\\picwgoal150\\pichgoal150\\picscalex200\\picscaley200\n89504e47"));
    }

    #[test]
    fn test_image_baseline_becomes_drop() {
        let mut package = MemoryImagePackage::new();
        package.insert("a.png", png_header(12, 12));
        let rtf = encode_with(
            r#"<Paragraph><Image Source="a.png" TextBlock.BaselineOffset="8"/></Paragraph>"#,
            &package,
        );
        assert!(rtf.contains("{\\dn6{\\pict\\pngblip"));
    }

    #[test]
    fn test_missing_image_skipped() {
        let rtf = encode(r#"<Paragraph><Run>a</Run><Image Source="nope.png"/></Paragraph>"#);
        assert!(!rtf.contains("\\pict"));
        assert!(rtf.contains("a\\par"));
    }

    #[test]
    fn test_root_inline_content() {
        let rtf = encode("<Span><Run FontWeight=\"Bold\">x</Run></Span>");
        assert!(rtf.contains("{\\b x}"));
        assert!(!rtf.contains("\\par"));
    }

    #[test]
    fn test_column_bounds_fallback() {
        assert_eq!(column_bounds(&[1500, 0], 3), vec![0, 1500, 4620, 7740]);
        assert_eq!(column_bounds(&[], 0), vec![0]);
    }

    #[test]
    fn test_push_quoted() {
        let mut buf = String::new();
        push_quoted(&mut buf, r#"C:\a "b""#);
        assert_eq!(buf, r#""C:\\a \"b\"""#);
    }

    #[test]
    fn test_reencode_is_stable() {
        for markup in [
            "<Paragraph><Run>Hello</Run></Paragraph>",
            r#"<Paragraph><Run FontWeight="Bold">Hi</Run><Run> there</Run></Paragraph>"#,
        ] {
            let first = encode(markup);
            let second = encode(&decode(&first));
            assert_eq!(first, second, "unstable encoding of {}", markup);
        }
    }

    #[test]
    fn test_round_trip_keeps_structure() {
        let rtf = encode(
            r#"<Section><Paragraph><Run FontWeight="Bold">Hi</Run></Paragraph><List MarkerStyle="Decimal"><ListItem><Paragraph><Run>one</Run></Paragraph></ListItem></List></Section>"#,
        );
        let xaml = decode(&rtf);
        assert!(xaml.contains("FontWeight=\"Bold\""));
        assert!(xaml.contains("MarkerStyle=\"Decimal\""));
        assert!(xaml.contains(">one</Run>"));
    }
}
