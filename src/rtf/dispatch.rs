//! Control-word dispatch.
//!
//! Most control words are a single mutation of the current [`FormatState`];
//! the structural ones call into the paragraph, table, list, field and
//! picture handlers.
//!
//! [`FormatState`]: crate::document::FormatState

use super::control::Control;
use super::lexer::Token;
use super::reader::RtfToXamlReader;
use super::tables::{ColorComponent, ColorTable, List, ListLevel, ListOverride};
use crate::common::error::Result;
use crate::document::{
    BorderFormat, BorderSide, BorderTarget, Destination, Direction, DocumentNode, DocumentNodeType,
    FontStretch, MAX_LIST_DEPTH, MAX_TABLE_DEPTH, MarkerStyle, ScriptKind, StrikeKind,
    UnderlineKind,
};

/// Offset in half-points applied by `\up` / `\dn` without a parameter.
const DEFAULT_SCRIPT_OFFSET: i64 = 6;

impl<'a> RtfToXamlReader<'a> {
    pub(super) fn handle_control(&mut self, token: &Token, after_star: bool) -> Result<()> {
        let Some(info) = token.control else {
            if after_star {
                self.set_destination(Destination::Ignore);
            }
            log::trace!("unknown control word \\{}", token.text);
            return Ok(());
        };
        if after_star && !info.is_destination() {
            self.set_destination(Destination::Ignore);
            return Ok(());
        }

        let param = token.parameter;
        let dest = self.stack.top().dest;
        match info.control {
            // Document
            Control::Rtf => self.saw_rtf = true,
            Control::Ansi => self.set_document_code_page(1252),
            Control::Mac => self.set_document_code_page(10000),
            Control::Pc => self.set_document_code_page(437),
            Control::Pca => self.set_document_code_page(850),
            Control::AnsiCodePage => {
                if let Ok(code_page) = u32::try_from(param)
                    && code_page > 0
                {
                    self.set_document_code_page(code_page);
                }
            },
            Control::DefaultFont => self.default_font = param,
            Control::UnicodeSkip => self.stack.top_mut().unicode_skip = param.max(0),
            Control::Unicode => self.handle_unicode(token)?,
            Control::Upr => {
                self.set_destination(Destination::Upr);
            },
            Control::Ud => {
                let inner = self
                    .stack
                    .iter_from_top()
                    .map(|s| s.dest)
                    .find(|d| *d != Destination::Upr)
                    .unwrap_or_default();
                self.stack.top_mut().dest = inner;
            },
            Control::Bin => {
                let data = self.lexer.advance_for_binary(param);
                if dest == Destination::Picture {
                    self.picture.extend_from_slice(data);
                }
            },

            // Destinations
            Control::FontTable => {
                self.set_destination(Destination::FontTable);
            },
            Control::ColorTable => {
                if self.set_destination(Destination::ColorTable) {
                    self.tables.colors = ColorTable::new();
                }
            },
            Control::ListTable => {
                self.set_destination(Destination::ListTable);
            },
            Control::List => {
                if dest == Destination::ListTable {
                    self.stack.top_mut().dest = Destination::List;
                    self.tables.lists.add(List::new(0));
                } else {
                    self.set_destination(Destination::Ignore);
                }
            },
            Control::ListLevel => {
                if dest == Destination::List {
                    self.stack.top_mut().dest = Destination::ListLevel;
                    if let Some(list) = self.tables.lists.last_mut() {
                        list.levels.push(ListLevel::default());
                    }
                } else if dest == Destination::ListOverrideLevel {
                    self.stack.top_mut().dest = Destination::ListOverrideFormat;
                    if let Some(slot) = self
                        .tables
                        .overrides
                        .last_mut()
                        .and_then(|o| o.levels.last_mut())
                    {
                        *slot = Some(ListLevel::default());
                    }
                } else {
                    self.set_destination(Destination::Ignore);
                }
            },
            Control::ListOverrideTable => {
                self.set_destination(Destination::ListOverrideTable);
            },
            Control::ListOverride => {
                if dest == Destination::ListOverrideTable {
                    self.stack.top_mut().dest = Destination::ListOverride;
                    self.tables.overrides.add(ListOverride::new(0));
                } else {
                    self.set_destination(Destination::Ignore);
                }
            },
            Control::ListOverrideLevel => {
                if dest == Destination::ListOverride {
                    self.stack.top_mut().dest = Destination::ListOverrideLevel;
                    if let Some(entry) = self.tables.overrides.last_mut() {
                        entry.levels.push(None);
                    }
                } else {
                    self.set_destination(Destination::Ignore);
                }
            },
            Control::ListText => {
                if self.set_destination(Destination::ListText) {
                    self.list_text.clear();
                }
            },
            Control::Pn => {
                self.set_destination(Destination::Pn);
            },
            Control::Field => self.begin_field(Destination::Field),
            Control::FieldInstruction => self.begin_field(Destination::FieldInstruction),
            Control::FieldResult => self.begin_field(Destination::FieldResult),
            Control::Picture => {
                if self.set_destination(Destination::Picture) {
                    self.picture.clear();
                    self.lexer.reset_image_data();
                    let top = self.stack.top_mut();
                    top.image_format = Default::default();
                    top.pic_width = 0;
                    top.pic_height = 0;
                    top.pic_width_goal = 0;
                    top.pic_height_goal = 0;
                    top.pic_scale_x = 100;
                    top.pic_scale_y = 100;
                }
            },
            Control::Shape => {
                self.set_destination(Destination::Shape);
            },
            Control::ShapeInstruction => {
                self.set_destination(Destination::ShapeInstruction);
            },
            Control::ShapeText => {
                self.set_destination(Destination::ShapeText);
            },
            Control::ShapePicture
            | Control::NestTableProps
            | Control::ListOverrideStartAt
            | Control::ListOverrideFormat => {},
            Control::NonShapePicture | Control::NoNestTables | Control::IgnoredDestination => {
                self.set_destination(Destination::Ignore);
            },
            Control::Object => {
                self.set_destination(Destination::Object);
            },
            Control::ObjectResult => {
                let outer = self
                    .stack
                    .iter_from_top()
                    .map(|s| s.dest)
                    .find(|d| d.is_content())
                    .unwrap_or_default();
                self.set_destination(outer);
            },

            // Font table
            Control::Font => {
                if matches!(dest, Destination::FontTable | Destination::FontEntry) {
                    self.tables.fonts.define(param);
                    let top = self.stack.top_mut();
                    top.font = param;
                    top.dest = Destination::FontEntry;
                } else {
                    self.select_font(param);
                }
            },
            Control::FontCharset => {
                if dest == Destination::FontEntry {
                    let id = self.stack.top().font;
                    if let Some(font) = self.tables.fonts.get_mut(id) {
                        font.set_charset(param);
                    }
                    if let Some(code_page) = self.tables.fonts.get(id).and_then(|f| f.code_page) {
                        self.stack.top_mut().code_page = code_page;
                    }
                }
            },
            Control::FontCodePage => {
                if dest == Destination::FontEntry
                    && let Ok(code_page) = u32::try_from(param)
                    && code_page > 0
                {
                    let id = self.stack.top().font;
                    if let Some(font) = self.tables.fonts.get_mut(id) {
                        font.code_page = Some(code_page);
                    }
                    self.stack.top_mut().code_page = code_page;
                }
            },
            Control::FontFamily(family) => {
                if dest == Destination::FontEntry {
                    let id = self.stack.top().font;
                    if let Some(font) = self.tables.fonts.get_mut(id) {
                        font.family = family;
                    }
                }
            },

            // Color table
            Control::Red => self.set_color_component(ColorComponent::Red, param),
            Control::Green => self.set_color_component(ColorComponent::Green, param),
            Control::Blue => self.set_color_component(ColorComponent::Blue, param),

            // Character
            Control::Plain => {
                self.stack.top_mut().reset_character();
                self.select_default_font();
            },
            Control::Bold => self.stack.top_mut().bold = token.is_on(),
            Control::Italic => self.stack.top_mut().italic = token.is_on(),
            Control::Underline(kind) => {
                self.stack.top_mut().underline =
                    if token.is_on() { kind } else { UnderlineKind::None };
            },
            Control::UnderlineNone => self.stack.top_mut().underline = UnderlineKind::None,
            Control::Strike => {
                self.stack.top_mut().strike =
                    if token.is_on() { StrikeKind::Single } else { StrikeKind::None };
            },
            Control::StrikeDouble => {
                self.stack.top_mut().strike =
                    if token.is_on() { StrikeKind::Double } else { StrikeKind::None };
            },
            Control::Super => {
                self.stack.top_mut().script =
                    if token.is_on() { ScriptKind::Super } else { ScriptKind::Normal };
            },
            Control::Sub => {
                self.stack.top_mut().script =
                    if token.is_on() { ScriptKind::Sub } else { ScriptKind::Normal };
            },
            Control::NoSuperSub => {
                let top = self.stack.top_mut();
                top.script = ScriptKind::Normal;
                top.script_offset = 0;
            },
            Control::Up => {
                let offset = if token.has_parameter { param } else { DEFAULT_SCRIPT_OFFSET };
                self.stack.top_mut().script_offset = -offset;
            },
            Control::Down => {
                let offset = if token.has_parameter { param } else { DEFAULT_SCRIPT_OFFSET };
                self.stack.top_mut().script_offset = offset;
            },
            Control::ForeColor => self.stack.top_mut().foreground = param,
            Control::BackColor => self.stack.top_mut().background = param,
            Control::FontSize => {
                if param > 0 {
                    self.stack.top_mut().font_size = param;
                }
            },
            Control::Hidden => self.stack.top_mut().hidden = token.is_on(),
            Control::Engrave => self.stack.top_mut().engrave = token.is_on(),
            Control::Outline => self.stack.top_mut().outline = token.is_on(),
            Control::Shadow => self.stack.top_mut().shadow = token.is_on(),
            Control::Lang => self.stack.top_mut().lang = param,
            Control::LangFe => self.stack.top_mut().lang_fe = param,
            Control::RtlChar => self.stack.top_mut().char_dir = Direction::RightToLeft,
            Control::LtrChar => self.stack.top_mut().char_dir = Direction::LeftToRight,
            Control::CharScale => self.stack.top_mut().font_stretch = FontStretch::from_percent(param),

            // Paragraph
            Control::Par => self.handle_para()?,
            Control::Pard => self.stack.top_mut().reset_paragraph(),
            Control::Align(align) => self.stack.top_mut().align = align,
            Control::LeftIndent => self.stack.top_mut().li = param,
            Control::RightIndent => self.stack.top_mut().ri = param,
            Control::FirstIndent => self.stack.top_mut().fi = param,
            Control::SpaceBefore => self.stack.top_mut().sb = param,
            Control::SpaceAfter => self.stack.top_mut().sa = param,
            Control::LineSpacing => self.stack.top_mut().sl = param,
            Control::LineMultiple => self.stack.top_mut().sl_mult = token.is_on(),
            Control::RtlPar => self.stack.top_mut().para_dir = Direction::RightToLeft,
            Control::LtrPar => self.stack.top_mut().para_dir = Direction::LeftToRight,
            Control::Border(target) => self.stack.top_mut().border_target = target,
            Control::BorderStyle(kind) => self.apply_border(|b| b.kind = kind),
            Control::BorderWidth => self.apply_border(|b| b.width = param),
            Control::BorderColor => self.apply_border(|b| b.color = param),
            Control::ParaShading => self.stack.top_mut().para_shading = param,
            Control::Line => {
                let top = self.stack.top();
                if top.dest.is_content() && !top.hidden {
                    let node = DocumentNode::leaf(DocumentNodeType::LineBreak, top.clone());
                    self.doc.push(node);
                }
            },
            Control::Page | Control::Sect => {
                if self.inline_run_start().is_some() {
                    self.handle_para()?;
                }
            },
            Control::Sectd => {},
            Control::Symbol(ch) => {
                let mut buf = [0u8; 4];
                self.handle_text(ch.encode_utf8(&mut buf))?;
            },

            // Lists
            Control::ListIndex => {
                if dest == Destination::ListOverride {
                    if let Some(entry) = self.tables.overrides.last_mut() {
                        entry.index = param;
                    }
                } else {
                    self.stack.top_mut().ils = param;
                }
            },
            Control::ListLevelIndex => self.stack.top_mut().ilvl = param,
            Control::ListId => match dest {
                Destination::List => {
                    if let Some(list) = self.tables.lists.last_mut() {
                        list.id = param;
                    }
                },
                Destination::ListOverride => {
                    if let Some(entry) = self.tables.overrides.last_mut() {
                        entry.list_id = param;
                    }
                },
                _ => {},
            },
            Control::LevelNfc => {
                if let Some(level) = self.level_in_progress(dest) {
                    level.marker = MarkerStyle::from_nfc(param);
                }
            },
            Control::LevelStartAt => match dest {
                Destination::ListLevel | Destination::ListOverrideFormat => {
                    if let Some(level) = self.level_in_progress(dest) {
                        level.start_at = param;
                    }
                },
                Destination::ListOverride | Destination::ListOverrideLevel => {
                    if let Some(entry) = self.tables.overrides.last_mut() {
                        entry.start_override = Some(param);
                    }
                },
                _ => {},
            },
            Control::PnLevel => {
                if !(1..=MAX_LIST_DEPTH).contains(&param) {
                    self.absorb(format!("list level {} out of range", param))?;
                }
                self.stack.top_mut().pn_level = param.clamp(1, MAX_LIST_DEPTH);
            },
            Control::PnLevelBullet => {
                let top = self.stack.top_mut();
                top.pn_level = top.pn_level.max(1);
                top.marker = MarkerStyle::Disc;
            },
            Control::PnLevelBody => {
                let top = self.stack.top_mut();
                top.pn_level = top.pn_level.max(1);
                top.marker = MarkerStyle::Decimal;
            },
            Control::PnLevelCont => self.stack.top_mut().is_continue = true,
            Control::PnFormat(marker) => self.stack.top_mut().marker = marker,
            Control::PnStart => self.stack.top_mut().start_index = param,

            // Tables
            Control::RowDefaults => self.stack.top_mut().reset_row(),
            Control::Row | Control::NestRow => self.handle_row()?,
            Control::Cell | Control::NestCell => self.handle_cell()?,
            Control::CellX => self.stack.top_mut().row_format.commit_cell(param),
            Control::InTable => self.stack.top_mut().in_table = true,
            Control::Itap => {
                if param > MAX_TABLE_DEPTH {
                    self.absorb(format!("table depth {} out of range", param))?;
                }
                self.stack.top_mut().itap = param.clamp(0, MAX_TABLE_DEPTH);
            },
            Control::RowLeft => self.stack.top_mut().row_format.left = param,
            Control::RowGap => self.stack.top_mut().row_format.gap = param,
            Control::RowHeight => self.stack.top_mut().row_format.height = param,
            Control::RowPadding(side) => {
                self.stack.top_mut().row_format.padding[side.index()] = param;
            },
            Control::CellPadding(side) => {
                self.stack.top_mut().row_format.pending_cell.padding[side.index()] = param;
            },
            Control::CellShading => {
                self.stack.top_mut().row_format.pending_cell.background = param;
            },
            Control::CellVMergeFirst => {
                self.stack.top_mut().row_format.pending_cell.vmerge_first = true;
            },
            Control::CellVMerge => self.stack.top_mut().row_format.pending_cell.vmerge_cont = true,
            Control::CellHMergeFirst => {
                self.stack.top_mut().row_format.pending_cell.hmerge_first = true;
            },
            Control::CellHMerge => self.stack.top_mut().row_format.pending_cell.hmerge_cont = true,
            Control::CellVAlign(valign) => {
                self.stack.top_mut().row_format.pending_cell.valign = valign;
            },
            Control::RtlRow => self.stack.top_mut().row_format.dir = Direction::RightToLeft,
            Control::LtrRow => self.stack.top_mut().row_format.dir = Direction::LeftToRight,

            // Pictures
            Control::PicWidth => self.stack.top_mut().pic_width = param,
            Control::PicHeight => self.stack.top_mut().pic_height = param,
            Control::PicGoalWidth => self.stack.top_mut().pic_width_goal = param,
            Control::PicGoalHeight => self.stack.top_mut().pic_height_goal = param,
            Control::PicScaleX => self.stack.top_mut().pic_scale_x = param,
            Control::PicScaleY => self.stack.top_mut().pic_scale_y = param,
            Control::PicFormat(format) => self.stack.top_mut().image_format = format,
        }
        Ok(())
    }

    /// Switch the current group's destination. Inside a discarded group
    /// nothing changes; returns whether the switch happened.
    pub(super) fn set_destination(&mut self, dest: Destination) -> bool {
        let top = self.stack.top_mut();
        if top.dest == Destination::Ignore {
            return false;
        }
        top.dest = dest;
        true
    }

    fn set_document_code_page(&mut self, code_page: u32) {
        self.doc_code_page = code_page;
        self.stack.top_mut().code_page = code_page;
    }

    fn set_color_component(&mut self, component: ColorComponent, value: i64) {
        if self.stack.top().dest == Destination::ColorTable {
            self.tables.colors.set_component(component, value);
        }
    }

    /// The list level format `\levelnfc` and `\levelstartat` apply to in
    /// destination `dest`.
    fn level_in_progress(&mut self, dest: Destination) -> Option<&mut ListLevel> {
        match dest {
            Destination::ListLevel => self.tables.lists.last_mut()?.levels.last_mut(),
            Destination::ListOverrideFormat => {
                self.tables.overrides.last_mut()?.levels.last_mut()?.as_mut()
            },
            _ => None,
        }
    }

    /// Open a field scope: a begin marker tagged with the field part.
    fn begin_field(&mut self, dest: Destination) {
        if self.set_destination(dest) {
            let node = DocumentNode::leaf(DocumentNodeType::FieldBegin, self.stack.top().clone());
            self.doc.push(node);
            self.open_fields += 1;
        }
    }

    /// Apply a border property to whatever the last `\brdrX`-style word
    /// selected.
    fn apply_border(&mut self, apply: impl Fn(&mut BorderFormat)) {
        let top = self.stack.top_mut();
        match top.border_target {
            BorderTarget::None => {},
            BorderTarget::Paragraph(side) => apply(top.para_borders.side_mut(side)),
            BorderTarget::ParagraphBox => {
                for side in BorderSide::ALL {
                    apply(top.para_borders.side_mut(side));
                }
            },
            BorderTarget::Row(side) => apply(top.row_format.borders.side_mut(side)),
            BorderTarget::Cell(side) => apply(top.row_format.pending_cell.borders.side_mut(side)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{BorderKind, DocumentNodeType, MarkerStyle, TextAlignment};
    use crate::rtf::reader::tests::decode;

    #[test]
    fn test_character_properties() {
        let (doc, _) = decode(br"{\rtf1{\i\ul\strike\super\fs40\cf2 x}}");
        let f = &doc[0].format;
        assert!(f.italic);
        assert_eq!(f.underline, crate::document::UnderlineKind::Single);
        assert_eq!(f.strike, crate::document::StrikeKind::Single);
        assert_eq!(f.script, crate::document::ScriptKind::Super);
        assert_eq!(f.font_size, 40);
        assert_eq!(f.foreground, 2);
    }

    #[test]
    fn test_script_toggles_off_with_zero_parameter() {
        use crate::document::ScriptKind;
        let (doc, _) = decode(br"{\rtf1 {\super a\super0 b\sub c\sub0 d}}");
        let scripts: Vec<(&str, ScriptKind)> =
            doc.iter().map(|n| (n.content.as_str(), n.format.script)).collect();
        assert_eq!(
            scripts,
            [
                ("a", ScriptKind::Super),
                ("b", ScriptKind::Normal),
                ("c", ScriptKind::Sub),
                ("d", ScriptKind::Normal),
            ]
        );
    }

    #[test]
    fn test_paragraph_properties_and_box_border() {
        let (doc, _) = decode(br"{\rtf1\pard\qc\li360\sb120\box\brdrs\brdrw30 x\par}");
        let para = &doc[0];
        assert_eq!(para.kind, DocumentNodeType::Paragraph);
        assert_eq!(para.format.align, TextAlignment::Center);
        assert_eq!(para.format.li, 360);
        assert_eq!(para.format.sb, 120);
        assert_eq!(para.format.para_borders.top.kind, BorderKind::Single);
        assert_eq!(para.format.para_borders.left.width, 30);
    }

    #[test]
    fn test_pard_resets_paragraph() {
        let (doc, _) = decode(br"{\rtf1\qc a\par\pard b\par}");
        assert_eq!(doc[0].format.align, TextAlignment::Center);
        assert_eq!(doc[2].format.align, TextAlignment::Left);
    }

    #[test]
    fn test_plain_restores_default_font() {
        let (doc, _) = decode(br"{\rtf1\deff0{\fonttbl{\f0 Arial;}{\f1 Courier;}}\f1\b a\plain b}");
        assert_eq!(doc[0].format.font, 1);
        assert!(doc[0].format.bold);
        assert_eq!(doc[1].format.font, 0);
        assert!(!doc[1].format.bold);
    }

    #[test]
    fn test_list_tables_are_read() {
        let mut package = crate::images::MemoryImagePackage::new();
        let options = crate::options::ConvertOptions::default();
        let input = br"{\rtf1{\*\listtable{\list\listid7{\listlevel\levelnfc4\levelstartat3}}}{\*\listoverridetable{\listoverride\listid7\ls2}}}";
        let mut reader = crate::rtf::RtfToXamlReader::new(input, &mut package, &options);
        reader.process().unwrap();
        let tables = reader.tables();
        let list = tables.lists.get(7).unwrap();
        assert_eq!(list.levels[0].marker, MarkerStyle::LowerLatin);
        assert_eq!(list.levels[0].start_at, 3);
        assert_eq!(tables.overrides.get(2).map(|o| o.list_id), Some(7));
    }

    #[test]
    fn test_old_style_numbering_copied_from_pn_group() {
        let (doc, xaml) = decode(br"{\rtf1{\*\pn\pnlvlbody\pnucrm\pnstart4}one\par}");
        assert_eq!(doc[0].kind, DocumentNodeType::List);
        assert_eq!(doc[0].format.marker, MarkerStyle::UpperRoman);
        assert!(xaml.contains(r#"MarkerStyle="UpperRoman""#));
        assert!(xaml.contains(r#"StartIndex="4""#));
    }

    #[test]
    fn test_binary_picture_payload() {
        let mut package = crate::images::MemoryImagePackage::new();
        let options = crate::options::ConvertOptions::default();
        let input = b"{\\rtf1{\\pict\\jpegblip\\picwgoal150\\pichgoal150\\bin4 \xFF\xD8\xFF\xD9}}";
        let mut reader = crate::rtf::RtfToXamlReader::new(input, &mut package, &options);
        reader.process().unwrap();
        assert_eq!(reader.document()[0].kind, DocumentNodeType::Image);
        assert_eq!(package.get("Image1.jpg"), Some(&b"\xFF\xD8\xFF\xD9"[..]));
    }
}
