//! Markup events to document tree.
//!
//! [`XamlTreeBuilder`] receives push-parser events and builds the same
//! [`DocumentNodeArray`] the RTF reader produces. Each element pushes a
//! [`FormatState`] derived from its parent's; attributes map onto state
//! fields, so nodes opened inside an element capture everything it set.
//!
//! Property elements (`Table.Columns`, `Image.Source`, ...) are
//! transparent. `Figure` and `Floater` subtrees are dropped.

use super::lists;
use super::parser::{Attributes, XamlHandler, parse};
use super::tags::{
    ATTRIBUTES, ELEMENTS, XamlAttribute, XamlElement, language_id, parse_color,
    parse_font_stretch, parse_marker_style, parse_stretch, parse_stretch_direction,
    parse_text_alignment,
};
use crate::common::error::{Error, Result};
use crate::common::unit::{parse_length_px, parse_thickness_px, px_to_half_points, px_to_twips};
use crate::document::{
    BorderFormat, BorderKind, Borders, CellFormat, Direction, DocumentNode, DocumentNodeArray,
    DocumentNodeType, FormatStack, FormatState, ImageInfo, MarkerStyle, ScriptKind, StrikeKind,
    UnderlineKind,
};
use crate::options::ConvertOptions;
use crate::rtf::wrap_stray_inlines;
use crate::rtf::tables::{ColorTable, LookupTables};

/// Build a tree from flow-document markup.
pub fn build_tree(xaml: &str, options: &ConvertOptions) -> Result<(DocumentNodeArray, LookupTables)> {
    let mut builder = XamlTreeBuilder::new(options);
    parse(xaml, &mut builder)?;
    builder.finish()
}

/// One open element.
#[derive(Debug, Clone)]
struct Frame {
    element: Option<XamlElement>,
    /// Node this element opened, closed with it
    node: Option<usize>,
    /// Property element such as `Table.Columns`
    property: bool,
    preserve_space: bool,
}

pub struct XamlTreeBuilder<'a> {
    options: &'a ConvertOptions,
    stack: FormatStack,
    doc: DocumentNodeArray,
    tables: LookupTables,
    frames: Vec<Frame>,
    /// Open elements inside a dropped subtree
    skip_depth: usize,
    /// Image node awaiting a `BitmapImage` source
    image: Option<usize>,
}

impl<'a> XamlTreeBuilder<'a> {
    pub fn new(options: &'a ConvertOptions) -> Self {
        let mut tables = LookupTables {
            colors: ColorTable::with_auto(),
            ..LookupTables::default()
        };
        let font = tables.fonts.find_or_add(&options.default_font_name);
        let base = FormatState {
            font,
            code_page: options.default_code_page,
            ..FormatState::default()
        };
        Self {
            options,
            stack: FormatStack::new(base),
            doc: DocumentNodeArray::new(),
            tables,
            frames: Vec::new(),
            skip_depth: 0,
            image: None,
        }
    }

    #[inline]
    pub fn document(&self) -> &DocumentNodeArray {
        &self.doc
    }

    /// Close every open node, repair stray inline content and derive the
    /// list tables.
    pub fn finish(mut self) -> Result<(DocumentNodeArray, LookupTables)> {
        if !self.frames.is_empty() {
            self.absorb("unclosed elements at end of markup")?;
        }
        self.doc.close_all();
        wrap_stray_inlines(&mut self.doc);
        self.doc.coalesce_all();
        if let Err(e) = self.doc.validate() {
            self.absorb(format!("inconsistent tree: {}", e))?;
        }
        lists::synthesize(&mut self.doc, &mut self.tables);
        log::trace!("markup built {} nodes", self.doc.len());
        Ok((self.doc, self.tables))
    }

    fn absorb(&self, what: impl Into<String>) -> Result<()> {
        let what = what.into();
        if self.options.strict {
            return Err(Error::Rejected(what));
        }
        log::debug!("absorbed: {}", what);
        Ok(())
    }

    /// Innermost element that is not a property element.
    fn owner(&self) -> Option<(usize, Option<XamlElement>)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| !f.property)
            .map(|(i, f)| (i, f.element))
    }

    fn preserve_space(&self) -> bool {
        self.frames.last().is_some_and(|f| f.preserve_space)
    }

    /// Properties a child element does not inherit from its parent.
    fn reset_local_properties(state: &mut FormatState) {
        state.li = 0;
        state.ri = 0;
        state.fi = 0;
        state.sb = 0;
        state.sa = 0;
        state.para_borders = Borders::default();
        state.para_shading = -1;
        state.cell = CellFormat::new();
        state.ils = 0;
        state.ilvl = 0;
    }

    fn apply_attributes(&mut self, element: Option<XamlElement>, attributes: &Attributes) {
        for (name, value) in attributes.iter() {
            let Some(&attribute) = ATTRIBUTES.get(name) else {
                continue;
            };
            self.apply_attribute(element, attribute, value);
        }
    }

    fn apply_attribute(&mut self, element: Option<XamlElement>, attribute: XamlAttribute, value: &str) {
        let is_paragraph = matches!(element, Some(XamlElement::Paragraph | XamlElement::BlockUIContainer));
        let is_cell = element == Some(XamlElement::TableCell);
        let is_list = matches!(element, Some(XamlElement::List | XamlElement::ListItem));

        match attribute {
            XamlAttribute::FontFamily => {
                let family = value.split(',').next().unwrap_or("").trim();
                if !family.is_empty() {
                    let font = self.tables.fonts.find_or_add(family);
                    self.stack.top_mut().font = font;
                }
            },
            XamlAttribute::FontSize => {
                if let Some(px) = parse_length_px(value).filter(|px| *px > 0.0) {
                    self.stack.top_mut().font_size = px_to_half_points(px);
                }
            },
            XamlAttribute::FontWeight => self.stack.top_mut().bold = is_bold_weight(value),
            XamlAttribute::FontStyle => {
                let style = value.trim().to_ascii_lowercase();
                self.stack.top_mut().italic = style == "italic" || style == "oblique";
            },
            XamlAttribute::FontStretch => {
                if let Some(stretch) = parse_font_stretch(value) {
                    self.stack.top_mut().font_stretch = stretch;
                }
            },
            XamlAttribute::Foreground => {
                if let Some(color) = parse_color(value) {
                    let index = self.tables.colors.find_or_add(color);
                    self.stack.top_mut().foreground = index;
                }
            },
            XamlAttribute::Background => {
                let Some(color) = parse_color(value) else {
                    return;
                };
                let index = self.tables.colors.find_or_add(color);
                let top = self.stack.top_mut();
                if is_paragraph {
                    top.para_shading = index;
                } else if is_cell {
                    top.cell.background = index;
                } else if !is_list && element != Some(XamlElement::Table) {
                    top.background = index;
                }
            },
            XamlAttribute::TextDecorations => {
                let value = value.to_ascii_lowercase();
                let top = self.stack.top_mut();
                top.underline = if value.contains("underline") {
                    UnderlineKind::Single
                } else {
                    UnderlineKind::None
                };
                top.strike = if value.contains("strikethrough") {
                    StrikeKind::Single
                } else {
                    StrikeKind::None
                };
            },
            XamlAttribute::TypographyVariants | XamlAttribute::BaselineAlignment => {
                let script = match value.trim().to_ascii_lowercase().as_str() {
                    "superscript" | "super" => ScriptKind::Super,
                    "subscript" | "sub" => ScriptKind::Sub,
                    _ => ScriptKind::Normal,
                };
                self.stack.top_mut().script = script;
            },
            XamlAttribute::Language => {
                if let Some(lang) = language_id(value) {
                    self.stack.top_mut().lang = lang;
                }
            },
            XamlAttribute::FlowDirection => {
                let dir = if value.trim().eq_ignore_ascii_case("RightToLeft") {
                    Direction::RightToLeft
                } else {
                    Direction::LeftToRight
                };
                let top = self.stack.top_mut();
                top.char_dir = dir;
                top.para_dir = dir;
            },
            XamlAttribute::TextAlignment => {
                if let Some(align) = parse_text_alignment(value) {
                    self.stack.top_mut().align = align;
                }
            },
            XamlAttribute::TextIndent => {
                if let Some(px) = parse_length_px(value) {
                    self.stack.top_mut().fi = px_to_twips(px);
                }
            },
            XamlAttribute::Margin => {
                let Some([l, t, r, b]) = parse_thickness_px(value) else {
                    return;
                };
                let top = self.stack.top_mut();
                if is_paragraph {
                    top.li = px_to_twips(l);
                    top.sb = px_to_twips(t);
                    top.ri = px_to_twips(r);
                    top.sa = px_to_twips(b);
                } else if is_list {
                    top.li += px_to_twips(l);
                }
            },
            XamlAttribute::Padding => {
                let Some(px) = parse_thickness_px(value) else {
                    return;
                };
                let top = self.stack.top_mut();
                if is_cell {
                    top.cell.padding = px.map(px_to_twips);
                } else if is_list {
                    top.li += px_to_twips(px[0]);
                }
            },
            XamlAttribute::LineHeight => {
                if let Some(px) = parse_length_px(value).filter(|px| *px > 0.0) {
                    let top = self.stack.top_mut();
                    top.sl = px_to_twips(px);
                    top.sl_mult = false;
                }
            },
            XamlAttribute::BorderThickness => {
                let Some(px) = parse_thickness_px(value) else {
                    return;
                };
                let top = self.stack.top_mut();
                let borders = if is_cell {
                    &mut top.cell.borders
                } else if is_paragraph {
                    &mut top.para_borders
                } else {
                    return;
                };
                set_border_widths(borders, px);
            },
            XamlAttribute::BorderBrush => {
                let Some(color) = parse_color(value) else {
                    return;
                };
                let index = self.tables.colors.find_or_add(color);
                let top = self.stack.top_mut();
                let borders = if is_cell {
                    &mut top.cell.borders
                } else if is_paragraph {
                    &mut top.para_borders
                } else {
                    return;
                };
                for side in [
                    &mut borders.left,
                    &mut borders.top,
                    &mut borders.right,
                    &mut borders.bottom,
                ] {
                    side.color = index;
                }
            },
            XamlAttribute::MarkerStyle => {
                if let Some(marker) = parse_marker_style(value) {
                    self.stack.top_mut().marker = marker;
                }
            },
            XamlAttribute::StartIndex => {
                if let Ok(start) = value.trim().parse::<i64>() {
                    self.stack.top_mut().start_index = start.max(0);
                }
            },
            // Element-specific, read when the node is opened
            XamlAttribute::ColumnSpan
            | XamlAttribute::RowSpan
            | XamlAttribute::Width
            | XamlAttribute::Height
            | XamlAttribute::Stretch
            | XamlAttribute::StretchDirection
            | XamlAttribute::Source
            | XamlAttribute::UriSource
            | XamlAttribute::NavigateUri
            | XamlAttribute::TargetName
            | XamlAttribute::Location
            | XamlAttribute::BaselineOffset => {},
        }
    }

    fn push_node(&mut self, kind: DocumentNodeType) -> usize {
        let node = DocumentNode::new(kind, self.stack.top().clone());
        self.doc.push(node)
    }

    /// Create the node for a just-entered element.
    fn open_element(&mut self, element: Option<XamlElement>, attributes: &Attributes) -> Option<usize> {
        let element = element?;
        match element {
            XamlElement::Span | XamlElement::Bold | XamlElement::Italic | XamlElement::Underline => {
                Some(self.push_node(DocumentNodeType::Span))
            },
            XamlElement::Hyperlink => {
                let index = self.push_node(DocumentNodeType::Hyperlink);
                let node = &mut self.doc[index];
                node.navigate_uri = attributes.get("NavigateUri").map(str::to_string);
                node.target_name = attributes.get("TargetName").map(str::to_string);
                Some(index)
            },
            XamlElement::LineBreak => {
                self.doc.push(DocumentNode::leaf(DocumentNodeType::LineBreak, self.stack.top().clone()));
                None
            },
            XamlElement::Paragraph | XamlElement::BlockUIContainer => {
                Some(self.push_node(DocumentNodeType::Paragraph))
            },
            XamlElement::List => Some(self.push_node(DocumentNodeType::List)),
            XamlElement::ListItem => Some(self.push_node(DocumentNodeType::ListItem)),
            XamlElement::Table => Some(self.push_node(DocumentNodeType::Table)),
            XamlElement::TableRowGroup => Some(self.push_node(DocumentNodeType::TableBody)),
            XamlElement::TableRow => Some(self.push_node(DocumentNodeType::Row)),
            XamlElement::TableCell => {
                let index = self.push_node(DocumentNodeType::Cell);
                let node = &mut self.doc[index];
                node.col_span = span_attribute(attributes.get("ColumnSpan"));
                node.row_span = span_attribute(attributes.get("RowSpan"));
                Some(index)
            },
            XamlElement::TableColumn => {
                let width = attributes
                    .get("Width")
                    .and_then(parse_length_px)
                    .map_or(0, px_to_twips);
                if let Some(table) = self.doc.last_pending(DocumentNodeType::Table) {
                    self.doc[table].columns.push(width.max(0));
                }
                None
            },
            XamlElement::Image => {
                let info = ImageInfo {
                    source: attributes.get("Source").unwrap_or("").to_string(),
                    width: attributes.get("Width").and_then(parse_length_px).unwrap_or(0.0),
                    height: attributes.get("Height").and_then(parse_length_px).unwrap_or(0.0),
                    baseline_offset: attributes
                        .get("TextBlock.BaselineOffset")
                        .and_then(parse_length_px),
                    stretch: attributes
                        .get("Stretch")
                        .and_then(parse_stretch)
                        .unwrap_or(self.options.image_stretch),
                    stretch_direction: attributes
                        .get("StretchDirection")
                        .and_then(parse_stretch_direction)
                        .unwrap_or_default(),
                };
                let mut node = DocumentNode::leaf(DocumentNodeType::Image, self.stack.top().clone());
                node.image = Some(Box::new(info));
                self.image = Some(self.doc.push(node));
                None
            },
            XamlElement::BitmapImage => {
                if let Some(index) = self.image
                    && let Some(source) = attributes.get("UriSource")
                    && let Some(info) = self.doc[index].image.as_mut()
                {
                    info.source = source.to_string();
                }
                None
            },
            XamlElement::TextDecoration => {
                self.apply_text_decoration(attributes.get("Location"));
                None
            },
            XamlElement::FlowDocument
            | XamlElement::Section
            | XamlElement::Run
            | XamlElement::InlineUIContainer
            | XamlElement::Figure
            | XamlElement::Floater => None,
        }
    }

    /// `<Run.TextDecorations><TextDecoration Location="..."/>` sets the
    /// decoration on the element owning the property element.
    fn apply_text_decoration(&mut self, location: Option<&str>) {
        let Some(owner) = self
            .frames
            .iter()
            .rposition(|f| !f.property && f.element != Some(XamlElement::TextDecoration))
        else {
            return;
        };
        let location = location.unwrap_or("Underline").trim().to_ascii_lowercase();
        // Frame k owns stack entry k + 1; the base entry sits at 0.
        let Some(state) = self.stack.state_mut(owner + 1) else {
            return;
        };
        match location.as_str() {
            "underline" => state.underline = UnderlineKind::Single,
            "strikethrough" => state.strike = StrikeKind::Single,
            _ => {},
        }
        let (underline, strike) = (state.underline, state.strike);
        if let Some(node) = self.frames[owner].node {
            let format = &mut self.doc[node].format;
            format.underline = underline;
            format.strike = strike;
        }
    }

    /// Append text to the run being built, starting a new run when the
    /// formatting differs.
    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let top = self.stack.top();
        if let Some(last) = self.doc.len().checked_sub(1)
            && self.doc[last].kind == DocumentNodeType::Text
            && self.doc[last].is_pending()
            && self.doc[last].format.char_format_eq(top)
        {
            self.doc[last].content.push_str(text);
            return;
        }
        let node = DocumentNode::text(text, top.clone());
        self.doc.push(node);
    }

    fn append_line_break(&mut self) {
        let node = DocumentNode::leaf(DocumentNodeType::LineBreak, self.stack.top().clone());
        self.doc.push(node);
    }

    fn in_run(&self) -> bool {
        matches!(self.owner(), Some((_, Some(XamlElement::Run))))
    }

    fn in_inline_context(&self) -> bool {
        matches!(
            self.owner(),
            Some((
                _,
                Some(
                    XamlElement::Run
                        | XamlElement::Span
                        | XamlElement::Bold
                        | XamlElement::Italic
                        | XamlElement::Underline
                        | XamlElement::Hyperlink
                        | XamlElement::Paragraph
                )
            ))
        )
    }
}

impl XamlHandler for XamlTreeBuilder<'_> {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }
        let element = ELEMENTS.get(name).copied();
        if matches!(element, Some(XamlElement::Figure | XamlElement::Floater)) {
            log::debug!("dropping {} content", name);
            self.skip_depth = 1;
            return Ok(());
        }

        let preserve_space = attributes
            .get("xml:space")
            .map_or_else(|| self.preserve_space(), |v| v == "preserve");
        let property = element.is_none() && name.contains('.');
        self.stack.push();

        let mut frame = Frame {
            element,
            node: None,
            property,
            preserve_space,
        };
        if !property {
            if element.is_none() {
                log::debug!("unknown element {} treated as a container", name);
            }
            let top = self.stack.top_mut();
            Self::reset_local_properties(top);
            if element == Some(XamlElement::List) {
                top.marker = MarkerStyle::Disc;
                top.start_index = 1;
            }
            match element {
                Some(XamlElement::Bold) => top.bold = true,
                Some(XamlElement::Italic) => top.italic = true,
                Some(XamlElement::Underline) => top.underline = UnderlineKind::Single,
                _ => {},
            }
            self.apply_attributes(element, attributes);
            frame.node = self.open_element(element, attributes);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }
        let Some(frame) = self.frames.pop() else {
            return self.absorb("unmatched end element");
        };
        self.stack.pop();
        if frame.element == Some(XamlElement::Image) {
            self.image = None;
        }
        if let Some(node) = frame.node
            && self.doc[node].is_pending()
        {
            self.doc.close_at(node);
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if self.skip_depth > 0 {
            return Ok(());
        }
        let mut first = true;
        for line in text.split('\n') {
            if !first {
                self.append_line_break();
            }
            first = false;
            self.append_text(line.strip_suffix('\r').unwrap_or(line));
        }
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
        if self.skip_depth > 0 {
            return Ok(());
        }
        if self.in_run() || (self.preserve_space() && self.in_inline_context()) {
            return self.characters(text);
        }
        Ok(())
    }

    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        self.absorb(format!("unresolved entity &{};", name))
    }
}

fn is_bold_weight(value: &str) -> bool {
    let value = value.trim();
    if let Ok(weight) = value.parse::<u32>() {
        return weight >= 600;
    }
    matches!(
        value.to_ascii_lowercase().as_str(),
        "bold" | "semibold" | "demibold" | "extrabold" | "ultrabold" | "black" | "heavy" | "extrablack" | "ultrablack"
    )
}

fn span_attribute(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

fn set_border_widths(borders: &mut Borders, px: [f64; 4]) {
    let [l, t, r, b] = px;
    for (side, width) in [
        (&mut borders.left, l),
        (&mut borders.top, t),
        (&mut borders.right, r),
        (&mut borders.bottom, b),
    ] {
        let twips = px_to_twips(width);
        let color = side.color;
        *side = if twips > 0 {
            BorderFormat {
                kind: BorderKind::Single,
                width: twips,
                color,
            }
        } else {
            BorderFormat {
                kind: BorderKind::None,
                width: 0,
                color,
            }
        };
    }
}
