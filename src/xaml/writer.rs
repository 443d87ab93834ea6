//! Flow-document markup emission from a decoded tree.
//!
//! Every node renders as one element. Character attributes are written as
//! differences from the state the element inherits: block elements carry a
//! character-neutral state, so runs inside them spell out everything that
//! is not the default, while runs inside spans and hyperlinks only repeat
//! what changes.

use super::tags::{
    XAML_NAMESPACE, font_stretch_name, language_tag, marker_style_name, stretch_name,
    text_alignment_name,
};
use crate::common::unit::{half_points_to_px, twips_to_px, write_num};
use crate::common::xml::escape_xml;
use crate::document::{
    Borders, Direction, DocumentNode, DocumentNodeArray, DocumentNodeType, FormatState,
    ScriptKind, StrikeKind, TextAlignment, UnderlineKind,
};
use crate::rtf::tables::LookupTables;

/// Render `doc` as flow-document markup. The root is a `Section` when the
/// tree holds block content and a `Span` otherwise.
pub fn write_xaml(doc: &DocumentNodeArray, tables: &LookupTables) -> String {
    let mut writer = XamlWriter::new(doc, tables);
    writer.write_document();
    writer.buffer
}

struct XamlWriter<'a> {
    doc: &'a DocumentNodeArray,
    tables: &'a LookupTables,
    buffer: String,
}

impl<'a> XamlWriter<'a> {
    fn new(doc: &'a DocumentNodeArray, tables: &'a LookupTables) -> Self {
        Self {
            doc,
            tables,
            buffer: String::with_capacity(doc.len() * 48 + 128),
        }
    }

    fn write_document(&mut self) {
        let root = if self.doc.iter().any(|n| n.kind.is_block()) { "Section" } else { "Span" };
        self.buffer.push('<');
        self.buffer.push_str(root);
        self.attr("xmlns", XAML_NAMESPACE);
        self.attr("xml:space", "preserve");
        let children = self.doc.children(None);
        if children.is_empty() {
            self.buffer.push_str("/>");
            return;
        }
        self.buffer.push('>');
        let base = FormatState::default();
        for child in children {
            self.write_node(child, &base);
        }
        self.close(root);
    }

    fn attr(&mut self, name: &str, value: &str) {
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        self.buffer.push_str(&escape_xml(value));
        self.buffer.push('"');
    }

    fn num_attr(&mut self, name: &str, value: f64) {
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        write_num(&mut self.buffer, value);
        self.buffer.push('"');
    }

    /// `left,top,right,bottom` in pixels.
    fn thickness_attr(&mut self, name: &str, twips: [i64; 4]) {
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        for (i, t) in twips.iter().enumerate() {
            if i > 0 {
                self.buffer.push(',');
            }
            write_num(&mut self.buffer, twips_to_px(*t));
        }
        self.buffer.push('"');
    }

    fn color_attr(&mut self, name: &str, index: i64) {
        if index < 0 {
            return;
        }
        if let Some(color) = self.tables.colors.get(index) {
            self.attr(name, &color.to_argb_hex());
        }
    }

    fn close(&mut self, tag: &str) {
        self.buffer.push_str("</");
        self.buffer.push_str(tag);
        self.buffer.push('>');
    }

    fn write_children(&mut self, index: usize, inherited: &FormatState) {
        for child in self.doc.children(Some(index)) {
            self.write_node(child, inherited);
        }
    }

    /// Emit the element for `index` and its subtree.
    fn write_node(&mut self, index: usize, inherited: &FormatState) {
        let doc = self.doc;
        let node = &doc[index];
        if node.is_hidden() {
            return;
        }
        let kind = node.kind;
        let tag = kind.xaml_tag();
        match kind {
            DocumentNodeType::FieldBegin | DocumentNodeType::FieldEnd => {},
            DocumentNodeType::Text => self.write_run(node, inherited),
            DocumentNodeType::LineBreak => self.buffer.push_str("<LineBreak/>"),
            DocumentNodeType::Image => self.write_image(node),
            DocumentNodeType::Span | DocumentNodeType::Hyperlink => {
                self.buffer.push('<');
                self.buffer.push_str(tag);
                if kind == DocumentNodeType::Hyperlink {
                    if let Some(uri) = &node.navigate_uri {
                        self.attr("NavigateUri", uri);
                    }
                    if let Some(target) = &node.target_name {
                        self.attr("TargetName", target);
                    }
                }
                self.write_char_attrs(&node.format, inherited);
                self.write_body(index, tag, &node.format);
            },
            _ => {
                self.buffer.push('<');
                self.buffer.push_str(tag);
                match kind {
                    DocumentNodeType::Paragraph => self.write_paragraph_attrs(&node.format),
                    DocumentNodeType::List => self.write_list_attrs(node),
                    DocumentNodeType::Cell => self.write_cell_attrs(node),
                    _ => {},
                }
                if kind == DocumentNodeType::Table && !node.columns.is_empty() {
                    self.buffer.push('>');
                    self.buffer.push_str("<Table.Columns>");
                    for &width in &node.columns {
                        self.buffer.push_str("<TableColumn");
                        self.num_attr("Width", twips_to_px(width));
                        self.buffer.push_str("/>");
                    }
                    self.buffer.push_str("</Table.Columns>");
                    self.write_children(index, &node.format);
                    self.close(tag);
                } else {
                    self.write_body(index, tag, &node.format);
                }
            },
        }
    }

    /// Finish an open start tag: self-closing when the node is empty.
    fn write_body(&mut self, index: usize, tag: &str, format: &FormatState) {
        if self.doc.descendant_count(index) == 0 {
            self.buffer.push_str("/>");
            return;
        }
        self.buffer.push('>');
        self.write_children(index, format);
        self.close(tag);
    }

    fn write_run(&mut self, node: &DocumentNode, inherited: &FormatState) {
        self.buffer.push_str("<Run");
        self.write_char_attrs(&node.format, inherited);
        if node.content.is_empty() {
            self.buffer.push_str("/>");
            return;
        }
        self.buffer.push('>');
        self.buffer.push_str(&escape_xml(&node.content));
        self.buffer.push_str("</Run>");
    }

    fn write_char_attrs(&mut self, f: &FormatState, inherited: &FormatState) {
        let tables = self.tables;
        if f.font >= 0
            && f.font != inherited.font
            && let Some(font) = tables.fonts.get(f.font)
            && !font.name.is_empty()
        {
            self.attr("FontFamily", &font.name);
        }
        if f.font_size != inherited.font_size {
            self.num_attr("FontSize", half_points_to_px(f.font_size));
        }
        if f.bold != inherited.bold {
            self.attr("FontWeight", if f.bold { "Bold" } else { "Normal" });
        }
        if f.italic != inherited.italic {
            self.attr("FontStyle", if f.italic { "Italic" } else { "Normal" });
        }
        if f.foreground != inherited.foreground {
            self.color_attr("Foreground", f.foreground);
        }
        if f.background != inherited.background {
            self.color_attr("Background", f.background);
        }

        let underline = f.underline != UnderlineKind::None;
        let strike = f.strike != StrikeKind::None;
        if underline != (inherited.underline != UnderlineKind::None)
            || strike != (inherited.strike != StrikeKind::None)
        {
            let value = match (underline, strike) {
                (true, true) => "Underline, Strikethrough",
                (true, false) => "Underline",
                (false, true) => "Strikethrough",
                (false, false) => "None",
            };
            self.attr("TextDecorations", value);
        }
        if f.script != inherited.script {
            let value = match f.script {
                ScriptKind::Super => "Superscript",
                ScriptKind::Sub => "Subscript",
                ScriptKind::Normal => "Normal",
            };
            self.attr("Typography.Variants", value);
        }
        if f.lang != inherited.lang
            && let Some(tag) = language_tag(f.lang)
        {
            self.attr("xml:lang", tag);
        }
        if f.char_dir != inherited.char_dir {
            self.attr("FlowDirection", direction_name(f.char_dir));
        }
        if f.font_stretch != inherited.font_stretch {
            self.attr("FontStretch", font_stretch_name(f.font_stretch));
        }
    }

    fn write_paragraph_attrs(&mut self, f: &FormatState) {
        if f.li != 0 || f.sb != 0 || f.ri != 0 || f.sa != 0 {
            self.thickness_attr("Margin", [f.li, f.sb, f.ri, f.sa]);
        }
        if f.fi != 0 {
            self.num_attr("TextIndent", twips_to_px(f.fi));
        }
        if f.align != TextAlignment::Left {
            self.attr("TextAlignment", text_alignment_name(f.align));
        }
        if f.sl != 0 && !f.sl_mult {
            self.num_attr("LineHeight", twips_to_px(f.sl.abs()));
        }
        if f.para_dir == Direction::RightToLeft {
            self.attr("FlowDirection", "RightToLeft");
        }
        self.write_border_attrs(&f.para_borders);
        self.color_attr("Background", f.para_shading);
    }

    fn write_border_attrs(&mut self, borders: &Borders) {
        if !borders.any() {
            return;
        }
        self.thickness_attr(
            "BorderThickness",
            [
                borders.left.effective_width(),
                borders.top.effective_width(),
                borders.right.effective_width(),
                borders.bottom.effective_width(),
            ],
        );
        self.color_attr("BorderBrush", borders.color());
    }

    fn write_list_attrs(&mut self, node: &DocumentNode) {
        self.attr("MarkerStyle", marker_style_name(node.format.marker));
        let start = if node.list_start >= 0 {
            node.list_start
        } else {
            node.format.start_index.max(1)
        };
        if start != 1 {
            self.buffer.push_str(" StartIndex=\"");
            self.buffer.push_str(itoa::Buffer::new().format(start));
            self.buffer.push('"');
        }
        self.attr("Margin", "0,0,0,0");
        self.attr("Padding", "0,0,0,0");
    }

    fn write_cell_attrs(&mut self, node: &DocumentNode) {
        if node.col_span > 1 {
            self.num_attr("ColumnSpan", f64::from(node.col_span));
        }
        if node.row_span > 1 {
            self.num_attr("RowSpan", f64::from(node.row_span));
        }
        let cell = &node.format.cell;
        self.write_border_attrs(&cell.borders);
        if cell.padding != [0; 4] {
            self.thickness_attr("Padding", cell.padding);
        }
        self.color_attr("Background", cell.background);
    }

    fn write_image(&mut self, node: &DocumentNode) {
        let Some(info) = node.image.as_deref() else {
            return;
        };
        self.buffer.push_str("<InlineUIContainer><Image");
        if info.width > 0.0 {
            self.num_attr("Width", info.width);
        }
        if info.height > 0.0 {
            self.num_attr("Height", info.height);
        }
        self.attr("Stretch", stretch_name(info.stretch));
        if let Some(offset) = info.baseline_offset {
            self.num_attr("TextBlock.BaselineOffset", offset);
        }
        self.buffer.push_str("><Image.Source><BitmapImage");
        self.attr("UriSource", &info.source);
        self.attr("CacheOption", "OnLoad");
        self.buffer.push_str("/></Image.Source></Image></InlineUIContainer>");
    }
}

fn direction_name(dir: Direction) -> &'static str {
    match dir {
        Direction::LeftToRight => "LeftToRight",
        Direction::RightToLeft => "RightToLeft",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentNode, ImageInfo, MarkerStyle, Stretch};
    use crate::rtf::tables::Color;

    fn pending(kind: DocumentNodeType, format: FormatState) -> DocumentNode {
        DocumentNode::new(kind, format)
    }

    #[test]
    fn test_empty_document() {
        let doc = DocumentNodeArray::new();
        let xaml = write_xaml(&doc, &LookupTables::default());
        assert_eq!(
            xaml,
            format!(r#"<Span xmlns="{}" xml:space="preserve"/>"#, XAML_NAMESPACE)
        );
    }

    #[test]
    fn test_run_attributes_against_paragraph() {
        let mut tables = LookupTables::default();
        tables.fonts.find_or_add("Arial");
        tables.colors.find_or_add(Color::new(0, 0, 0));
        tables.colors.find_or_add(Color::new(0, 0, 255));
        let mut doc = DocumentNodeArray::new();
        doc.push(pending(DocumentNodeType::Paragraph, FormatState::default()));
        let mut run = FormatState {
            font: 0,
            font_size: 36,
            italic: true,
            underline: UnderlineKind::Single,
            ..FormatState::default()
        };
        run.foreground = tables.colors.find_or_add(Color::new(0, 0, 255));
        doc.push(DocumentNode::text("a<b", run));
        doc.close_all();
        let xaml = write_xaml(&doc, &tables);
        assert!(xaml.contains(
            r##"<Paragraph><Run FontFamily="Arial" FontSize="24" FontStyle="Italic" Foreground="#FF0000FF" TextDecorations="Underline">a&lt;b</Run></Paragraph>"##
        ));
    }

    #[test]
    fn test_paragraph_layout_attributes() {
        let format = FormatState {
            li: 720,
            sa: 150,
            fi: -360,
            align: TextAlignment::Justify,
            ..FormatState::default()
        };
        let mut doc = DocumentNodeArray::new();
        doc.push(pending(DocumentNodeType::Paragraph, format));
        doc.close_all();
        let xaml = write_xaml(&doc, &LookupTables::default());
        assert!(xaml.contains(
            r#"<Paragraph Margin="48,0,0,10" TextIndent="-24" TextAlignment="Justify"/>"#
        ));
    }

    #[test]
    fn test_list_and_hidden_marker() {
        let format = FormatState { marker: MarkerStyle::Hidden, start_index: 5, ..FormatState::default() };
        let mut doc = DocumentNodeArray::new();
        doc.push(pending(DocumentNodeType::List, format.clone()));
        doc.push(pending(DocumentNodeType::ListItem, format));
        doc.close_all();
        let xaml = write_xaml(&doc, &LookupTables::default());
        assert!(xaml.contains(
            r#"<List MarkerStyle="None" StartIndex="5" Margin="0,0,0,0" Padding="0,0,0,0"><ListItem/></List>"#
        ));
    }

    #[test]
    fn test_image_markup() {
        let mut node = DocumentNode::leaf(DocumentNodeType::Image, FormatState::default());
        node.image = Some(Box::new(ImageInfo {
            source: "Image1.png".into(),
            width: 10.0,
            height: 20.5,
            baseline_offset: Some(16.0),
            stretch: Stretch::Fill,
            ..ImageInfo::default()
        }));
        let mut doc = DocumentNodeArray::new();
        doc.push(node);
        let xaml = write_xaml(&doc, &LookupTables::default());
        assert!(xaml.contains(
            r#"<InlineUIContainer><Image Width="10" Height="20.5" Stretch="Fill" TextBlock.BaselineOffset="16"><Image.Source><BitmapImage UriSource="Image1.png" CacheOption="OnLoad"/></Image.Source></Image></InlineUIContainer>"#
        ));
    }

    #[test]
    fn test_hidden_nodes_skipped() {
        let mut doc = DocumentNodeArray::new();
        let mut node = DocumentNode::text("secret", FormatState::default());
        node.flags.insert(crate::document::NodeFlags::HIDDEN);
        doc.push(node);
        doc.push(DocumentNode::text("shown", FormatState { bold: true, ..FormatState::default() }));
        doc.close_all();
        let xaml = write_xaml(&doc, &LookupTables::default());
        assert!(!xaml.contains("secret"));
        assert!(xaml.contains("shown"));
    }
}
