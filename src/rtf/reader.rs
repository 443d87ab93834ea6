//! RTF to flow-document reader.
//!
//! [`RtfToXamlReader`] pulls tokens from the [`Lexer`], keeps one
//! [`FormatState`] per open group and builds a [`DocumentNodeArray`] while
//! the input streams by. Control words are dispatched in `dispatch`; the
//! structural handlers live in `paragraph`, `table`, `list`, `field` and
//! `picture`, each adding an `impl` block to the reader.
//!
//! Only an invalid token aborts a conversion. Everything else that does not
//! fit (unmatched group ends, stray cell or row marks, field ends without a
//! begin) is absorbed, or rejected when [`ConvertOptions::strict`] is set.

use super::lexer::{Lexer, Token, TokenKind};
use super::tables::LookupTables;
use crate::common::error::{Error, Result};
use crate::document::{
    Destination, DocumentNode, DocumentNodeArray, DocumentNodeType, FormatStack, FormatState,
};
use crate::images::ImagePackage;
use crate::options::ConvertOptions;
use crate::xaml::writer::write_xaml;

/// Streaming RTF decoder producing a flow-document tree.
///
/// # Examples
///
/// ```
/// use flowrtf::{ConvertOptions, MemoryImagePackage, RtfToXamlReader};
///
/// let options = ConvertOptions::default();
/// let mut package = MemoryImagePackage::new();
/// let mut reader = RtfToXamlReader::new(br"{\rtf1\ansi Hello\par}", &mut package, &options);
/// reader.process()?;
/// assert!(reader.to_xaml().contains("<Run>Hello</Run>"));
/// # Ok::<(), flowrtf::Error>(())
/// ```
pub struct RtfToXamlReader<'a> {
    pub(super) lexer: Lexer<'a>,
    pub(super) stack: FormatStack,
    pub(super) doc: DocumentNodeArray,
    pub(super) tables: LookupTables,
    pub(super) options: &'a ConvertOptions,
    pub(super) package: &'a mut dyn ImagePackage,
    /// Set when the last `\listtext` group held only whitespace
    pub(super) marker_is_whitespace: bool,
    pub(super) list_text: String,
    pub(super) picture: Vec<u8>,
    pub(super) image_count: usize,
    /// `\deffN`, -1 when absent
    pub(super) default_font: i64,
    pub(super) doc_code_page: u32,
    pub(super) saw_rtf: bool,
    /// Field begin markers not yet paired with an end
    pub(super) open_fields: usize,
    high_surrogate: Option<u32>,
    finished: bool,
    document_ended: bool,
}

impl<'a> RtfToXamlReader<'a> {
    pub fn new(
        input: &'a [u8],
        package: &'a mut dyn ImagePackage,
        options: &'a ConvertOptions,
    ) -> Self {
        let base = FormatState {
            code_page: options.default_code_page,
            ..FormatState::default()
        };
        Self {
            lexer: Lexer::new(input),
            stack: FormatStack::new(base),
            doc: DocumentNodeArray::new(),
            tables: LookupTables::default(),
            options,
            package,
            marker_is_whitespace: false,
            list_text: String::new(),
            picture: Vec::new(),
            image_count: 0,
            default_font: -1,
            doc_code_page: options.default_code_page,
            saw_rtf: false,
            open_fields: 0,
            high_surrogate: None,
            finished: false,
            document_ended: false,
        }
    }

    /// Decode the whole input.
    pub fn process(&mut self) -> Result<()> {
        let mut expect_destination = false;
        while !self.document_ended {
            let token = self.lexer.next_token(self.stack.top());
            let after_star = std::mem::take(&mut expect_destination);
            match token.kind {
                TokenKind::Destination => expect_destination = true,
                TokenKind::Control => self.handle_control(&token, after_star)?,
                TokenKind::GroupStart => self.stack.push(),
                TokenKind::GroupEnd => self.handle_group_end()?,
                TokenKind::Text | TokenKind::TextSymbol => self.handle_text(&token.text)?,
                TokenKind::PictureData => self.lexer.write_image_data(&mut self.picture),
                TokenKind::Invalid => {
                    return Err(Error::InvalidFormat(format!(
                        "{} at byte {}",
                        token.text,
                        self.lexer.position()
                    )));
                },
                TokenKind::Eof => break,
            }
        }

        while self.stack.depth() > 0 {
            self.handle_group_end()?;
        }
        self.end_document()?;
        self.finalize()
    }

    /// Decode and render in one step.
    pub fn convert(mut self) -> Result<String> {
        self.process()?;
        Ok(self.to_xaml())
    }

    /// The tree built so far.
    #[inline]
    pub fn document(&self) -> &DocumentNodeArray {
        &self.doc
    }

    #[inline]
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Render the finished tree as flow-document markup.
    pub fn to_xaml(&self) -> String {
        write_xaml(&self.doc, &self.tables)
    }

    fn handle_group_end(&mut self) -> Result<()> {
        if self.stack.depth() == 1 && self.saw_rtf {
            self.end_document()?;
        }
        let Some(closing) = self.stack.pop_state() else {
            return self.absorb("unmatched group end");
        };
        if closing.dest != self.stack.top().dest {
            self.handle_destination_end(&closing)?;
        }
        if self.stack.top().font < 0 {
            self.select_default_font();
        }
        if self.stack.depth() == 0 && self.saw_rtf {
            self.document_ended = true;
        }
        Ok(())
    }

    /// A group whose destination differs from its parent's has closed.
    fn handle_destination_end(&mut self, closing: &FormatState) -> Result<()> {
        match closing.dest {
            Destination::FontEntry => {
                if let Some(font) = self.tables.fonts.get_mut(closing.font) {
                    font.seal();
                }
                if !matches!(
                    self.stack.top().dest,
                    Destination::FontTable | Destination::FontEntry
                ) {
                    self.end_font_table();
                }
            },
            Destination::FontTable => self.end_font_table(),
            Destination::ListText => {
                self.marker_is_whitespace = self.list_text.chars().all(char::is_whitespace);
                self.list_text.clear();
            },
            Destination::Pn => {
                let top = self.stack.top_mut();
                top.pn_level = closing.pn_level;
                top.marker = closing.marker;
                top.start_index = closing.start_index;
                top.is_continue = closing.is_continue;
            },
            Destination::FieldInstruction | Destination::FieldResult => {
                self.push_field_end(closing)?;
            },
            Destination::Field => {
                if let Some((begin, end)) = self.push_field_end(closing)? {
                    self.process_field(begin, end)?;
                }
            },
            Destination::Picture => self.handle_image(closing)?,
            _ => {},
        }
        Ok(())
    }

    fn end_font_table(&mut self) {
        let ids: Vec<i64> = self.tables.fonts.fonts().iter().map(|f| f.id).collect();
        for id in ids {
            if let Some(font) = self.tables.fonts.get_mut(id) {
                font.seal();
            }
        }
        self.select_default_font();
    }

    /// Route literal text by destination.
    pub(super) fn handle_text(&mut self, text: &str) -> Result<()> {
        self.high_surrogate = None;
        match self.stack.top().dest {
            Destination::Normal
            | Destination::FieldResult
            | Destination::ShapeText
            | Destination::FieldInstruction => self.append_text(text),
            Destination::FontEntry => {
                let id = self.stack.top().font;
                if let Some(font) = self.tables.fonts.get_mut(id) {
                    font.append_name(text);
                }
            },
            Destination::ColorTable => {
                for _ in text.matches(';') {
                    self.tables.colors.commit();
                }
            },
            Destination::ListText => self.list_text.push_str(text),
            _ => {},
        }
        Ok(())
    }

    /// Append to the trailing text run when it renders identically, else
    /// start a new one. Hidden text is dropped.
    pub(super) fn append_text(&mut self, text: &str) {
        let state = self.stack.top();
        if state.hidden || text.is_empty() {
            return;
        }
        if let Some(last) = self.doc.len().checked_sub(1) {
            let node = &mut self.doc[last];
            if node.kind == DocumentNodeType::Text
                && node.is_pending()
                && node.format.dest == state.dest
                && node.format.char_format_eq(state)
            {
                node.content.push_str(text);
                return;
            }
        }
        self.doc.push(DocumentNode::text(text, state.clone()));
    }

    /// `\uN`: one UTF-16 unit, followed by `\ucN` fallback units to skip.
    pub(super) fn handle_unicode(&mut self, token: &Token) -> Result<()> {
        let mut code = token.parameter;
        if code < 0 {
            code += 65536;
        }
        let code = u32::try_from(code).unwrap_or(0xFFFD);
        let pending = self.high_surrogate.take();
        let ch = match code {
            0xD800..=0xDBFF => {
                self.high_surrogate = Some(code);
                None
            },
            0xDC00..=0xDFFF => pending
                .and_then(|high| char::from_u32(0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00))),
            _ => char::from_u32(code),
        };
        let skip = self.stack.top().unicode_skip;
        self.lexer.advance_for_unicode(skip);
        if let Some(ch) = ch {
            let mut buf = [0u8; 4];
            self.handle_text(ch.encode_utf8(&mut buf))?;
        }
        Ok(())
    }

    /// Record malformed input that does not abort the conversion.
    pub(super) fn absorb(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.options.strict {
            return Err(Error::Rejected(message));
        }
        log::debug!("absorbed malformed RTF: {}", message);
        Ok(())
    }

    /// `\fN` in body text: select the font and the code page it implies.
    pub(super) fn select_font(&mut self, id: i64) {
        let code_page = self
            .tables
            .fonts
            .get(id)
            .and_then(|f| f.code_page)
            .unwrap_or(self.doc_code_page);
        let top = self.stack.top_mut();
        top.font = id;
        top.code_page = code_page;
    }

    pub(super) fn select_default_font(&mut self) {
        if self.tables.fonts.get(self.default_font).is_some() {
            self.select_font(self.default_font);
        }
    }

    /// Trim trailing whitespace and give the last inline run a paragraph when
    /// the document is block structured.
    fn end_document(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        while let Some(last) = self.doc.len().checked_sub(1) {
            let node = &self.doc[last];
            if !node.is_whitespace() || self.doc.parent_of(last) != self.doc.open_container() {
                break;
            }
            self.doc.excise(last, 1);
        }

        if self.inline_run_start().is_some() {
            let top = self.stack.top();
            let wants_block = self.options.force_paragraph
                || top.list_level() > 0
                || top.table_depth() > 0
                || self.doc.iter().any(|n| n.kind.is_block());
            if wants_block {
                self.handle_para()?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.doc.close_all();
        self.strip_field_scaffolding();
        self.finalize_tables();
        self.wrap_stray_inlines();
        self.doc.coalesce_all();
        self.doc.validate().map_err(Error::InvalidFormat)?;
        log::trace!(
            "decoded {} nodes, {} fonts, {} colors, {} images",
            self.doc.len(),
            self.tables.fonts.fonts().len(),
            self.tables.colors.len(),
            self.image_count
        );
        Ok(())
    }
}
