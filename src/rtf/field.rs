//! Field support (hyperlinks, symbols, linked pictures).
//!
//! Fields are structured as:
//! `{\field{\*\fldinst INSTRUCTION}{\fldrslt RESULT}}`
//!
//! Each of the three groups leaves a begin marker in the tree when it opens
//! and a matched end marker when it closes. Once the outer `\field` group
//! closes, the markers and the instruction text are removed and the result
//! content is rewritten according to the instruction:
//! - HYPERLINK: inline runs of the result are wrapped in hyperlink nodes
//! - SYMBOL: the result is replaced by the character it names
//! - INCLUDEPICTURE: an image node is added when the result carries none
//!
//! Other field types keep their result content as plain text.

use super::reader::RtfToXamlReader;
use crate::common::encoding::decode_bytes;
use crate::common::error::Result;
use crate::document::{
    Destination, DocumentNode, DocumentNodeType, FormatState, ImageInfo, NodeFlags,
};

/// Action derived from a field instruction.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum FieldAction {
    Hyperlink { uri: String, target: Option<String> },
    Symbol { ch: char, font: Option<String>, size: Option<f64> },
    IncludePicture { uri: String },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Word(String),
    Quoted(String),
    Switch(char),
}

impl Part {
    fn argument(&self) -> Option<&str> {
        match self {
            Part::Word(s) | Part::Quoted(s) => Some(s),
            Part::Switch(_) => None,
        }
    }
}

/// Split an instruction into words, quoted strings and `\x` switches.
fn tokenize(instruction: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut chars = instruction.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    // `\\` and `\"` are escapes, any other backslash is literal:
                    // `"C:\\dir"` and `"C:\dir"` both read as `C:\dir`.
                    '\\' => match chars.peek() {
                        Some(&next @ ('\\' | '"')) => {
                            value.push(next);
                            chars.next();
                        },
                        _ => value.push('\\'),
                    },
                    _ => value.push(c),
                }
            }
            parts.push(Part::Quoted(value));
        } else if c == '\\' {
            chars.next();
            match chars.peek() {
                Some(&s) if s.is_ascii_alphabetic() || s == '*' || s == '#' || s == '@' => {
                    chars.next();
                    parts.push(Part::Switch(s.to_ascii_lowercase()));
                },
                _ => parts.push(Part::Word("\\".to_string())),
            }
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            parts.push(Part::Word(word));
        }
    }
    parts
}

/// Interpret a field instruction. `None` means the instruction names a
/// known field but cannot be understood.
pub(super) fn parse_instruction(instruction: &str, code_page: u32) -> Option<FieldAction> {
    let parts = tokenize(instruction);
    let Some(Part::Word(keyword)) = parts.first() else {
        return Some(FieldAction::Other);
    };
    let args = &parts[1..];
    if keyword.eq_ignore_ascii_case("HYPERLINK") {
        parse_hyperlink(args)
    } else if keyword.eq_ignore_ascii_case("SYMBOL") {
        parse_symbol(args, code_page)
    } else if keyword.eq_ignore_ascii_case("INCLUDEPICTURE") {
        parse_include_picture(args)
    } else {
        Some(FieldAction::Other)
    }
}

fn parse_hyperlink(args: &[Part]) -> Option<FieldAction> {
    let mut base: Option<String> = None;
    let mut bookmark: Option<String> = None;
    let mut target: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match &args[i] {
            Part::Switch(s @ ('l' | 't' | 'o')) => {
                let value = args.get(i + 1).and_then(Part::argument).map(str::to_string);
                match *s {
                    'l' => bookmark = value,
                    't' => target = value,
                    _ => {},
                }
                i += 2;
                continue;
            },
            Part::Switch(_) => {},
            part => {
                if base.is_none() {
                    base = part.argument().map(str::to_string);
                }
            },
        }
        i += 1;
    }

    let uri = match (base, bookmark) {
        (Some(base), Some(bm)) => format!("{}#{}", base, bm),
        (Some(base), None) => base,
        (None, Some(bm)) => format!("#{}", bm),
        (None, None) => return None,
    };
    if uri.is_empty() {
        return None;
    }
    Some(FieldAction::Hyperlink { uri, target })
}

fn parse_symbol_code(word: &str) -> Option<u32> {
    match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => word.parse().ok(),
    }
}

fn parse_symbol(args: &[Part], field_code_page: u32) -> Option<FieldAction> {
    let code = parse_symbol_code(args.first()?.argument()?)?;
    let mut code_page = Some(field_code_page);
    let mut font = None;
    let mut size = None;
    let mut i = 1;
    while i < args.len() {
        match &args[i] {
            Part::Switch('a') => code_page = Some(field_code_page),
            Part::Switch('u') => code_page = None,
            Part::Switch('j') => code_page = Some(932),
            Part::Switch('f') => {
                font = args.get(i + 1).and_then(Part::argument).map(str::to_string);
                i += 1;
            },
            Part::Switch('s') => {
                size = args
                    .get(i + 1)
                    .and_then(Part::argument)
                    .and_then(|s| fast_float2::parse::<f64, _>(s).ok());
                i += 1;
            },
            _ => {},
        }
        i += 1;
    }

    let ch = match code_page {
        None => char::from_u32(code)?,
        Some(cp) => {
            let bytes: Vec<u8> = if code > 0xFF {
                vec![(code >> 8) as u8, code as u8]
            } else {
                vec![code as u8]
            };
            decode_bytes(&bytes, cp).chars().next()?
        },
    };
    Some(FieldAction::Symbol { ch, font, size })
}

fn parse_include_picture(args: &[Part]) -> Option<FieldAction> {
    let uri = args.iter().find_map(Part::argument)?;
    let is_http = uri
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"));
    if !is_http {
        return Some(FieldAction::Other);
    }
    Some(FieldAction::IncludePicture { uri: uri.to_string() })
}

impl<'a> RtfToXamlReader<'a> {
    /// A field group closed: pair it with its begin marker. Returns the
    /// begin and end marker positions.
    pub(super) fn push_field_end(&mut self, closing: &FormatState) -> Result<Option<(usize, usize)>> {
        let begin = (0..self.doc.len()).rev().find(|&i| {
            let node = &self.doc[i];
            node.kind == DocumentNodeType::FieldBegin
                && !node.is_matched()
                && node.format.dest == closing.dest
        });
        let Some(begin) = begin else {
            self.absorb("field end without a begin")?;
            return Ok(None);
        };
        self.doc[begin].flags.insert(NodeFlags::MATCHED);
        self.open_fields = self.open_fields.saturating_sub(1);
        let mut node = DocumentNode::leaf(DocumentNodeType::FieldEnd, closing.clone());
        node.flags.insert(NodeFlags::MATCHED);
        let end = self.doc.push(node);
        Ok(Some((begin, end)))
    }

    fn find_marker(
        &self,
        mut range: std::ops::Range<usize>,
        kind: DocumentNodeType,
        dest: Destination,
    ) -> Option<usize> {
        range.find(|&i| self.doc[i].kind == kind && self.doc[i].format.dest == dest)
    }

    /// End of the instruction that starts at `ib`, skipping nested
    /// instruction groups.
    fn instruction_end(&self, ib: usize, end: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in ib + 1..end {
            let node = &self.doc[i];
            if node.format.dest != Destination::FieldInstruction {
                continue;
            }
            match node.kind {
                DocumentNodeType::FieldBegin => depth += 1,
                DocumentNodeType::FieldEnd if depth == 0 => return Some(i),
                DocumentNodeType::FieldEnd => depth -= 1,
                _ => {},
            }
        }
        None
    }

    /// Rewrite a complete field spanning the markers `begin..=end`.
    pub(super) fn process_field(&mut self, begin: usize, end: usize) -> Result<()> {
        let ib = self.find_marker(
            begin + 1..end,
            DocumentNodeType::FieldBegin,
            Destination::FieldInstruction,
        );
        let ie = ib.and_then(|ib| self.instruction_end(ib, end));
        let after_instruction = ie.or(ib).unwrap_or(begin) + 1;
        let rb = self.find_marker(
            after_instruction..end,
            DocumentNodeType::FieldBegin,
            Destination::FieldResult,
        );
        let re = rb.and_then(|rb| {
            (rb + 1..end).rev().find(|&i| {
                self.doc[i].kind == DocumentNodeType::FieldEnd
                    && self.doc[i].format.dest == Destination::FieldResult
            })
        });

        let mut instruction = String::new();
        let mut removals = vec![begin, end];
        if let Some(ib) = ib {
            removals.push(ib);
            let stop = ie.unwrap_or(after_instruction.max(ib + 1));
            for i in ib + 1..stop {
                let node = &self.doc[i];
                if node.kind.is_leaf() {
                    if node.kind == DocumentNodeType::Text
                        && node.format.dest == Destination::FieldInstruction
                    {
                        instruction.push_str(&node.content);
                    }
                    removals.push(i);
                }
            }
        }
        removals.extend(ie);
        removals.extend(rb);
        removals.extend(re);
        removals.sort_unstable();
        removals.dedup();

        let new_index = |i: usize| i - removals.iter().filter(|&&r| r < i).count();
        let (content_start, content_stop) = match rb {
            Some(rb) => (rb + 1, re.unwrap_or(end)),
            None => (begin, begin),
        };
        let start = new_index(content_start);
        let stop = new_index(content_stop).max(start);

        let code_page = self.doc[begin].format.code_page;
        let mut template = self.doc[begin].format.clone();
        template.dest = self.stack.top().dest;

        for &i in removals.iter().rev() {
            self.doc.excise(i, 1);
        }

        let instruction = instruction.strip_prefix(' ').unwrap_or(&instruction);
        log::trace!("field instruction {:?}", instruction);
        let Some(action) = parse_instruction(instruction, code_page) else {
            return self.absorb(format!("malformed field instruction {:?}", instruction));
        };

        match action {
            FieldAction::Hyperlink { uri, target } => {
                let mut link = DocumentNode::new(DocumentNodeType::Hyperlink, template);
                link.flags.remove(NodeFlags::PENDING);
                link.navigate_uri = Some(uri);
                link.target_name = target;
                self.wrap_inline_runs(start, stop, &link);
            },
            FieldAction::Symbol { ch, font, size } => {
                let parent = self.insertion_parent(start, stop);
                self.doc.excise(start, stop - start);
                let mut format = template;
                if let Some(name) = font {
                    format.font = self.tables.fonts.find_or_add(&name);
                }
                if let Some(points) = size {
                    format.font_size = (points * 2.0).round() as i64;
                }
                let node = DocumentNode::leaf(DocumentNodeType::Text, format);
                let node = DocumentNode { content: ch.to_string(), ..node };
                self.doc.insert_node(start, node, parent);
            },
            FieldAction::IncludePicture { uri } => {
                let has_image = (start..stop).any(|i| self.doc[i].kind == DocumentNodeType::Image);
                if !has_image {
                    let parent = self.insertion_parent(start, stop);
                    let mut node = DocumentNode::leaf(DocumentNodeType::Image, template);
                    node.image = Some(Box::new(ImageInfo {
                        source: uri,
                        stretch: self.options.image_stretch,
                        ..ImageInfo::default()
                    }));
                    self.doc.insert_node(start, node, parent);
                }
            },
            FieldAction::Other => {},
        }
        Ok(())
    }

    fn insertion_parent(&self, start: usize, stop: usize) -> Option<usize> {
        if stop > start {
            self.doc.parent_of(start)
        } else {
            self.doc.open_container()
        }
    }

    /// Wrap every maximal run of inline siblings in `[start, stop)` in a
    /// copy of `template`, descending into block containers. Returns the
    /// number of nodes inserted.
    fn wrap_inline_runs(&mut self, start: usize, stop: usize, template: &DocumentNode) -> usize {
        let mut stop = stop.min(self.doc.len());
        let mut inserted = 0;
        let mut i = start;
        while i < stop {
            if !self.doc[i].kind.is_inline() {
                i += 1;
                continue;
            }
            let parent = self.doc.parent_of(i);
            let mut j = i;
            while j < stop && self.doc[j].kind.is_inline() && self.doc.parent_of(j) == parent {
                j = self.doc.subtree_end(j).min(stop);
            }
            let mut link = template.clone();
            link.child_count = j - i;
            self.doc.insert_node(i, link, parent);
            inserted += 1;
            stop += 1;
            i = j + 1;
        }
        inserted
    }

    /// Remove field markers and instruction text left by fields that never
    /// completed.
    pub(super) fn strip_field_scaffolding(&mut self) {
        let leftovers: Vec<usize> = self
            .doc
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                matches!(n.kind, DocumentNodeType::FieldBegin | DocumentNodeType::FieldEnd)
                    || (n.kind == DocumentNodeType::Text
                        && n.format.dest == Destination::FieldInstruction)
            })
            .map(|(i, _)| i)
            .collect();
        for i in leftovers.into_iter().rev() {
            self.doc.excise(i, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Error;
    use crate::images::MemoryImagePackage;
    use crate::options::ConvertOptions;
    use crate::rtf::reader::tests::decode;

    #[test]
    fn test_tokenize_quotes_and_switches() {
        let parts = tokenize(r#"HYPERLINK "C:\\dir\\a \"b\".htm" \l top"#);
        assert_eq!(
            parts,
            vec![
                Part::Word("HYPERLINK".into()),
                Part::Quoted(r#"C:\dir\a "b".htm"#.into()),
                Part::Switch('l'),
                Part::Word("top".into()),
            ]
        );
    }

    #[test]
    fn test_parse_hyperlink_variants() {
        assert_eq!(
            parse_instruction(r#"HYPERLINK "http://x" \t "_blank" \o "tip""#, 1252),
            Some(FieldAction::Hyperlink { uri: "http://x".into(), target: Some("_blank".into()) })
        );
        assert_eq!(
            parse_instruction(r#"HYPERLINK \l "sec1""#, 1252),
            Some(FieldAction::Hyperlink { uri: "#sec1".into(), target: None })
        );
        assert_eq!(parse_instruction("HYPERLINK", 1252), None);
        assert_eq!(parse_instruction("PAGE", 1252), Some(FieldAction::Other));
    }

    #[test]
    fn test_hyperlink_backslashes_collapse_once() {
        let uri = |instruction: &str| match parse_instruction(instruction, 1252) {
            Some(FieldAction::Hyperlink { uri, .. }) => uri,
            other => panic!("not a hyperlink: {:?}", other),
        };
        assert_eq!(uri(r#"HYPERLINK "C:\\docs\\a.htm""#), r"C:\docs\a.htm");
        assert_eq!(uri(r#"HYPERLINK "C:\docs\a.htm""#), r"C:\docs\a.htm");
        assert_eq!(uri(r#"HYPERLINK "\\\\srv\\share""#), r"\\srv\share");
        assert_eq!(uri(r#"HYPERLINK "say \"hi\"""#), r#"say "hi""#);
    }

    #[test]
    fn test_hyperlink_path_from_rtf() {
        let (_, xaml) = decode(br#"{\rtf1{\field{\*\fldinst {HYPERLINK "C:\\\\docs\\\\a.htm"}}{\fldrslt {go}}}}"#);
        assert!(xaml.contains(r#"NavigateUri="C:\docs\a.htm""#));
    }

    #[test]
    fn test_parse_symbol() {
        let action = parse_instruction(r#"SYMBOL 0x41 \f "Wingdings" \s 12"#, 1252);
        assert_eq!(
            action,
            Some(FieldAction::Symbol { ch: 'A', font: Some("Wingdings".into()), size: Some(12.0) })
        );
        let action = parse_instruction(r"SYMBOL 8364 \u", 1252);
        assert_eq!(action, Some(FieldAction::Symbol { ch: '\u{20AC}', font: None, size: None }));
        assert_eq!(parse_instruction(r"SYMBOL \f x", 1252), None);
    }

    #[test]
    fn test_parse_include_picture_scheme() {
        assert_eq!(
            parse_instruction(r#"INCLUDEPICTURE "HTTP://host/a.png""#, 1252),
            Some(FieldAction::IncludePicture { uri: "HTTP://host/a.png".into() })
        );
        assert_eq!(
            parse_instruction(r#"INCLUDEPICTURE "file:///a.png""#, 1252),
            Some(FieldAction::Other)
        );
    }

    #[test]
    fn test_hyperlink_field() {
        let (doc, xaml) = decode(br#"{\rtf1{\field{\*\fldinst HYPERLINK "http://x"}{\fldrslt link}}}"#);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc[0].kind, DocumentNodeType::Hyperlink);
        assert_eq!(doc[0].navigate_uri.as_deref(), Some("http://x"));
        assert_eq!(doc[0].child_count, 1);
        assert_eq!(doc[1].content, "link");
        assert!(xaml.contains(r#"<Hyperlink NavigateUri="http://x"><Run>link</Run></Hyperlink>"#));
    }

    #[test]
    fn test_hyperlink_bookmark() {
        let (doc, _) = decode(br#"{\rtf1{\field{\*\fldinst HYPERLINK \\l "sec"}{\fldrslt go}}}"#);
        assert_eq!(doc[0].navigate_uri.as_deref(), Some("#sec"));
    }

    #[test]
    fn test_hyperlink_across_paragraphs() {
        let (doc, _) =
            decode(br#"{\rtf1{\field{\*\fldinst HYPERLINK "http://x"}{\fldrslt a\par b}}\par}"#);
        let top = doc.children(None);
        assert_eq!(top.len(), 2);
        for para in top {
            assert_eq!(doc[para].kind, DocumentNodeType::Paragraph);
            let link = para + 1;
            assert_eq!(doc[link].kind, DocumentNodeType::Hyperlink);
            assert_eq!(doc.parent_of(link), Some(para));
        }
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_symbol_field_replaces_result() {
        let (doc, _) = decode(br#"{\rtf1{\field{\*\fldinst SYMBOL 65 \\f "Arial" \\s 12}{\fldrslt}}}"#);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].content, "A");
        assert_eq!(doc[0].format.font_size, 24);
        assert!(doc[0].format.font >= 0);
    }

    #[test]
    fn test_include_picture_adds_image() {
        let (doc, xaml) = decode(
            br#"{\rtf1{\field{\*\fldinst INCLUDEPICTURE "http://host/a.png"}{\fldrslt alt}}}"#,
        );
        let image = doc.iter().find(|n| n.kind == DocumentNodeType::Image).unwrap();
        assert_eq!(image.image.as_ref().unwrap().source, "http://host/a.png");
        assert!(xaml.contains("http://host/a.png"));
    }

    #[test]
    fn test_relative_include_picture_keeps_result() {
        let input = br#"{\rtf1{\field{\*\fldinst INCLUDEPICTURE "images/a.png"}{\fldrslt alt}}}"#;
        let (doc, xaml) = decode(input);
        assert!(doc.iter().all(|n| n.kind != DocumentNodeType::Image));
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].content, "alt");
        assert!(!xaml.contains("images/a.png"));

        let mut package = MemoryImagePackage::new();
        let options = ConvertOptions::default().with_strict(true);
        let mut reader = RtfToXamlReader::new(input, &mut package, &options);
        assert!(reader.process().is_ok());
    }

    #[test]
    fn test_unknown_field_keeps_result() {
        let (doc, _) = decode(br"{\rtf1{\field{\*\fldinst PAGE}{\fldrslt 3}}}");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].content, "3");
    }

    #[test]
    fn test_malformed_field_absorbed_or_rejected() {
        let input = br"{\rtf1{\field{\*\fldinst SYMBOL}{\fldrslt x}}}";
        let (doc, _) = decode(input);
        assert_eq!(doc[0].content, "x");

        let mut package = MemoryImagePackage::new();
        let options = ConvertOptions::default().with_strict(true);
        let mut reader = RtfToXamlReader::new(input, &mut package, &options);
        assert!(matches!(reader.process(), Err(Error::Rejected(_))));
    }
}
