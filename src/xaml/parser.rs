//! Push-parser over flow-document markup.
//!
//! [`parse`] drives a [`XamlHandler`] with start/end element, character and
//! whitespace events. Entity references are resolved here; references the
//! parser cannot resolve are reported through
//! [`XamlHandler::skipped_entity`].

use crate::common::error::{Error, Result};
use crate::common::xml::{EntityRef, decode_entities, resolve_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Attributes of one start tag, with entity references already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Qualified name of attribute `i`.
    pub fn name(&self, i: usize) -> Option<&str> {
        self.entries.get(i).map(|(n, _)| n.as_str())
    }

    pub fn value(&self, i: usize) -> Option<&str> {
        self.entries.get(i).map(|(_, v)| v.as_str())
    }

    /// Value of the first attribute called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Receiver of markup events.
pub trait XamlHandler {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()>;

    fn end_element(&mut self, name: &str) -> Result<()>;

    /// Text content, possibly delivered in several pieces.
    fn characters(&mut self, text: &str) -> Result<()>;

    /// Text made only of whitespace.
    fn ignorable_whitespace(&mut self, text: &str) -> Result<()>;

    /// An entity reference that could not be resolved.
    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        log::debug!("skipped entity &{};", name);
        Ok(())
    }
}

fn is_xml_whitespace(text: &str) -> bool {
    text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

fn read_attributes(start: &BytesStart<'_>, handler: &mut dyn XamlHandler) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("malformed attribute: {}", e)))?;
        let name = std::str::from_utf8(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value)?;
        let mut skipped = Vec::new();
        let value = decode_entities(raw, |e| skipped.push(e.to_string()));
        for entity in &skipped {
            handler.skipped_entity(entity)?;
        }
        attributes.push(name, value);
    }
    Ok(attributes)
}

fn deliver_text(text: &str, handler: &mut dyn XamlHandler) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    if is_xml_whitespace(text) {
        handler.ignorable_whitespace(text)
    } else {
        handler.characters(text)
    }
}

/// Parse `xml` and feed every event to `handler`.
///
/// Malformed markup (mismatched end tags, bad attributes, invalid UTF-8)
/// fails with [`Error::Xml`] or [`Error::InvalidFormat`]; a handler error
/// stops the parse and is returned unchanged.
pub fn parse(xml: &str, handler: &mut dyn XamlHandler) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                let attributes = read_attributes(e, handler)?;
                handler.start_element(&name, &attributes)?;
            },
            Ok(Event::Empty(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                let attributes = read_attributes(e, handler)?;
                handler.start_element(&name, &attributes)?;
                handler.end_element(&name)?;
            },
            Ok(Event::End(ref e)) => {
                let qname = e.name();
                let name = std::str::from_utf8(qname.as_ref())?;
                handler.end_element(name)?;
            },
            Ok(Event::Text(ref e)) => {
                let raw = std::str::from_utf8(e)?;
                let mut skipped = Vec::new();
                let text = decode_entities(raw, |name| skipped.push(name.to_string()));
                deliver_text(&text, handler)?;
                for entity in &skipped {
                    handler.skipped_entity(entity)?;
                }
            },
            Ok(Event::CData(ref e)) => {
                let text = std::str::from_utf8(e)?;
                deliver_text(text, handler)?;
            },
            Ok(Event::GeneralRef(ref e)) => {
                let name = std::str::from_utf8(e)?;
                match resolve_entity(name) {
                    EntityRef::Char(c) => {
                        let mut utf8 = [0u8; 4];
                        handler.characters(c.encode_utf8(&mut utf8))?;
                    },
                    EntityRef::Skipped(name) => handler.skipped_entity(name)?,
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(())
}
