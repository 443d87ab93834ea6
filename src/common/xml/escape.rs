use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<Option<AhoCorasick>> =
    Lazy::new(|| AhoCorasick::builder().build(["&", "<", ">", "\""]).ok());

const XML_REPLACEMENTS: [&str; 4] = ["&amp;", "&lt;", "&gt;", "&quot;"];

/// Escape XML special characters for text content and attribute values.
///
/// # Examples
///
/// ```
/// use flowrtf::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<\"x\">"), "&lt;&quot;x&quot;&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    match XML_ESCAPER.as_ref() {
        Some(ac) => ac.replace_all(s, &XML_REPLACEMENTS),
        None => s
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;"),
    }
}

/// A single entity reference found while decoding markup text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef<'a> {
    /// Decoded to a character
    Char(char),
    /// Well-formed but not one the decoder knows; reported as skipped
    Skipped(&'a str),
}

/// Resolve one entity name (the text between `&` and `;`).
pub fn resolve_entity(name: &str) -> EntityRef<'_> {
    let ch = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
        },
    };
    match ch {
        Some(c) => EntityRef::Char(c),
        None => EntityRef::Skipped(name),
    }
}

/// Decode the five predefined entities and numeric character references.
///
/// Unknown entities are dropped from the output and passed to `skipped`.
/// An `&` without a terminating `;` is kept literally.
///
/// ```
/// use flowrtf::common::xml::decode_entities;
///
/// let mut skipped = Vec::new();
/// let text = decode_entities("a&#65;&#x42;&lt;&nbsp;", |e| skipped.push(e.to_string()));
/// assert_eq!(text, "aAB<");
/// assert_eq!(skipped, ["nbsp"]);
/// ```
pub fn decode_entities(s: &str, mut skipped: impl FnMut(&str)) -> String {
    let Some(first) = memchr::memchr(b'&', s.as_bytes()) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut rest = &s[first..];
    while let Some(amp) = memchr::memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match memchr::memchr(b';', after.as_bytes()) {
            Some(semi) => {
                match resolve_entity(&after[..semi]) {
                    EntityRef::Char(c) => out.push(c),
                    EntityRef::Skipped(name) => skipped(name),
                }
                rest = &after[semi + 1..];
            },
            None => {
                out.push('&');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = "if a < b && c > \"d\"";
        let escaped = escape_xml(raw);
        assert_eq!(decode_entities(&escaped, |_| {}), raw);
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(resolve_entity("#8226"), EntityRef::Char('\u{2022}'));
        assert_eq!(resolve_entity("#x1F600"), EntityRef::Char('\u{1F600}'));
        assert_eq!(resolve_entity("#xD800"), EntityRef::Skipped("#xD800"));
    }

    #[test]
    fn test_unterminated_ampersand() {
        assert_eq!(decode_entities("a & b", |_| {}), "a & b");
    }
}
