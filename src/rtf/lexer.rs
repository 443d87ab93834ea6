//! RTF lexer/tokenizer.
//!
//! Turns the RTF byte stream into [`Token`]s one at a time. Text runs are
//! decoded under the code page of the format state passed to
//! [`Lexer::next_token`], with `\'hh` escapes merged into the surrounding
//! literal bytes so that double-byte code pages decode across escapes.
//!
//! Three side channels let the reader consume input that is not tokenized:
//! `\binN` payloads ([`Lexer::advance_for_binary`]), `\uN` fallback text
//! ([`Lexer::advance_for_unicode`]) and picture hex data
//! ([`Lexer::write_image_data`]).

use super::control::{self, ControlWordInfo};
use crate::common::encoding::decode_bytes;
use crate::document::format::{Destination, FormatState};
use smallvec::SmallVec;

/// Longest parameter accepted before the token is considered invalid.
const MAX_PARAMETER_DIGITS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `{`
    GroupStart,
    /// `}`
    GroupEnd,
    /// `\word[N]` or an unrecognized control symbol
    Control,
    /// `\*`
    Destination,
    /// Literal text and `\'hh` escapes, decoded
    Text,
    /// Control symbol standing for one character (`\\`, `\{`, `\~`, ...)
    TextSymbol,
    /// Hex picture payload follows; read it with [`Lexer::write_image_data`]
    PictureData,
    /// Malformed input
    Invalid,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub parameter: i64,
    pub has_parameter: bool,
    /// Decoded text, or the control word itself for [`TokenKind::Control`]
    pub text: String,
    /// Table entry for a recognized control word
    pub control: Option<&'static ControlWordInfo>,
}

impl Token {
    fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            parameter: 0,
            has_parameter: false,
            text: String::new(),
            control: None,
        }
    }

    fn with_text(kind: TokenKind, text: impl Into<String>) -> Self {
        let mut token = Self::new(kind);
        token.text = text.into();
        token
    }

    /// Value of an on/off control word: the parameter, or 1 when absent.
    #[inline]
    pub fn toggle_value(&self) -> i64 {
        if self.has_parameter { self.parameter } else { 1 }
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.toggle_value() > 0
    }
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    /// High nibble of a picture byte split across reads
    nibble: Option<u8>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            nibble: None,
        }
    }

    /// Byte offset of the next unread input.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn peek(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Read the next token. Text is decoded under `format.code_page`; inside
    /// a picture destination, literal data is reported as
    /// [`TokenKind::PictureData`] without being consumed.
    pub fn next_token(&mut self, format: &FormatState) -> Token {
        loop {
            let Some(b) = self.peek(0) else {
                return Token::new(TokenKind::Eof);
            };
            match b {
                b'{' => {
                    self.pos += 1;
                    return Token::new(TokenKind::GroupStart);
                },
                b'}' => {
                    self.pos += 1;
                    return Token::new(TokenKind::GroupEnd);
                },
                b'\r' | b'\n' | 0 => self.pos += 1,
                b'\\' => {
                    if self.peek(1) == Some(b'\'') && format.dest != Destination::Picture {
                        return self.text_run(format);
                    }
                    return self.control();
                },
                _ if format.dest == Destination::Picture => {
                    return Token::new(TokenKind::PictureData);
                },
                _ => return self.text_run(format),
            }
        }
    }

    fn control(&mut self) -> Token {
        // Skip '\'
        self.pos += 1;
        let Some(c) = self.peek(0) else {
            return Token::with_text(TokenKind::Invalid, "\\ at end of input");
        };

        if c.is_ascii_alphabetic() {
            return self.control_word();
        }

        self.pos += 1;
        match c {
            b'*' => Token::new(TokenKind::Destination),
            b'\\' | b'{' | b'}' => Token::with_text(TokenKind::TextSymbol, (c as char).to_string()),
            b'~' => Token::with_text(TokenKind::TextSymbol, "\u{00A0}"),
            b'-' => Token::with_text(TokenKind::TextSymbol, "\u{00AD}"),
            b'_' => Token::with_text(TokenKind::TextSymbol, "\u{2011}"),
            b'\r' | b'\n' => self.named_control("par"),
            b'\t' => self.named_control("tab"),
            b'\'' => Token::with_text(TokenKind::Invalid, "malformed \\' escape"),
            _ => {
                // Unknown control symbol (\|, \:, ...): carried without a table entry.
                let mut token = Token::new(TokenKind::Control);
                token.text.push(c as char);
                token
            },
        }
    }

    fn named_control(&self, word: &str) -> Token {
        let mut token = Token::with_text(TokenKind::Control, word);
        token.control = control::lookup(word);
        token
    }

    fn control_word(&mut self) -> Token {
        let start = self.pos;
        while self.peek(0).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        // Alphabetic bytes are ASCII.
        let word = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();

        let mut token = Token::new(TokenKind::Control);
        let param_start = self.pos;
        if self.peek(0) == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = self.pos - digits_start;
        if digits > 0 {
            if digits > MAX_PARAMETER_DIGITS {
                return Token::with_text(
                    TokenKind::Invalid,
                    format!("parameter of \\{} too long", word),
                );
            }
            match atoi_simd::parse::<i64, false, false>(&self.input[param_start..self.pos]) {
                Ok(value) => {
                    token.parameter = value;
                    token.has_parameter = true;
                },
                Err(_) => {
                    return Token::with_text(
                        TokenKind::Invalid,
                        format!("bad parameter of \\{}", word),
                    );
                },
            }
        } else {
            // A lone '-' is not a parameter.
            self.pos = param_start;
        }

        // Optional space delimiter
        if self.peek(0) == Some(b' ') {
            self.pos += 1;
        }

        token.control = control::lookup(&word);
        token.text = word;
        token
    }

    fn text_run(&mut self, format: &FormatState) -> Token {
        let mut bytes = SmallVec::<[u8; 64]>::new();
        while let Some(b) = self.peek(0) {
            match b {
                b'{' | b'}' => break,
                b'\r' | b'\n' | 0 => self.pos += 1,
                b'\\' => {
                    if self.peek(1) != Some(b'\'') {
                        break;
                    }
                    let hi = self.peek(2).and_then(hex_value);
                    let lo = self.peek(3).and_then(hex_value);
                    match (hi, lo) {
                        (Some(hi), Some(lo)) => {
                            bytes.push((hi << 4) | lo);
                            self.pos += 4;
                        },
                        _ if bytes.is_empty() => {
                            self.pos = (self.pos + 2).min(self.input.len());
                            return Token::with_text(TokenKind::Invalid, "malformed \\' escape");
                        },
                        _ => break,
                    }
                },
                _ => {
                    bytes.push(b);
                    self.pos += 1;
                },
            }
        }
        Token::with_text(TokenKind::Text, decode_bytes(&bytes, format.code_page))
    }

    /// Consume up to `count` raw bytes following `\binN`.
    pub fn advance_for_binary(&mut self, count: i64) -> &'a [u8] {
        let count = usize::try_from(count).unwrap_or(0);
        let end = self.pos.saturating_add(count).min(self.input.len());
        let data = &self.input[self.pos..end];
        self.pos = end;
        data
    }

    /// Skip the `skip` fallback units following a `\uN` escape. A byte, a
    /// `\'hh` escape or a control word each count as one unit; group
    /// delimiters end the fallback early.
    pub fn advance_for_unicode(&mut self, skip: i64) {
        let mut remaining = skip;
        while remaining > 0 {
            let Some(b) = self.peek(0) else { break };
            match b {
                b'{' | b'}' => break,
                b'\r' | b'\n' => {
                    self.pos += 1;
                    continue;
                },
                b'\\' => match self.peek(1) {
                    Some(b'\'') => self.pos = (self.pos + 4).min(self.input.len()),
                    Some(c) if c.is_ascii_alphabetic() => {
                        self.pos += 1;
                        while self.peek(0).is_some_and(|b| b.is_ascii_alphabetic()) {
                            self.pos += 1;
                        }
                        if self.peek(0) == Some(b'-') {
                            self.pos += 1;
                        }
                        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
                            self.pos += 1;
                        }
                        if self.peek(0) == Some(b' ') {
                            self.pos += 1;
                        }
                    },
                    _ => self.pos = (self.pos + 2).min(self.input.len()),
                },
                _ => self.pos += 1,
            }
            remaining -= 1;
        }
    }

    /// Forget any half-read picture byte; called when a picture starts.
    #[inline]
    pub fn reset_image_data(&mut self) {
        self.nibble = None;
    }

    /// Decode hex picture data up to the next control word or group
    /// delimiter, appending the bytes to `sink`. Whitespace is skipped.
    pub fn write_image_data(&mut self, sink: &mut Vec<u8>) {
        let rest = &self.input[self.pos..];
        let end = memchr::memchr3(b'\\', b'{', b'}', rest).unwrap_or(rest.len());
        for &b in &rest[..end] {
            if let Some(v) = hex_value(b) {
                match self.nibble.take() {
                    Some(hi) => sink.push((hi << 4) | v),
                    None => self.nibble = Some(v),
                }
            }
        }
        self.pos += end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::format::Destination;

    fn tokens(input: &[u8], format: &FormatState) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token(format);
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn test_simple_tokenization() {
        let format = FormatState::default();
        let toks = tokens(br"{\rtf1\ansi Hello}", &format);
        assert_eq!(toks.len(), 5);
        assert_eq!(toks[0].kind, TokenKind::GroupStart);
        assert_eq!(toks[1].text, "rtf");
        assert_eq!(toks[1].parameter, 1);
        assert!(toks[1].has_parameter);
        assert_eq!(toks[2].text, "ansi");
        assert!(!toks[2].has_parameter);
        assert_eq!(toks[3].kind, TokenKind::Text);
        assert_eq!(toks[3].text, "Hello");
        assert_eq!(toks[4].kind, TokenKind::GroupEnd);
    }

    #[test]
    fn test_negative_parameter_and_toggle() {
        let format = FormatState::default();
        let toks = tokens(br"\fi-360\b0\b", &format);
        assert_eq!(toks[0].parameter, -360);
        assert!(!toks[1].is_on());
        assert!(toks[2].is_on());
    }

    #[test]
    fn test_hex_escapes_merge_with_text() {
        let format = FormatState::default();
        let toks = tokens(br"caf\'e9 ok", &format);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].text, "caf\u{e9} ok");
    }

    #[test]
    fn test_double_byte_escapes() {
        let mut format = FormatState::default();
        format.code_page = 932;
        let toks = tokens(br"\'93\'fa\'96\'7b", &format);
        assert_eq!(toks[0].text, "日本");
    }

    #[test]
    fn test_control_symbols() {
        let format = FormatState::default();
        let toks = tokens(br"\{\~\*\|", &format);
        assert_eq!(toks[0].kind, TokenKind::TextSymbol);
        assert_eq!(toks[0].text, "{");
        assert_eq!(toks[1].text, "\u{a0}");
        assert_eq!(toks[2].kind, TokenKind::Destination);
        assert_eq!(toks[3].kind, TokenKind::Control);
        assert!(toks[3].control.is_none());
    }

    #[test]
    fn test_invalid_tokens() {
        let format = FormatState::default();
        assert_eq!(tokens(br"\'zz", &format)[0].kind, TokenKind::Invalid);
        assert_eq!(tokens(b"abc\\", &format)[1].kind, TokenKind::Invalid);
        assert_eq!(
            tokens(br"\fs9999999999999999999999", &format)[0].kind,
            TokenKind::Invalid
        );
    }

    #[test]
    fn test_unicode_skip() {
        let format = FormatState::default();
        let mut lexer = Lexer::new(br"\u8220\'93x");
        let token = lexer.next_token(&format);
        assert_eq!(token.parameter, 8220);
        lexer.advance_for_unicode(1);
        assert_eq!(lexer.next_token(&format).text, "x");

        let mut lexer = Lexer::new(br"\u8220\endash y");
        lexer.next_token(&format);
        lexer.advance_for_unicode(1);
        assert_eq!(lexer.next_token(&format).text, "y");

        let mut lexer = Lexer::new(br"\u8220}");
        lexer.next_token(&format);
        lexer.advance_for_unicode(2);
        assert_eq!(lexer.next_token(&format).kind, TokenKind::GroupEnd);
    }

    #[test]
    fn test_binary() {
        let format = FormatState::default();
        let mut lexer = Lexer::new(b"\\bin3 \x00{}rest");
        let token = lexer.next_token(&format);
        assert_eq!(token.text, "bin");
        assert_eq!(lexer.advance_for_binary(token.parameter), b"\x00{}");
        assert_eq!(lexer.next_token(&format).text, "rest");
    }

    #[test]
    fn test_picture_data() {
        let mut format = FormatState::default();
        format.dest = Destination::Picture;
        let mut lexer = Lexer::new(b"89 50\n4e 4}");
        assert_eq!(lexer.next_token(&format).kind, TokenKind::PictureData);
        let mut sink = Vec::new();
        lexer.reset_image_data();
        lexer.write_image_data(&mut sink);
        assert_eq!(sink, vec![0x89, 0x50, 0x4e]);
        assert_eq!(lexer.next_token(&format).kind, TokenKind::GroupEnd);
    }

    #[test]
    fn test_backslash_newline_is_par() {
        let format = FormatState::default();
        let toks = tokens(b"a\\\nb", &format);
        assert_eq!(toks[1].text, "par");
        assert!(toks[1].control.is_some());
    }
}
