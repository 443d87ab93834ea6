//! Code-page utilities shared by the RTF reader and writer.
//!
//! RTF text is byte-oriented: every run of literal bytes and `\'hh` escapes is
//! interpreted under the code page in effect (document `\ansicpg`, or the
//! font's `\fcharset`). This module maps Windows code page identifiers onto
//! `encoding_rs` encodings and back.

use encoding_rs::Encoding;

/// Code page assumed when a document declares none.
pub const DEFAULT_CODE_PAGE: u32 = 1252;

/// Map Windows codepage identifier to encoding_rs Encoding.
///
/// Returns `None` for code pages `encoding_rs` has no table for; callers fall
/// back to [`DEFAULT_CODE_PAGE`].
///
/// # Examples
/// ```
/// use flowrtf::common::encoding::codepage_to_encoding;
///
/// let encoding = codepage_to_encoding(932).unwrap();
/// assert_eq!(encoding.name(), "Shift_JIS");
/// ```
#[inline]
pub fn codepage_to_encoding(codepage: u32) -> Option<&'static Encoding> {
    match codepage {
        // DOS
        437 | 850 => Some(encoding_rs::IBM866),
        866 => Some(encoding_rs::IBM866),

        // Windows, single byte
        874 => Some(encoding_rs::WINDOWS_874),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),

        // East Asian, double byte
        932 | 10001 => Some(encoding_rs::SHIFT_JIS),
        936 | 20936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        20932 => Some(encoding_rs::EUC_JP),
        54936 => Some(encoding_rs::GB18030),

        // ISO 8859
        28591 => Some(encoding_rs::WINDOWS_1252),
        28592 => Some(encoding_rs::ISO_8859_2),
        28595 => Some(encoding_rs::ISO_8859_5),
        28596 => Some(encoding_rs::ISO_8859_6),
        28597 => Some(encoding_rs::ISO_8859_7),
        28598 => Some(encoding_rs::ISO_8859_8),
        28605 => Some(encoding_rs::ISO_8859_15),

        20866 => Some(encoding_rs::KOI8_R),
        21866 => Some(encoding_rs::KOI8_U),
        10000 => Some(encoding_rs::MACINTOSH),

        65001 => Some(encoding_rs::UTF_8),
        _ => None,
    }
}

/// Map an RTF `\fcharsetN` value to the code page it implies.
///
/// Returns `None` for charsets that do not constrain the code page
/// (`DEFAULT_CHARSET`, `SYMBOL_CHARSET`, `OEM_CHARSET`).
pub fn charset_to_codepage(charset: i64) -> Option<u32> {
    let cp = match charset {
        0 => 1252,
        77 => 10000,
        128 => 932,
        129 => 949,
        130 => 1361,
        134 => 936,
        136 => 950,
        161 => 1253,
        162 => 1254,
        163 => 1258,
        177 => 1255,
        178 | 179 | 180 | 181 => 1256,
        186 => 1257,
        204 => 1251,
        222 => 874,
        238 => 1250,
        _ => return None,
    };
    Some(cp)
}

/// Whether a code page uses lead bytes, so that `\'hh` escapes must be joined
/// with their neighbours before decoding.
#[inline]
pub fn is_multibyte_codepage(codepage: u32) -> bool {
    matches!(codepage, 932 | 936 | 949 | 950 | 1361 | 10001 | 20932 | 20936 | 54936)
}

/// Decode bytes under a code page, falling back to Windows-1252.
///
/// ```
/// use flowrtf::common::encoding::decode_bytes;
///
/// assert_eq!(decode_bytes(&[0x93, 0x94], 1252), "\u{201C}\u{201D}");
/// ```
pub fn decode_bytes(bytes: &[u8], codepage: u32) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let encoding = codepage_to_encoding(codepage).unwrap_or(encoding_rs::WINDOWS_1252);
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Encode one character under a code page.
///
/// Returns `None` when the code page cannot represent the character, in which
/// case writers fall back to a `\uN` escape.
pub fn encode_char(ch: char, codepage: u32) -> Option<Vec<u8>> {
    let encoding = codepage_to_encoding(codepage)?;
    let mut buf = [0u8; 4];
    let (bytes, _, had_errors) = encoding.encode(ch.encode_utf8(&mut buf));
    if had_errors { None } else { Some(bytes.into_owned()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepage_to_encoding() {
        assert_eq!(codepage_to_encoding(1252).unwrap().name(), "windows-1252");
        assert_eq!(codepage_to_encoding(936).unwrap().name(), "GBK");
        assert!(codepage_to_encoding(99999).is_none());
    }

    #[test]
    fn test_charset_to_codepage() {
        assert_eq!(charset_to_codepage(128), Some(932));
        assert_eq!(charset_to_codepage(0), Some(1252));
        assert_eq!(charset_to_codepage(1), None);
        assert_eq!(charset_to_codepage(2), None);
    }

    #[test]
    fn test_decode_shift_jis() {
        // "日本" in Shift-JIS
        assert_eq!(decode_bytes(&[0x93, 0xFA, 0x96, 0x7B], 932), "日本");
    }

    #[test]
    fn test_decode_unknown_codepage_falls_back() {
        assert_eq!(decode_bytes(b"abc", 424242), "abc");
    }

    #[test]
    fn test_encode_char() {
        assert_eq!(encode_char('é', 1252), Some(vec![0xE9]));
        assert_eq!(encode_char('€', 1252), Some(vec![0x80]));
        assert_eq!(encode_char('日', 1252), None);
        assert_eq!(encode_char('日', 932), Some(vec![0x93, 0xFA]));
    }
}
