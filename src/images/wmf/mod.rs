// Windows Metafile (WMF) support
//
// RTF embeds WMF pictures as `\wmetafile8` payloads without the placeable
// header. Flow documents cannot display metafiles, so the reader re-encodes
// them to PNG: an embedded DIB is extracted when the metafile only blits a
// bitmap, otherwise a placeholder of the declared size is produced.
//
// References:
// - [MS-WMF]: Windows Metafile Format Specification

pub mod converter;
pub mod parser;

pub use converter::WmfConverter;
pub use parser::WmfParser;

use crate::common::error::Result;

/// Re-encode a WMF payload as PNG. `size_hint` is the picture size in
/// pixels declared by the surrounding document, used when the metafile
/// carries no placeable header.
pub fn wmf_to_png(data: &[u8], size_hint: Option<(u32, u32)>) -> Result<Vec<u8>> {
    let parser = WmfParser::new(data)?;
    WmfConverter::new(parser, size_hint).convert_to_png()
}
