//! flowrtf - Bidirectional RTF and flow-document converter
//!
//! This library converts Rich Text Format documents into flow-document XAML
//! markup and back. Both directions share one document model: a flat,
//! index-addressed tree of nodes, each carrying the complete formatting
//! context in effect where it was opened.
//!
//! # Features
//!
//! - **Streaming RTF decoding**: one pass over the tokens, tolerant of the
//!   malformed input real-world writers produce
//! - **Lists and tables**: old-style `\pn` and `\ls` numbering, nested
//!   tables, merged cells
//! - **Fields**: hyperlinks, `SYMBOL` and `INCLUDEPICTURE`
//! - **Images**: PNG and JPEG payloads, WMF rasterized to PNG (feature
//!   `imgconv`), stored in a pluggable [`ImagePackage`]
//! - **Code pages**: single- and double-byte ANSI code pages via
//!   `encoding_rs`
//!
//! # Example - RTF to markup
//!
//! ```
//! use flowrtf::{ConvertOptions, MemoryImagePackage, rtf_to_xaml};
//!
//! let mut package = MemoryImagePackage::new();
//! let xaml = rtf_to_xaml(br"{\rtf1\ansi\b Hi\b0}", &mut package, &ConvertOptions::default())?;
//! assert!(xaml.contains(r#"<Run FontWeight="Bold">Hi</Run>"#));
//! # Ok::<(), flowrtf::Error>(())
//! ```
//!
//! # Example - markup to RTF
//!
//! ```
//! use flowrtf::{ConvertOptions, MemoryImagePackage, xaml_to_rtf};
//!
//! let package = MemoryImagePackage::new();
//! let rtf = xaml_to_rtf(
//!     r#"<Paragraph TextAlignment="Center"><Run>Hi</Run></Paragraph>"#,
//!     &package,
//!     &ConvertOptions::default(),
//! )?;
//! assert!(rtf.contains(r"\qc Hi\par"));
//! # Ok::<(), flowrtf::Error>(())
//! ```

/// Shared infrastructure: errors, units, code pages, XML escaping
pub mod common;

/// Document tree shared by both conversion directions
pub mod document;

/// Image payload storage and sizing
pub mod images;

/// Conversion options
pub mod options;

/// RTF decoding and encoding
pub mod rtf;

/// Flow-document markup parsing and writing
pub mod xaml;

pub use common::error::{Error, Result};
pub use images::{DirectoryImagePackage, ImagePackage, MemoryImagePackage};
pub use options::ConvertOptions;
pub use rtf::{RtfToXamlReader, XamlToRtfWriter};

/// Convert an RTF document to flow-document markup.
///
/// Embedded pictures are written to `package`; the markup references them
/// by the names the package hands out.
pub fn rtf_to_xaml(
    rtf: &[u8],
    package: &mut dyn ImagePackage,
    options: &ConvertOptions,
) -> Result<String> {
    log::trace!("rtf_to_xaml: {} bytes", rtf.len());
    RtfToXamlReader::new(rtf, package, options).convert()
}

/// Convert flow-document markup to an RTF document.
///
/// Images are read from `package` by their `Source` name.
pub fn xaml_to_rtf(xaml: &str, package: &dyn ImagePackage, options: &ConvertOptions) -> Result<String> {
    log::trace!("xaml_to_rtf: {} bytes", xaml.len());
    XamlToRtfWriter::new(xaml, package, options).convert()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(rtf: &[u8]) -> String {
        let mut package = MemoryImagePackage::new();
        rtf_to_xaml(rtf, &mut package, &ConvertOptions::default()).unwrap()
    }

    fn encode(xaml: &str) -> String {
        xaml_to_rtf(xaml, &MemoryImagePackage::new(), &ConvertOptions::default()).unwrap()
    }

    #[test]
    fn test_bold_run_without_blocks_is_a_span() {
        let xaml = decode(br"{\rtf1\ansi\b Hi\b0}");
        assert!(xaml.starts_with("<Span "));
        assert!(xaml.contains(r#"<Run FontWeight="Bold">Hi</Run>"#));
        assert!(!xaml.contains("<Paragraph"));
    }

    #[test]
    fn test_hyperlink_field_replaces_scaffolding() {
        let xaml = decode(br#"{\rtf1{\field{\*\fldinst {HYPERLINK "http://x"}}{\fldrslt {X}}}}"#);
        assert_eq!(xaml.matches("<Hyperlink").count(), 1);
        assert!(xaml.contains(r#"NavigateUri="http://x""#));
        assert!(xaml.contains(">X</Run>"));
    }

    #[test]
    fn test_listtext_paragraph_becomes_list() {
        let xaml = decode(br"{\rtf1\ansi\pard\li720\fi-360{\listtext\'B7\tab}\ls1\ilvl0 Item\par}");
        let list = xaml.find("<List").unwrap();
        let item = xaml.find("<ListItem").unwrap();
        let para = xaml.find("<Paragraph").unwrap();
        assert!(list < item && item < para);
        assert!(xaml.contains(r#"MarkerStyle="Disc""#));
        assert!(xaml.contains(">Item</Run>"));
    }

    #[test]
    fn test_invalid_token_is_fatal() {
        let mut package = MemoryImagePackage::new();
        let result = rtf_to_xaml(br"{\rtf1 a\'zz}", &mut package, &ConvertOptions::default());
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_malformed_markup_is_fatal() {
        let result = xaml_to_rtf("<Paragraph><Run></Paragraph>", &MemoryImagePackage::new(), &ConvertOptions::default());
        assert!(matches!(result, Err(Error::Xml(_))));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let markup = concat!(
            r#"<Section>"#,
            r#"<Paragraph TextAlignment="Right"><Run FontStyle="Italic">a</Run><Run>b</Run></Paragraph>"#,
            r#"<Paragraph><Run>c</Run><LineBreak/><Run>d</Run></Paragraph>"#,
            r#"</Section>"#,
        );
        let first = encode(markup);
        let second = encode(&decode(first.as_bytes()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_table_structure() {
        let markup = concat!(
            r#"<Table><TableRowGroup>"#,
            r#"<TableRow><TableCell><Paragraph><Run>a</Run></Paragraph></TableCell><TableCell><Paragraph><Run>b</Run></Paragraph></TableCell></TableRow>"#,
            r#"<TableRow><TableCell><Paragraph><Run>c</Run></Paragraph></TableCell><TableCell><Paragraph><Run>d</Run></Paragraph></TableCell></TableRow>"#,
            r#"</TableRowGroup></Table>"#,
        );
        let xaml = decode(encode(markup).as_bytes());
        assert_eq!(xaml.matches("<Table ").count() + xaml.matches("<Table>").count(), 1);
        assert_eq!(xaml.matches("<TableRow>").count() + xaml.matches("<TableRow ").count(), 2);
        assert_eq!(xaml.matches("<TableCell").count(), 4);
        let order: Vec<usize> = ["a", "b", "c", "d"]
            .iter()
            .map(|t| xaml.find(&format!(">{}</Run>", t)).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_round_trip_nested_list() {
        let markup = concat!(
            r#"<List MarkerStyle="Decimal"><ListItem><Paragraph><Run>one</Run></Paragraph>"#,
            r#"<List MarkerStyle="LowerLatin"><ListItem><Paragraph><Run>inner</Run></Paragraph></ListItem></List>"#,
            r#"</ListItem><ListItem><Paragraph><Run>two</Run></Paragraph></ListItem></List>"#,
        );
        let xaml = decode(encode(markup).as_bytes());
        assert_eq!(xaml.matches("<List ").count() + xaml.matches("<List>").count(), 2);
        assert_eq!(xaml.matches("<ListItem").count(), 3);
        assert!(xaml.contains(r#"MarkerStyle="LowerLatin""#));
    }

    #[test]
    fn test_round_trip_sibling_nested_lists_keep_markers() {
        let markup = concat!(
            r#"<List MarkerStyle="Decimal">"#,
            r#"<ListItem><Paragraph><Run>a</Run></Paragraph><List MarkerStyle="LowerLatin"><ListItem><Paragraph><Run>b</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"<ListItem><Paragraph><Run>c</Run></Paragraph><List MarkerStyle="UpperRoman"><ListItem><Paragraph><Run>d</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"</List>"#,
        );
        let first = encode(markup);
        let xaml = decode(first.as_bytes());
        assert_eq!(xaml.matches("<List ").count() + xaml.matches("<List>").count(), 3);
        assert_eq!(xaml.matches("<ListItem").count(), 4);
        let lower = xaml.find(r#"MarkerStyle="LowerLatin""#).unwrap();
        let c = xaml.find(">c</Run>").unwrap();
        let upper = xaml.find(r#"MarkerStyle="UpperRoman""#).unwrap();
        assert!(lower < c && c < upper);

        let second = encode(&xaml);
        assert_eq!(first, second);
    }

    #[test]
    fn test_image_round_trip_through_package() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&13u32.to_be_bytes());
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&4u32.to_be_bytes());
        png.extend_from_slice(&2u32.to_be_bytes());
        png.extend_from_slice(&[8, 6, 0, 0, 0]);

        let mut source = MemoryImagePackage::new();
        source.insert("pic.png", png.clone());
        let rtf = xaml_to_rtf(
            r#"<Paragraph><Image Source="pic.png" Width="8"/></Paragraph>"#,
            &source,
            &ConvertOptions::default(),
        )
        .unwrap();

        let mut target = MemoryImagePackage::new();
        let xaml = rtf_to_xaml(rtf.as_bytes(), &mut target, &ConvertOptions::default()).unwrap();
        assert_eq!(target.get("Image1.png"), Some(png.as_slice()));
        assert!(xaml.contains(r#"Width="8""#));
        assert!(xaml.contains(r#"Height="4""#));
    }

    #[test]
    fn test_directory_package_feeds_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08];
        jpeg.extend_from_slice(&3u16.to_be_bytes());
        jpeg.extend_from_slice(&5u16.to_be_bytes());
        jpeg.extend_from_slice(&[0; 10]);
        std::fs::write(dir.path().join("a.jpg"), &jpeg).unwrap();

        let package = DirectoryImagePackage::new(dir.path());
        let rtf = xaml_to_rtf(
            r#"<Paragraph><Image Source="a.jpg"/></Paragraph>"#,
            &package,
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(rtf.contains(r"\jpegblip\picw5\pich3"));
    }
}
