//! Embedded picture extraction.
//!
//! `{\pict ...}` groups carry a format word (`\pngblip`, `\jpegblip`,
//! `\wmetafileN`, ...), size words and the payload as hex digits or a
//! `\binN` block. When the group closes the payload is written to the image
//! package and an image node referencing the stored stream is added to the
//! tree. Metafiles are rasterized to PNG first; other formats are skipped.

use super::reader::RtfToXamlReader;
use crate::common::error::Result;
use crate::common::unit::{half_points_to_px, twips_to_px};
use crate::document::{
    DocumentNode, DocumentNodeType, FormatState, ImageFormat, ImageInfo, Stretch, StretchDirection,
};
use crate::images::natural_size;
use std::io::Write;

/// `\picwN` of a metafile is in HIMETRIC (0.01 mm).
const HIMETRIC_PER_INCH: i64 = 2540;
const TWIPS_PER_INCH: i64 = 1440;
const TWIPS_PER_PX: i64 = 15;

/// Rendered extent along one axis, in twips.
fn extent_twips(goal: i64, declared: i64, natural_px: Option<u32>, format: ImageFormat) -> i64 {
    if goal > 0 {
        goal
    } else if format == ImageFormat::Wmf {
        declared * TWIPS_PER_INCH / HIMETRIC_PER_INCH
    } else if declared > 0 {
        declared * TWIPS_PER_PX
    } else {
        natural_px.map_or(0, |px| i64::from(px) * TWIPS_PER_PX)
    }
}

fn scaled_px(twips: i64, scale: i64) -> f64 {
    let scale = if scale == 0 { 100 } else { scale };
    twips_to_px(twips) * scale as f64 / 100.0
}

#[cfg(feature = "imgconv")]
fn rasterize_wmf(data: &[u8], size_hint: (u32, u32)) -> Option<Vec<u8>> {
    let hint = (size_hint.0 > 0 && size_hint.1 > 0).then_some(size_hint);
    match crate::images::wmf::wmf_to_png(data, hint) {
        Ok(png) => Some(png),
        Err(e) => {
            log::debug!("metafile not rasterized: {}", e);
            None
        },
    }
}

#[cfg(not(feature = "imgconv"))]
fn rasterize_wmf(_data: &[u8], _size_hint: (u32, u32)) -> Option<Vec<u8>> {
    None
}

impl<'a> RtfToXamlReader<'a> {
    /// A `\pict` group closed with `state` as its final state.
    pub(super) fn handle_image(&mut self, state: &FormatState) -> Result<()> {
        let data = std::mem::take(&mut self.picture);
        self.lexer.reset_image_data();

        let parent_dest = self.stack.top().dest;
        if !parent_dest.is_content() || self.stack.top().hidden {
            return Ok(());
        }
        if state.pic_scale_x < 0 || state.pic_scale_y < 0 {
            return Ok(());
        }
        let Some(mime_type) = state.image_format.mime_type() else {
            log::debug!("skipping picture in unsupported format {:?}", state.image_format);
            return Ok(());
        };
        if data.is_empty() {
            return self.absorb("picture without payload");
        }

        let natural = natural_size(&data);
        let width_twips = extent_twips(
            state.pic_width_goal,
            state.pic_width,
            natural.map(|n| n.0),
            state.image_format,
        );
        let height_twips = extent_twips(
            state.pic_height_goal,
            state.pic_height,
            natural.map(|n| n.1),
            state.image_format,
        );
        let width = scaled_px(width_twips, state.pic_scale_x);
        let height = scaled_px(height_twips, state.pic_scale_y);

        let payload = if state.image_format == ImageFormat::Wmf {
            let hint = (width.round().max(0.0) as u32, height.round().max(0.0) as u32);
            match rasterize_wmf(&data, hint) {
                Some(png) => png,
                None => {
                    log::debug!("skipping metafile picture");
                    return Ok(());
                },
            }
        } else {
            data
        };

        let name = match self.write_image(mime_type, &payload) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("failed to store picture: {}", e);
                return self.absorb(format!("picture not stored: {}", e));
            },
        };
        self.image_count += 1;

        let baseline_offset = (state.script_offset > 0)
            .then(|| height - half_points_to_px(state.script_offset));
        let mut format = state.clone();
        format.dest = parent_dest;
        let mut node = DocumentNode::leaf(DocumentNodeType::Image, format);
        node.image = Some(Box::new(ImageInfo {
            source: name,
            width,
            height,
            baseline_offset,
            stretch: Stretch::Fill,
            stretch_direction: StretchDirection::Both,
        }));
        self.doc.push(node);
        Ok(())
    }

    fn write_image(&mut self, mime_type: &str, payload: &[u8]) -> Result<String> {
        let (mut stream, name) = self.package.create_image_stream(self.image_count, mime_type)?;
        stream.write_all(payload)?;
        stream.flush()?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::document::DocumentNodeType;
    use crate::images::MemoryImagePackage;
    use crate::options::ConvertOptions;
    use crate::rtf::RtfToXamlReader;

    /// 1x1 PNG header (signature + IHDR) followed by a truncated body.
    const PNG_HEX: &str = "89504e470d0a1a0a0000000d4948445200000001000000010806000000";

    fn run(input: &str) -> (Vec<crate::document::DocumentNode>, MemoryImagePackage) {
        let mut package = MemoryImagePackage::new();
        let options = ConvertOptions::default();
        let nodes = {
            let mut reader = RtfToXamlReader::new(input.as_bytes(), &mut package, &options);
            reader.process().unwrap();
            reader.document().nodes().to_vec()
        };
        (nodes, package)
    }

    #[test]
    fn test_png_payload_stored() {
        let input = format!(r"{{\rtf1{{\pict\pngblip\picw1\pich1\picwgoal150\pichgoal300 {}}}}}", PNG_HEX);
        let (nodes, package) = run(&input);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, DocumentNodeType::Image);
        let info = nodes[0].image.as_ref().unwrap();
        assert_eq!(info.source, "Image1.png");
        assert_eq!(info.width, 10.0);
        assert_eq!(info.height, 20.0);
        assert_eq!(package.get("Image1.png").map(|d| d.len()), Some(PNG_HEX.len() / 2));
    }

    #[test]
    fn test_scale_applies() {
        let input = format!(r"{{\rtf1{{\pict\pngblip\picwgoal150\pichgoal150\picscalex200\picscaley50 {}}}}}", PNG_HEX);
        let (nodes, _) = run(&input);
        let info = nodes[0].image.as_ref().unwrap();
        assert_eq!(info.width, 20.0);
        assert_eq!(info.height, 5.0);
    }

    #[test]
    fn test_natural_size_fallback() {
        let input = format!(r"{{\rtf1{{\pict\pngblip {}}}}}", PNG_HEX);
        let (nodes, _) = run(&input);
        let info = nodes[0].image.as_ref().unwrap();
        assert_eq!(info.width, 1.0);
        assert_eq!(info.height, 1.0);
    }

    #[test]
    fn test_unsupported_format_skipped() {
        let (nodes, package) = run(r"{\rtf1 a{\pict\macpict 0102}b}");
        assert!(nodes.iter().all(|n| n.kind != DocumentNodeType::Image));
        assert!(package.is_empty());
    }

    #[test]
    fn test_negative_scale_suppresses() {
        let input = format!(r"{{\rtf1{{\pict\pngblip\picscalex-1 {}}}}}", PNG_HEX);
        let (nodes, package) = run(&input);
        assert!(nodes.is_empty());
        assert!(package.is_empty());
    }

    #[test]
    fn test_subscript_picture_baseline() {
        let input = format!(r"{{\rtf1{{\dn6{{\pict\pngblip\picwgoal150\pichgoal300 {}}}}}}}", PNG_HEX);
        let (nodes, _) = run(&input);
        let info = nodes[0].image.as_ref().unwrap();
        assert_eq!(info.baseline_offset, Some(16.0));
    }
}
