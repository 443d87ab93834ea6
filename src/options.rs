//! Conversion options shared by both directions.

use crate::common::encoding::DEFAULT_CODE_PAGE;
use crate::document::format::Stretch;

/// Options controlling RTF and XAML conversion.
///
/// # Examples
///
/// ```
/// use flowrtf::ConvertOptions;
///
/// let options = ConvertOptions::default()
///     .with_force_paragraph(true)
///     .with_default_font_name("Calibri");
/// assert!(options.force_paragraph);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Wrap trailing inline content in a paragraph even when the document
    /// has no block content
    pub force_paragraph: bool,
    /// Reject malformed input instead of dropping it
    pub strict: bool,
    /// Code page assumed before `\ansicpg`
    pub default_code_page: u32,
    /// Font written as `\f0` when the markup names none
    pub default_font_name: String,
    /// `\deftab` value in twips
    pub default_tab_width: i32,
    /// Stretch mode for images that do not declare one
    pub image_stretch: Stretch,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            force_paragraph: false,
            strict: false,
            default_code_page: DEFAULT_CODE_PAGE,
            default_font_name: "Times New Roman".to_string(),
            default_tab_width: 720,
            image_stretch: Stretch::Uniform,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force_paragraph(mut self, force: bool) -> Self {
        self.force_paragraph = force;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_default_code_page(mut self, code_page: u32) -> Self {
        self.default_code_page = code_page;
        self
    }

    pub fn with_default_font_name(mut self, name: impl Into<String>) -> Self {
        self.default_font_name = name.into();
        self
    }

    pub fn with_default_tab_width(mut self, twips: i32) -> Self {
        self.default_tab_width = twips;
        self
    }

    pub fn with_image_stretch(mut self, stretch: Stretch) -> Self {
        self.image_stretch = stretch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert!(!options.force_paragraph);
        assert!(!options.strict);
        assert_eq!(options.default_code_page, 1252);
        assert_eq!(options.default_font_name, "Times New Roman");
        assert_eq!(options.default_tab_width, 720);
        assert_eq!(options.image_stretch, Stretch::Uniform);
    }

    #[test]
    fn test_builders() {
        let options = ConvertOptions::new()
            .with_strict(true)
            .with_default_code_page(932)
            .with_default_tab_width(360)
            .with_image_stretch(Stretch::Fill);
        assert!(options.strict);
        assert_eq!(options.default_code_page, 932);
        assert_eq!(options.default_tab_width, 360);
        assert_eq!(options.image_stretch, Stretch::Fill);
    }
}
