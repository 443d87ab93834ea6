//! Document nodes: the records stored in a [`DocumentNodeArray`].
//!
//! [`DocumentNodeArray`]: super::DocumentNodeArray

use super::format::{FormatState, Stretch, StretchDirection};
use bitflags::bitflags;

/// Node kinds shared by both conversion directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentNodeType {
    Text,
    LineBreak,
    /// Inline formatting container (`Span`, `Bold`, `Italic`, `Underline`)
    Span,
    Paragraph,
    Section,
    Hyperlink,
    Image,
    List,
    ListItem,
    FieldBegin,
    FieldEnd,
    Table,
    TableBody,
    Row,
    Cell,
    InlineUIContainer,
    BlockUIContainer,
    Shape,
}

impl DocumentNodeType {
    /// Nodes that never own children, even while pending.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::Text | Self::LineBreak | Self::Image | Self::FieldBegin | Self::FieldEnd
        )
    }

    #[inline]
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::LineBreak
                | Self::Span
                | Self::Hyperlink
                | Self::Image
                | Self::FieldBegin
                | Self::FieldEnd
                | Self::InlineUIContainer
        )
    }

    #[inline]
    pub fn is_block(self) -> bool {
        !self.is_inline()
    }

    /// Element name in the flow-document vocabulary.
    pub fn xaml_tag(self) -> &'static str {
        match self {
            Self::Text => "Run",
            Self::LineBreak => "LineBreak",
            Self::Span => "Span",
            Self::Paragraph => "Paragraph",
            Self::Section => "Section",
            Self::Hyperlink => "Hyperlink",
            Self::Image => "Image",
            Self::List => "List",
            Self::ListItem => "ListItem",
            Self::FieldBegin | Self::FieldEnd => "",
            Self::Table => "Table",
            Self::TableBody => "TableRowGroup",
            Self::Row => "TableRow",
            Self::Cell => "TableCell",
            Self::InlineUIContainer => "InlineUIContainer",
            Self::BlockUIContainer => "BlockUIContainer",
            Self::Shape => "Section",
        }
    }
}

bitflags! {
    /// Lifecycle and rendering flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Scope still open; a pending container owns every later node
        const PENDING = 0x01;
        /// Field marker paired with its counterpart
        const MATCHED = 0x02;
        /// Field scaffolding that has been processed
        const TERMINATED = 0x04;
        /// Not rendered
        const HIDDEN = 0x08;
    }
}

/// Picture reference carried by an [`DocumentNodeType::Image`] node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageInfo {
    /// Name of the payload stream in the image package
    pub source: String,
    /// Rendered size in pixels
    pub width: f64,
    pub height: f64,
    pub baseline_offset: Option<f64>,
    pub stretch: Stretch,
    pub stretch_direction: StretchDirection,
}

/// One record of the flat document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNode {
    pub kind: DocumentNodeType,
    pub format: FormatState,
    /// Text content (runs) or accumulated instruction text
    pub content: String,
    pub flags: NodeFlags,
    /// Number of descendants; only meaningful once closed
    pub child_count: usize,
    /// Nesting level, 0 for top-level nodes. Maintained by the array.
    pub depth: u32,
    pub navigate_uri: Option<String>,
    /// Hyperlink target frame
    pub target_name: Option<String>,
    pub list_label: Option<String>,
    /// Rendered start index of a list continuing an earlier one, -1 if none
    pub list_start: i64,
    pub row_span: u32,
    pub col_span: u32,
    /// Column index of a cell within its table grid
    pub column_index: u32,
    /// Column widths in twips (tables)
    pub columns: Vec<i64>,
    pub image: Option<Box<ImageInfo>>,
}

impl DocumentNode {
    /// A new pending node.
    pub fn new(kind: DocumentNodeType, format: FormatState) -> Self {
        Self {
            kind,
            format,
            content: String::new(),
            flags: NodeFlags::PENDING,
            child_count: 0,
            depth: 0,
            navigate_uri: None,
            target_name: None,
            list_label: None,
            list_start: -1,
            row_span: 1,
            col_span: 1,
            column_index: 0,
            columns: Vec::new(),
            image: None,
        }
    }

    /// A closed node that never owns children.
    pub fn leaf(kind: DocumentNodeType, format: FormatState) -> Self {
        let mut node = Self::new(kind, format);
        node.flags.remove(NodeFlags::PENDING);
        node
    }

    pub fn text(content: impl Into<String>, format: FormatState) -> Self {
        let mut node = Self::new(DocumentNodeType::Text, format);
        node.content = content.into();
        node
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.flags.contains(NodeFlags::PENDING)
    }

    #[inline]
    pub fn is_matched(&self) -> bool {
        self.flags.contains(NodeFlags::MATCHED)
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(NodeFlags::HIDDEN)
    }

    /// Whether this node owns `index`, given its own position `at`.
    #[inline]
    pub fn contains(&self, at: usize, index: usize) -> bool {
        if index <= at || self.kind.is_leaf() {
            return false;
        }
        self.is_pending() || index <= at + self.child_count
    }

    /// Text node whose content is only whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.kind == DocumentNodeType::Text && self.content.chars().all(char::is_whitespace)
    }
}
