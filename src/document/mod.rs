//! Document model shared by both conversion directions.
//!
//! The RTF reader and the markup tree builder produce the same structure: a
//! [`DocumentNodeArray`] of [`DocumentNode`] records, each capturing the
//! [`FormatState`] in effect when it was opened.
//!
//! # Architecture
//!
//! - `format`: the inheritable formatting context and the stack that tracks it
//! - `node`: node kinds, flags and per-node payloads
//! - `array`: the flat tree with derived parent/child ranges

pub mod array;
pub mod format;
pub mod node;

pub use array::DocumentNodeArray;
pub use format::{
    BorderFormat, BorderKind, BorderSide, BorderTarget, Borders, CellFormat, Destination,
    Direction, FontStretch, FormatStack, FormatState, ImageFormat, MAX_LIST_DEPTH, MAX_TABLE_DEPTH,
    MarkerStyle, Padding,
    RowFormat, ScriptKind, Stretch, StretchDirection, StrikeKind, TextAlignment, UnderlineKind,
    VerticalAlignment,
};
pub use node::{DocumentNode, DocumentNodeType, ImageInfo, NodeFlags};
