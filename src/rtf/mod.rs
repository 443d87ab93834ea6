//! RTF (Rich Text Format) reading and writing.
//!
//! Decoding streams tokens from the [`lexer`] through a per-group format
//! stack into the shared document tree; encoding walks a tree built from
//! markup and serializes RTF syntax.
//!
//! # Architecture
//!
//! - **Lexer**: tokenizes RTF input into control words, symbols, text and
//!   picture data
//! - **Control table**: static map from control words to operations
//! - **Reader**: the decode state machine, split over the paragraph, table,
//!   list, field and picture handlers
//! - **Writer**: RTF emission from a markup-built tree
//!
//! # Example
//!
//! ```rust
//! use flowrtf::{ConvertOptions, MemoryImagePackage};
//! use flowrtf::rtf::RtfToXamlReader;
//!
//! let options = ConvertOptions::default();
//! let mut package = MemoryImagePackage::new();
//! let xaml = RtfToXamlReader::new(br"{\rtf1\ansi\b Hi\b0}", &mut package, &options).convert()?;
//! assert!(xaml.contains("FontWeight=\"Bold\""));
//! # Ok::<(), flowrtf::Error>(())
//! ```

pub mod control;
pub mod lexer;
pub mod reader;
pub mod tables;
pub mod writer;

mod dispatch;
mod field;
mod list;
mod paragraph;
mod picture;
mod table;

// Re-exports
pub use lexer::{Lexer, Token, TokenKind};
pub use reader::RtfToXamlReader;
pub use tables::{
    Color, ColorTable, Font, FontFamily, FontTable, List, ListLevel, ListOverride,
    ListOverrideTable, ListTable, LookupTables,
};
pub use writer::XamlToRtfWriter;

pub(crate) use paragraph::wrap_stray_inlines;
