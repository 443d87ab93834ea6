//! Flow-document markup reading and writing.
//!
//! # Architecture
//!
//! - `parser`: push-parser over the markup text, built on `quick-xml`
//! - `builder`: parser events to the shared document tree
//! - `lists`: list tables, list indents and item labels for a built tree
//! - `tags`: static element, attribute and enumeration lookup tables
//! - `writer`: markup emission from a decoded tree

pub mod builder;
pub mod lists;
pub mod parser;
pub mod tags;
pub mod writer;

pub use builder::{XamlTreeBuilder, build_tree};
pub use parser::{Attributes, XamlHandler, parse};
pub use writer::write_xaml;
