//! XML text helpers: escaping for the markup writer and entity decoding for
//! the markup push-parser.

mod escape;

pub use escape::{EntityRef, decode_entities, escape_xml, resolve_entity};
