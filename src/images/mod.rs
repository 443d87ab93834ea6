//! Image payload handling
//!
//! Pictures never live inside the document tree: the tree only carries the
//! name of a stream in an `ImagePackage`. This module provides the package
//! abstraction, payload sniffing and sizing, and (with the `imgconv` feature)
//! rasterizing of Windows metafiles to PNG.
//!
//! # Architecture
//!
//! - `package`: the `ImagePackage` trait plus in-memory and directory backends
//! - `sizing`: natural size from PNG/JPEG headers, stretch-mode scale factors
//! - `wmf`: WMF parsing and PNG re-encoding

pub mod package;
pub mod sizing;
#[cfg(feature = "imgconv")]
pub mod wmf;

pub use package::{DirectoryImagePackage, ImagePackage, MemoryImagePackage, image_name};
pub use sizing::{PayloadKind, compute_scale, natural_size, sniff};
