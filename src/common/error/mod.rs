//! Unified error types for flowrtf.
//!
//! Both conversion directions report failures through one error type. Only a
//! malformed lexical token (decode) or malformed markup (encode) is fatal;
//! everything else is absorbed and logged unless strict mode is enabled.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
