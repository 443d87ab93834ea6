//! Common types, traits, and utilities shared by both conversion directions.

// Submodule declarations
pub mod encoding;
pub mod error;
pub mod unit;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, Result};
