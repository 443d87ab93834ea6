//! Error type definitions.
use thiserror::Error;

/// Main error type for flowrtf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from an image package
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The RTF lexer produced an invalid token; the conversion is aborted
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The markup push-parser failed
    #[error("XML error: {0}")]
    Xml(String),

    /// Strict mode rejected input that the permissive converter would absorb
    #[error("Rejected: {0}")]
    Rejected(String),

    /// An embedded image payload could not be decoded or re-encoded
    #[error("Image error: {0}")]
    Image(String),
}

impl Error {
    /// Whether this error aborts a conversion in permissive mode.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidFormat(_) | Error::Xml(_))
    }
}

/// Result type for flowrtf operations.
pub type Result<T> = std::result::Result<T, Error>;
