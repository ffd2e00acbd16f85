//! PDF Parser Module
//!
//! Cross-reference loading and indirect-object resolution according to
//! ISO 32000-1 Sections 7.5 (File Structure) and 7.6 (Encryption).

pub mod document;
pub mod filters;
pub mod header;
pub mod linearized;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod rebuild;
pub mod syntax;
pub mod xref;
pub mod xref_stream;

pub use self::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
pub use self::reader::{IndirectObject, PdfParser};
pub use self::rebuild::RebuildStats;
pub use self::xref::{ObjectIndex, ObjectKind, ObjectLocation, OffsetSet, TrailerStack};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid cross-reference data")]
    InvalidXRef,

    #[error("Invalid or missing trailer")]
    InvalidTrailer,

    #[error("Circular reference detected")]
    CircularReference,

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("Unexpected end of file")]
    UnexpectedEof,
}

impl ParseError {
    /// Convenience for constructing a syntax error at a position.
    pub(crate) fn syntax(position: u64, message: impl Into<String>) -> Self {
        ParseError::SyntaxError {
            position,
            message: message.into(),
        }
    }
}
