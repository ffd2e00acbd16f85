use thiserror::Error;

use crate::parser::ParseError;

/// Crate-level error type.
///
/// Most failures originate in the parser and carry a [`ParseError`]; the
/// remaining variants cover I/O performed outside a parse.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;
