//! # crosspdf
//!
//! A pure Rust cross-reference loader and indirect-object resolver for PDF
//! files.
//!
//! The crate discovers a file's object index (the cross-reference table),
//! reconciles incremental updates, understands both the classical textual
//! xref form and PDF 1.5+ cross-reference streams, recovers from corrupted
//! xref data by scanning the file body, and serves random access to indirect
//! objects, including objects packed inside compressed object streams.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crosspdf::PdfParser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = PdfParser::open("document.pdf")?;
//! parser.start_parse()?;
//!
//! println!("File version: {}", parser.file_version());
//! println!("Root object: {}", parser.root_obj_num());
//! println!("Objects indexed: {}", parser.last_obj_num());
//!
//! if let Some(catalog) = parser.parse_indirect_object(parser.root_obj_num())? {
//!     println!("Catalog: {catalog:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Cross-reference loading, rebuild recovery and object
//!   resolution
//!   - [`parser::PdfParser`] - The top-level parser
//!   - [`parser::PdfObject`] - Low-level PDF objects
//! - [`encryption`] - Standard security handler and RC4 decryption

pub mod encryption;
pub mod error;
pub mod parser;

pub use error::{PdfError, Result};
pub use parser::{
    ObjectKind, ParseError, ParseResult, PdfArray, PdfDictionary, PdfName, PdfObject, PdfParser,
    PdfStream, PdfString,
};
