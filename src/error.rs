//! Error types for the stmt2ofx library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during parsing and serialization operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading the CSV header or stream.
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error producing the OFX XML body.
    #[error("XML serialization error: {0}")]
    XmlError(String),

    /// A structural MT940 line does not match its grammar.
    #[error("MT940 parsing error at line {line}: {message}")]
    Mt940ParseError { line: usize, message: String },

    /// The MT940 input carries no `:62F:`/`:62M:` closing balance.
    #[error("MT940 input has no closing balance line (:62F: or :62M:)")]
    MissingClosingBalance,

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid format specified.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The archive could not be opened or read.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Input bytes are not valid UTF-8.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// True when the input is not valid MT940 and no document can be produced.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Mt940ParseError { .. } | Error::MissingClosingBalance)
    }
}
