//! stmt2ofx
//!
//! A library for converting bank statement exports into OFX documents that
//! accounting software can import.
//!
//! # Supported Formats
//!
//! - **MT940**: SWIFT bank statements, one or several concatenated messages
//! - **MT940 archives**: ZIP files holding several MT940 files
//! - **CSV**: `;`-separated bank exports
//!
//! Every source is normalized into a [`Statement`] and rendered as OFX 2.2.
//!
//! # Examples
//!
//! ## Converting an MT940 file
//!
//! ```no_run
//! use std::fs;
//! use stmt2ofx::conversion::{convert, ConversionOptions};
//! use stmt2ofx::{ofx_file_name, Format};
//!
//! let input = fs::read("statement.mt940")?;
//! let ofx = convert(&input, Format::Mt940, &ConversionOptions::default())?;
//! fs::write(ofx_file_name("statement.mt940"), ofx)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Working with the parsed statement
//!
//! ```no_run
//! use std::fs::File;
//! use stmt2ofx::mt940_format::Mt940Statement;
//! use stmt2ofx::ofx_format::OfxStatement;
//! use stmt2ofx::types::StatementDefaults;
//!
//! let mut input = File::open("statement.mt940")?;
//! let mt940 = Mt940Statement::from_read(&mut input, &StatementDefaults::default())?;
//!
//! // Convert using From trait
//! let ofx: OfxStatement = mt940.into();
//!
//! let mut output = File::create("statement.ofx")?;
//! ofx.write_to(&mut output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod mt940_format;
pub mod csv_format;
pub mod archive;
pub mod ofx_format;
pub mod conversion;

use std::path::Path;
use std::str::FromStr;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{Balance, DebitCredit, Statement, StatementDefaults, Transaction};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// MT940 SWIFT text
    Mt940,
    /// ZIP archive of MT940 files
    Mt940Archive,
    /// `;`-separated CSV export
    Csv,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mt940" | "mt-940" | "swift" | "sta" => Ok(Format::Mt940),
            "zip" | "archive" => Ok(Format::Mt940Archive),
            "csv" => Ok(Format::Csv),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl Format {
    /// Guess the format from a file name's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| Error::InvalidFormat(path.display().to_string()))?;

        match extension.as_str() {
            "mt940" | "sta" | "txt" => Ok(Format::Mt940),
            "zip" => Ok(Format::Mt940Archive),
            "csv" => Ok(Format::Csv),
            _ => Err(Error::InvalidFormat(path.display().to_string())),
        }
    }

    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Mt940 => "mt940",
            Format::Mt940Archive => "zip",
            Format::Csv => "csv",
        }
    }
}

/// Name of the downloadable OFX file for an uploaded file name.
///
/// A trailing `.mt940`, `.zip` or `.csv` is replaced by `.ofx`; any other
/// name gets `.ofx` appended.
pub fn ofx_file_name(source_name: &str) -> String {
    for suffix in [".mt940", ".zip", ".csv"] {
        let split = source_name.len().saturating_sub(suffix.len());
        if let (Some(stem), Some(tail)) = (source_name.get(..split), source_name.get(split..)) {
            if tail.eq_ignore_ascii_case(suffix) {
                return format!("{}.ofx", stem);
            }
        }
    }
    format!("{}.ofx", source_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("mt940".parse::<Format>().unwrap(), Format::Mt940);
        assert_eq!("MT940".parse::<Format>().unwrap(), Format::Mt940);
        assert_eq!("zip".parse::<Format>().unwrap(), Format::Mt940Archive);
        assert_eq!("csv".parse::<Format>().unwrap(), Format::Csv);
        assert!("camt053".parse::<Format>().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path("in/statement.MT940").unwrap(), Format::Mt940);
        assert_eq!(Format::from_path("export.zip").unwrap(), Format::Mt940Archive);
        assert_eq!(Format::from_path("export.csv").unwrap(), Format::Csv);
        assert!(Format::from_path("export").is_err());
        assert!(Format::from_path("export.pdf").is_err());
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(Format::Mt940.extension(), "mt940");
        assert_eq!(Format::Mt940Archive.extension(), "zip");
        assert_eq!(Format::Csv.extension(), "csv");
    }

    #[test]
    fn test_ofx_file_name() {
        assert_eq!(ofx_file_name("statement.mt940"), "statement.ofx");
        assert_eq!(ofx_file_name("june.zip"), "june.ofx");
        assert_eq!(ofx_file_name("export.CSV"), "export.ofx");
        assert_eq!(ofx_file_name("statement"), "statement.ofx");
    }
}
