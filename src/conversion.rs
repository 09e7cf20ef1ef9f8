//! Conversion from parsed statements to OFX.
//!
//! Parsed statements turn into [`OfxStatement`] through Rust's `From` trait;
//! [`convert`] runs the whole pipeline from raw upload bytes to OFX text.

use crate::archive::concat_archive;
use crate::csv_format::CsvStatement;
use crate::error::{Error, Result};
use crate::mt940_format::Mt940Statement;
use crate::ofx_format::{default_server_time, OfxStatement};
use crate::types::StatementDefaults;
use crate::Format;
use chrono::{DateTime, Utc};

/// Convert from MT940 to OFX.
impl From<Mt940Statement> for OfxStatement {
    fn from(mt940: Mt940Statement) -> Self {
        OfxStatement::new(mt940.statement)
    }
}

/// Convert from CSV to OFX.
impl From<CsvStatement> for OfxStatement {
    fn from(csv: CsvStatement) -> Self {
        OfxStatement::new(csv.statement)
    }
}

/// Settings for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Account values used when the source does not carry them.
    pub defaults: StatementDefaults,

    /// Value of the OFX `DTSERVER` field.
    pub server_time: DateTime<Utc>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            defaults: StatementDefaults::default(),
            server_time: default_server_time(),
        }
    }
}

/// Convert one uploaded payload into an OFX document.
///
/// # Examples
///
/// ```
/// use stmt2ofx::conversion::{convert, ConversionOptions};
/// use stmt2ofx::Format;
///
/// let mt940 = ":25:BANK/ACC\n:61:230606C1,00NTRF//A\n:62F:C230606EUR1,00\n";
/// let ofx = convert(mt940.as_bytes(), Format::Mt940, &ConversionOptions::default())?;
/// assert!(ofx.contains("<TRNTYPE>CREDIT</TRNTYPE>"));
/// # Ok::<(), stmt2ofx::Error>(())
/// ```
pub fn convert(input: &[u8], format: Format, options: &ConversionOptions) -> Result<String> {
    let ofx: OfxStatement = match format {
        Format::Mt940 => Mt940Statement::parse(decode(input)?, &options.defaults)?.into(),
        Format::Mt940Archive => {
            let text = concat_archive(input)?;
            Mt940Statement::parse(&text, &options.defaults)?.into()
        }
        Format::Csv => {
            let csv = CsvStatement::parse(decode(input)?, &options.defaults)?;
            if csv.skipped_rows > 0 {
                tracing::info!(skipped_rows = csv.skipped_rows, "some CSV rows were skipped");
            }
            csv.into()
        }
    };

    ofx.with_server_time(options.server_time).to_ofx_string()
}

fn decode(input: &[u8]) -> Result<&str> {
    std::str::from_utf8(input).map_err(|e| Error::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DebitCredit, Statement, Transaction};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_mt940_to_ofx() {
        let mut statement = Statement::new(&StatementDefaults::default());
        statement.transactions.push(Transaction {
            kind: DebitCredit::Credit,
            posted_at: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            amount: Decimal::new(10050, 2),
            id: "REF001".into(),
            memo: "Test transaction".into(),
            name: "Test Company".into(),
        });

        let ofx: OfxStatement = Mt940Statement { statement }.into();

        assert_eq!(ofx.statement.transactions.len(), 1);
        assert_eq!(ofx.server_time, default_server_time());
    }

    #[test]
    fn test_csv_to_ofx() {
        let statement = Statement::new(&StatementDefaults::default());
        let ofx: OfxStatement = CsvStatement {
            statement,
            skipped_rows: 3,
        }
        .into();

        assert!(ofx.statement.transactions.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let result = convert(&[0xc3, 0x28], Format::Csv, &ConversionOptions::default());
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn test_custom_defaults_reach_output() {
        let options = ConversionOptions {
            defaults: StatementDefaults {
                bank_id: "BCEELULL".into(),
                account_id: "LU12".into(),
                currency: "EUR".into(),
            },
            ..ConversionOptions::default()
        };
        let csv = "Date transaction;Description;Montant en EUR\n01/02/2023;X;1,00\n";
        let ofx = convert(csv.as_bytes(), Format::Csv, &options).unwrap();
        assert!(ofx.contains("<BANKID>BCEELULL</BANKID><ACCTID>LU12</ACCTID>"));
    }
}
