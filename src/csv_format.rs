//! CSV bank export parser.
//!
//! The export is `;`-separated with a header row. Columns are located by
//! header name, so their order does not matter and extra columns are ignored.
//! A malformed data row is skipped and counted; it never fails the file.

use crate::error::{Error, Result};
use crate::types::{truncate_text, DebitCredit, Statement, StatementDefaults, Transaction};
use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

/// Represents a parsed CSV statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvStatement {
    /// The underlying statement data.
    pub statement: Statement,

    /// Number of data rows dropped because a mandatory field was missing or
    /// unparseable.
    pub skipped_rows: usize,
}

/// CSV transaction record structure.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "Date transaction")]
    date: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Montant en EUR")]
    amount: String,
    #[serde(rename = "Communication 1", default)]
    communication_1: String,
    #[serde(rename = "Communication 2", default)]
    communication_2: String,
    #[serde(rename = "Communication 3", default)]
    communication_3: String,
    #[serde(rename = "Communication 4", default)]
    communication_4: String,
    #[serde(rename = "Nom de la contrepartie", default)]
    counterparty: String,
}

impl CsvStatement {
    /// Parse a CSV statement from any source implementing `Read`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use stmt2ofx::csv_format::CsvStatement;
    /// use stmt2ofx::types::StatementDefaults;
    ///
    /// let mut file = File::open("statement.csv")?;
    /// let csv = CsvStatement::from_read(&mut file, &StatementDefaults::default())?;
    /// println!("skipped {} rows", csv.skipped_rows);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_read<R: Read>(reader: &mut R, defaults: &StatementDefaults) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content, defaults)
    }

    /// Parse CSV text. Account and currency come from `defaults`.
    pub fn parse(text: &str, defaults: &StatementDefaults) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(text.as_bytes());

        let headers = csv_reader.headers()?.clone();
        let mut statement = Statement::new(defaults);
        let mut skipped_rows = 0;

        for result in csv_reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    skipped_rows += 1;
                    tracing::warn!(error = %e, "skipping unreadable CSV row");
                    continue;
                }
            };

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            match Self::parse_record(&record, &headers) {
                Ok(transaction) => statement.add_transaction(transaction),
                Err(e) => {
                    skipped_rows += 1;
                    let row = record.position().map_or(0, |p| p.line());
                    tracing::warn!(row, error = %e, "skipping CSV row");
                }
            }
        }

        tracing::debug!(
            transactions = statement.transactions.len(),
            skipped_rows,
            "parsed CSV input"
        );

        Ok(CsvStatement {
            statement,
            skipped_rows,
        })
    }

    fn parse_record(record: &StringRecord, headers: &StringRecord) -> Result<Transaction> {
        let row: CsvRecord = record.deserialize(Some(headers))?;

        let posted_at = Self::parse_date(&row.date)?;
        let signed = Self::parse_amount(&row.amount)?;
        let kind = if signed.is_sign_negative() && !signed.is_zero() {
            DebitCredit::Debit
        } else {
            DebitCredit::Credit
        };

        let communications = [
            row.communication_1.as_str(),
            row.communication_2.as_str(),
            row.communication_3.as_str(),
            row.communication_4.as_str(),
        ];
        let memo = if communications.iter().any(|c| !c.trim().is_empty()) {
            truncate_text(communications.join(" ").trim_end())
        } else {
            truncate_text(row.counterparty.trim_end())
        };

        Ok(Transaction {
            kind,
            posted_at,
            amount: signed.abs(),
            id: Self::timestamp_id(posted_at),
            memo,
            name: row.description,
        })
    }

    /// Seconds since the epoch of the posting date at midnight UTC.
    fn timestamp_id(date: NaiveDate) -> String {
        date.and_time(NaiveTime::MIN).and_utc().timestamp().to_string()
    }

    fn parse_date(date_str: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(date_str.trim(), "%d/%m/%Y")
            .map_err(|_| Error::InvalidDate(date_str.to_string()))
    }

    fn parse_amount(amount_str: &str) -> Result<Decimal> {
        // Remove spaces and replace comma with dot
        let cleaned = amount_str
            .trim()
            .replace(' ', "")
            .replace(',', ".");

        if cleaned.is_empty() {
            return Err(Error::MissingField("Montant en EUR".to_string()));
        }

        Decimal::from_str(&cleaned)
            .map_err(|_| Error::InvalidAmount(amount_str.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Date transaction;Description;Date valeur;Montant en EUR;Extrait;Solde journalier;Opération;Communication 1;Communication 2;Communication 3;Communication 4;Compte bénéficiaire;Nom de la contrepartie;Adresse de la contrepartie;Localité de la contrepartie";

    fn parse(rows: &[&str]) -> CsvStatement {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        CsvStatement::parse(&text, &StatementDefaults::default()).unwrap()
    }

    #[test]
    fn test_parse_date() {
        let date = CsvStatement::parse_date("01/02/2023").unwrap();
        assert_eq!(date.year(), 2023);
        assert_eq!(date.month(), 2);
        assert_eq!(date.day(), 1);
        assert!(CsvStatement::parse_date("2023-02-01").is_err());
    }

    #[test]
    fn test_parse_amount() {
        let amount = CsvStatement::parse_amount("-1 540,00").unwrap();
        assert_eq!(amount.to_string(), "-1540.00");
        assert!(CsvStatement::parse_amount("").is_err());
    }

    #[test]
    fn test_debit_row() {
        let csv = parse(&[
            "01/02/2023;TPV 2300 CACTUS HOWALD 30.01;01/02/2023;-211,87;2;110073,27;DEB;;;;;;TPV 2300 CACTUS HOWALD 30.01;;",
        ]);
        assert_eq!(csv.skipped_rows, 0);

        let tx = &csv.statement.transactions[0];
        assert_eq!(tx.kind, DebitCredit::Debit);
        assert_eq!(tx.amount.to_string(), "211.87");
        assert_eq!(tx.name, "TPV 2300 CACTUS HOWALD 30.01");
        assert_eq!(tx.memo, "TPV 2300 CACTUS HOWALD 30.01");
        assert_eq!(tx.id, "1675209600");
    }

    #[test]
    fn test_credit_row_uses_communications() {
        let csv = parse(&[
            "03/02/2023;VIREMENT CNS;03/02/2023;1 250,00;2;111323,27;VIR;FACTURE 2023-01;;;;LU00;CNS;;",
        ]);
        let tx = &csv.statement.transactions[0];
        assert_eq!(tx.kind, DebitCredit::Credit);
        assert_eq!(tx.amount.to_string(), "1250.00");
        assert_eq!(tx.memo, "FACTURE 2023-01");
    }

    #[test]
    fn test_communications_truncated() {
        let csv = parse(&[
            "06/02/2023;DOMICILIATION ARAL;06/02/2023;-669,47;2;105355,46;SDD;/MISTRAL-SO//ZZ1DG8B8IXCCY6NBW///IN;V/0001215610/SEPA 31.1.2023/0050684;594;;LU150030546657960000;ARAL LUXEMBOURG S.A.;;",
        ]);
        assert_eq!(csv.statement.transactions[0].memo, "/MISTRAL-SO//ZZ1DG8B8IXCCY6NBW//");
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = parse(&[
            "01/02/2023;GOOD;01/02/2023;-10,00;2;0;DEB;;;;;;X;;",
            "not a date;BAD DATE;01/02/2023;-10,00;2;0;DEB;;;;;;X;;",
            "01/02/2023;BAD AMOUNT;01/02/2023;abc;2;0;DEB;;;;;;X;;",
            ";;;;;;;;;;;;;;",
            "02/02/2023;ALSO GOOD;02/02/2023;5,5;2;0;VIR;;;;;;Y;;",
        ]);
        assert_eq!(csv.skipped_rows, 2);
        let names: Vec<_> = csv.statement.transactions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["GOOD", "ALSO GOOD"]);
    }

    #[test]
    fn test_header_whitespace_and_defaults() {
        let text = " Date transaction ; Description ;Montant en EUR \n01/02/2023;SHORT ROW;3,00\n";
        let csv = CsvStatement::parse(text, &StatementDefaults::default()).unwrap();
        assert_eq!(csv.statement.account_id, "ACCOUNT_ID");
        assert_eq!(csv.statement.currency, "EUR");
        assert!(csv.statement.closing_balance.is_none());

        let tx = &csv.statement.transactions[0];
        assert_eq!(tx.name, "SHORT ROW");
        assert_eq!(tx.memo, "");
    }
}
