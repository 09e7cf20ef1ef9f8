//! OFX 2.2 serializer.
//!
//! Only bank statement download is covered: one signon response and one
//! statement transaction response holding the account, the transaction list
//! and the ledger balance. The document is a fixed OFX header followed by an
//! XML body rendered from the serde tree below.

use crate::error::{Error, Result};
use crate::types::{truncate_text, Statement, Transaction};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Header preceding the XML body, identifying OFX version 220.
pub const OFX_HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\r\n",
    "<?OFX OFXHEADER=\"200\" VERSION=\"220\" SECURITY=\"NONE\" OLDFILEUID=\"NONE\" NEWFILEUID=\"NONE\"?>\r\n",
);

const LANGUAGE: &str = "FRA";
const ACCOUNT_TYPE: &str = "CHECKING";
const TRANSACTION_UID: &str = "0";
const STATUS_MESSAGE: &str = "Transaction completed successfully";

/// Server time reported in the signon response unless overridden.
///
/// A fixed instant keeps the conversion of a given input byte-identical.
pub fn default_server_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 2, 17, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A statement ready to be rendered as OFX.
#[derive(Debug, Clone, PartialEq)]
pub struct OfxStatement {
    /// The underlying statement data.
    pub statement: Statement,

    /// Value of `DTSERVER`.
    pub server_time: DateTime<Utc>,
}

impl OfxStatement {
    /// Wrap a statement, reporting the fixed [`default_server_time`].
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            server_time: default_server_time(),
        }
    }

    /// Replace the reported `DTSERVER` value.
    pub fn with_server_time(mut self, server_time: DateTime<Utc>) -> Self {
        self.server_time = server_time;
        self
    }

    /// Render the full document: header plus XML body.
    pub fn to_ofx_string(&self) -> Result<String> {
        let body = quick_xml::se::to_string(&self.to_document())
            .map_err(|e| Error::XmlError(e.to_string()))?;

        let mut document = String::with_capacity(OFX_HEADER.len() + body.len());
        document.push_str(OFX_HEADER);
        document.push_str(&body);
        Ok(document)
    }

    /// Write the OFX document to any destination implementing `Write`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use stmt2ofx::ofx_format::OfxStatement;
    /// use stmt2ofx::types::{Statement, StatementDefaults};
    ///
    /// let statement = Statement::new(&StatementDefaults::default());
    /// let mut file = File::create("output.ofx")?;
    /// OfxStatement::new(statement).write_to(&mut file)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let document = self.to_ofx_string()?;
        writer.write_all(document.as_bytes())?;
        Ok(())
    }

    fn to_document(&self) -> OfxDocument {
        let stmt = &self.statement;

        let ledger_date = stmt
            .closing_balance
            .as_ref()
            .map(|balance| balance.date)
            .or_else(|| stmt.transactions.last().map(|tx| tx.posted_at))
            .unwrap_or_else(|| self.server_time.date_naive());

        let ledger_amount = stmt
            .closing_balance
            .as_ref()
            .map_or(Decimal::ZERO, |balance| balance.signed_amount());

        // Bounds follow insertion order, not chronological order.
        let dtstart = stmt.transactions.first().map_or(ledger_date, |tx| tx.posted_at);
        let dtend = stmt.transactions.last().map_or(ledger_date, |tx| tx.posted_at);

        OfxDocument {
            signonmsgsrsv1: SignOnMessages {
                sonrs: SignOnResponse {
                    status: Status::ok(None),
                    dtserver: format_datetime(&self.server_time),
                    language: LANGUAGE.to_string(),
                },
            },
            bankmsgsrsv1: BankMessages {
                stmttrnrs: StatementTransactionResponse {
                    trnuid: TRANSACTION_UID.to_string(),
                    status: Status::ok(Some(STATUS_MESSAGE)),
                    stmtrs: StatementResponse {
                        curdef: stmt.currency.clone(),
                        bankacctfrom: BankAccount {
                            bankid: stmt.bank_id.clone(),
                            acctid: stmt.account_id.clone(),
                            accttype: ACCOUNT_TYPE.to_string(),
                        },
                        banktranlist: TransactionList {
                            dtstart: format_date(&dtstart),
                            dtend: format_date(&dtend),
                            stmttrn: stmt.transactions.iter().map(StatementTransaction::from).collect(),
                        },
                        ledgerbal: LedgerBalance {
                            balamt: ledger_amount.to_string(),
                            dtasof: format_date(&ledger_date),
                        },
                        availbal: stmt.available_balance.as_ref().map(|balance| LedgerBalance {
                            balamt: balance.signed_amount().to_string(),
                            dtasof: format_date(&balance.date),
                        }),
                    },
                },
            },
        }
    }
}

impl From<&Transaction> for StatementTransaction {
    fn from(tx: &Transaction) -> Self {
        StatementTransaction {
            trntype: tx.kind.ofx_type().to_string(),
            dtposted: format_date(&tx.posted_at),
            trnamt: tx.signed_amount().to_string(),
            fitid: tx.id.clone(),
            name: non_empty(&tx.name),
            memo: non_empty(&tx.memo),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = truncate_text(text.trim_end());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// OFX datetime with an explicit UTC offset, e.g. `20230606000000.000[+0:UTC]`.
fn format_datetime(datetime: &DateTime<Utc>) -> String {
    format!("{}.000[+0:UTC]", datetime.format("%Y%m%d%H%M%S"))
}

fn format_date(date: &NaiveDate) -> String {
    format_datetime(&date.and_time(NaiveTime::MIN).and_utc())
}

// OFX structure definitions
#[derive(Debug, Serialize)]
#[serde(rename = "OFX", rename_all = "UPPERCASE")]
struct OfxDocument {
    signonmsgsrsv1: SignOnMessages,
    bankmsgsrsv1: BankMessages,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct SignOnMessages {
    sonrs: SignOnResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct SignOnResponse {
    status: Status,
    dtserver: String,
    language: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct Status {
    code: u32,
    severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Status {
    fn ok(message: Option<&str>) -> Self {
        Status {
            code: 0,
            severity: "INFO".to_string(),
            message: message.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct BankMessages {
    stmttrnrs: StatementTransactionResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatementTransactionResponse {
    trnuid: String,
    status: Status,
    stmtrs: StatementResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatementResponse {
    curdef: String,
    bankacctfrom: BankAccount,
    banktranlist: TransactionList,
    ledgerbal: LedgerBalance,
    #[serde(skip_serializing_if = "Option::is_none")]
    availbal: Option<LedgerBalance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct BankAccount {
    bankid: String,
    acctid: String,
    accttype: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct TransactionList {
    dtstart: String,
    dtend: String,
    stmttrn: Vec<StatementTransaction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatementTransaction {
    trntype: String,
    dtposted: String,
    trnamt: String,
    fitid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct LedgerBalance {
    balamt: String,
    dtasof: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Balance, DebitCredit, StatementDefaults};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn transaction(kind: DebitCredit, day: u32, amount: &str, id: &str) -> Transaction {
        Transaction {
            kind,
            posted_at: date(2023, 6, day),
            amount: Decimal::from_str(amount).unwrap(),
            id: id.into(),
            memo: String::new(),
            name: String::new(),
        }
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&date(2023, 6, 6)), "20230606000000.000[+0:UTC]");
        assert_eq!(format_datetime(&default_server_time()), "20150102170000.000[+0:UTC]");
    }

    #[test]
    fn test_full_document() {
        let mut statement = Statement::new(&StatementDefaults::default());
        statement.bank_id = "CCRALULL".into();
        statement.account_id = "LU860099780001034313".into();
        let mut tx = transaction(DebitCredit::Debit, 6, "763.46", "FT2315786F6M");
        tx.memo = "VIREMENT COLLECTIF".into();
        statement.add_transaction(tx);
        statement.closing_balance = Some(Balance {
            amount: Decimal::from_str("7044.07").unwrap(),
            kind: DebitCredit::Credit,
            date: date(2023, 6, 6),
        });

        let ofx = OfxStatement::new(statement).to_ofx_string().unwrap();

        let expected = format!(
            "{}{}",
            OFX_HEADER,
            concat!(
                "<OFX><SIGNONMSGSRSV1><SONRS>",
                "<STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>",
                "<DTSERVER>20150102170000.000[+0:UTC]</DTSERVER><LANGUAGE>FRA</LANGUAGE>",
                "</SONRS></SIGNONMSGSRSV1>",
                "<BANKMSGSRSV1><STMTTRNRS><TRNUID>0</TRNUID>",
                "<STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY>",
                "<MESSAGE>Transaction completed successfully</MESSAGE></STATUS>",
                "<STMTRS><CURDEF>EUR</CURDEF>",
                "<BANKACCTFROM><BANKID>CCRALULL</BANKID><ACCTID>LU860099780001034313</ACCTID>",
                "<ACCTTYPE>CHECKING</ACCTTYPE></BANKACCTFROM>",
                "<BANKTRANLIST><DTSTART>20230606000000.000[+0:UTC]</DTSTART>",
                "<DTEND>20230606000000.000[+0:UTC]</DTEND>",
                "<STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20230606000000.000[+0:UTC]</DTPOSTED>",
                "<TRNAMT>-763.46</TRNAMT><FITID>FT2315786F6M</FITID>",
                "<MEMO>VIREMENT COLLECTIF</MEMO></STMTTRN></BANKTRANLIST>",
                "<LEDGERBAL><BALAMT>7044.07</BALAMT><DTASOF>20230606000000.000[+0:UTC]</DTASOF></LEDGERBAL>",
                "</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"
            )
        );
        assert_eq!(ofx, expected);
    }

    #[test]
    fn test_bounds_follow_insertion_order() {
        let mut statement = Statement::new(&StatementDefaults::default());
        statement.add_transaction(transaction(DebitCredit::Credit, 9, "1", "A"));
        statement.add_transaction(transaction(DebitCredit::Credit, 3, "2", "B"));

        let ofx = OfxStatement::new(statement).to_ofx_string().unwrap();
        assert!(ofx.contains("<DTSTART>20230609000000.000[+0:UTC]</DTSTART>"));
        assert!(ofx.contains("<DTEND>20230603000000.000[+0:UTC]</DTEND>"));
        // No closing balance: zero as of the last transaction.
        assert!(ofx.contains("<LEDGERBAL><BALAMT>0</BALAMT><DTASOF>20230603000000.000[+0:UTC]</DTASOF>"));
    }

    #[test]
    fn test_empty_statement_is_valid() {
        let statement = Statement::new(&StatementDefaults::default());
        let server_time = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let ofx = OfxStatement::new(statement)
            .with_server_time(server_time)
            .to_ofx_string()
            .unwrap();

        assert!(ofx.starts_with(OFX_HEADER));
        assert!(!ofx.contains("<STMTTRN>"));
        assert!(ofx.contains("<DTSERVER>20240301083000.000[+0:UTC]</DTSERVER>"));
        assert!(ofx.contains(concat!(
            "<BANKTRANLIST><DTSTART>20240301000000.000[+0:UTC]</DTSTART>",
            "<DTEND>20240301000000.000[+0:UTC]</DTEND></BANKTRANLIST>"
        )));
        assert!(ofx.contains("<BALAMT>0</BALAMT>"));
    }

    #[test]
    fn test_text_fields_truncated_and_escaped() {
        let mut statement = Statement::new(&StatementDefaults::default());
        let mut tx = transaction(DebitCredit::Credit, 1, "10.00", "X");
        tx.name = "DOMICILIATION ARAL LUXEMBOURG S.A. /MISTRAL- SO".into();
        tx.memo = "A & B".into();
        statement.add_transaction(tx);

        let ofx = OfxStatement::new(statement).to_ofx_string().unwrap();
        assert!(ofx.contains("<NAME>DOMICILIATION ARAL LUXEMBOURG S.</NAME>"));
        assert!(ofx.contains("<MEMO>A &amp; B</MEMO>"));
        assert!(ofx.contains("<TRNAMT>10.00</TRNAMT>"));
    }

    #[test]
    fn test_available_balance() {
        let mut statement = Statement::new(&StatementDefaults::default());
        statement.available_balance = Some(Balance {
            amount: Decimal::from_str("12.50").unwrap(),
            kind: DebitCredit::Debit,
            date: date(2023, 6, 7),
        });

        let ofx = OfxStatement::new(statement).to_ofx_string().unwrap();
        assert!(ofx.contains(
            "<AVAILBAL><BALAMT>-12.50</BALAMT><DTASOF>20230607000000.000[+0:UTC]</DTASOF></AVAILBAL>"
        ));
    }
}
