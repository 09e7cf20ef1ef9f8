//! MT940 SWIFT format parser.
//!
//! MT940 is a SWIFT format for electronic account statements. Several
//! messages may be concatenated back-to-back (as produced by joining the
//! members of a ZIP archive); they are merged into a single [`Statement`].
//!
//! Only the tags needed to build transactions and balances are interpreted:
//! `:25:`, `:61:`, `:86:`, `:62F:`/`:62M:` and `:64:`. Every other tag is
//! recognized and skipped.

use crate::error::{Error, Result};
use crate::types::{truncate_text, Balance, DebitCredit, Statement, StatementDefaults, Transaction};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

/// Represents a parsed MT940 statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt940Statement {
    /// The underlying statement data.
    pub statement: Statement,
}

impl Mt940Statement {
    /// Parse MT940 text from any source implementing `Read`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use stmt2ofx::mt940_format::Mt940Statement;
    /// use stmt2ofx::types::StatementDefaults;
    ///
    /// let mut file = File::open("statement.mt940")?;
    /// let mt940 = Mt940Statement::from_read(&mut file, &StatementDefaults::default())?;
    /// println!("{} transactions", mt940.statement.transactions.len());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_read<R: Read>(reader: &mut R, defaults: &StatementDefaults) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content, defaults)
    }

    /// Parse one or more concatenated MT940 messages in a single pass.
    ///
    /// Fails with [`Error::Mt940ParseError`] on a malformed `:61:`, `:62F:`,
    /// `:62M:` or `:64:` line and with [`Error::MissingClosingBalance`] when
    /// no closing balance line is present at all.
    pub fn parse(text: &str, defaults: &StatementDefaults) -> Result<Self> {
        let mut parser = Parser::new(defaults)?;
        for (index, raw) in text.lines().enumerate() {
            parser.feed(index + 1, raw)?;
        }
        let statement = parser.finish()?;
        Ok(Mt940Statement { statement })
    }
}

/// Where the parser stands relative to the current `:61:` record.
#[derive(Debug)]
enum ParserState {
    /// Outside any transaction.
    Idle,
    /// A `:61:` line was read; its `:86:` block has not started.
    StatementLine(PendingTransaction),
    /// Inside the `:86:` block of the pending transaction.
    Details(PendingTransaction),
}

#[derive(Debug)]
struct PendingTransaction {
    kind: DebitCredit,
    posted_at: NaiveDate,
    amount: Decimal,
    reference: Option<String>,
    subfields: BTreeMap<u8, String>,
    last_code: Option<u8>,
}

impl PendingTransaction {
    /// Absorb `:86:` text, either the tag line itself or a continuation.
    fn push_details(&mut self, text: &str) {
        let (leading, segments) = split_subfields(text);
        if !leading.is_empty() {
            // Wrapped text belongs to the subfield opened last.
            if let Some(code) = self.last_code {
                append_text(self.subfields.entry(code).or_default(), leading);
            }
        }
        for (code, value) in segments {
            append_text(self.subfields.entry(code).or_default(), value);
            self.last_code = Some(code);
        }
    }

    fn subfield(&self, code: u8) -> Option<&str> {
        self.subfields
            .get(&code)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn into_transaction(self, position: usize) -> Transaction {
        let name = self
            .subfield(32)
            .or_else(|| self.subfield(60))
            .unwrap_or_default()
            .to_string();

        let memo = match self.subfield(21) {
            Some(reference) => reference.to_string(),
            None => {
                let joined = [20, 22, 23]
                    .iter()
                    .filter_map(|code| self.subfield(*code))
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined.is_empty() {
                    name.clone()
                } else {
                    joined
                }
            }
        };

        let id = self
            .reference
            .unwrap_or_else(|| format!("{}-{}", self.posted_at.format("%Y%m%d"), position));

        Transaction {
            kind: self.kind,
            posted_at: self.posted_at,
            amount: self.amount,
            id,
            memo: truncate_text(&memo),
            name,
        }
    }
}

struct Grammar {
    tag: Regex,
    statement_line: Regex,
    balance: Regex,
}

impl Grammar {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::InvalidFormat(e.to_string()))
        };

        Ok(Self {
            tag: compile(r"^:(?P<tag>[0-9A-Z]{2,3}):(?P<value>.*)$")?,
            // YYMMDD [MMDD] mark [funds code] amount type-code ... [//reference]
            statement_line: compile(concat!(
                r"^(?P<value_date>\d{6})(?:\d{4})?",
                r"(?P<mark>RC|RD|C|D)[A-Z]?",
                r"(?P<amount>\d+,\d*)",
                r"(?P<rest>[A-Z].*)$"
            ))?,
            // mark YYMMDD currency amount
            balance: compile(
                r"^(?P<mark>[CD])(?P<date>\d{6})(?P<currency>[A-Z]{3})(?P<amount>\d+,\d*)$",
            )?,
        })
    }
}

struct Parser {
    grammar: Grammar,
    statement: Statement,
    state: ParserState,
    messages: usize,
}

impl Parser {
    fn new(defaults: &StatementDefaults) -> Result<Self> {
        Ok(Self {
            grammar: Grammar::new()?,
            statement: Statement::new(defaults),
            state: ParserState::Idle,
            messages: 0,
        })
    }

    fn feed(&mut self, line_no: usize, raw: &str) -> Result<()> {
        let line = raw.trim();
        if line.is_empty() || is_envelope(line) {
            return Ok(());
        }

        if !line.starts_with(':') {
            if let ParserState::Details(pending) = &mut self.state {
                pending.push_details(line);
            }
            return Ok(());
        }

        let Some(caps) = self.grammar.tag.captures(line) else {
            tracing::trace!(line = line_no, "skipping unrecognized tag line");
            self.leave_details();
            return Ok(());
        };
        let value = caps.name("value").map_or("", |m| m.as_str());

        match &caps["tag"] {
            "61" => {
                let pending = self.parse_statement_line(line_no, line, value)?;
                self.flush();
                self.state = ParserState::StatementLine(pending);
            }
            "86" => {
                self.state = match std::mem::replace(&mut self.state, ParserState::Idle) {
                    ParserState::StatementLine(mut pending) | ParserState::Details(mut pending) => {
                        pending.push_details(value);
                        ParserState::Details(pending)
                    }
                    ParserState::Idle => ParserState::Idle,
                };
            }
            "62F" | "62M" => {
                let (balance, currency) = self.parse_balance(line_no, line, value)?;
                self.flush();
                self.statement.currency = currency;
                self.statement.closing_balance = Some(balance);
            }
            "64" => {
                let (balance, _) = self.parse_balance(line_no, line, value)?;
                self.leave_details();
                self.statement.available_balance = Some(balance);
            }
            "25" => {
                self.leave_details();
                self.set_account(value.trim());
            }
            "20" => {
                self.leave_details();
                self.messages += 1;
            }
            other => {
                tracing::trace!(line = line_no, tag = other, "ignoring tag");
                self.leave_details();
            }
        }

        Ok(())
    }

    fn finish(mut self) -> Result<Statement> {
        self.flush();

        if self.statement.closing_balance.is_none() {
            return Err(Error::MissingClosingBalance);
        }

        tracing::debug!(
            messages = self.messages,
            transactions = self.statement.transactions.len(),
            account = %self.statement.account_id,
            "parsed MT940 input"
        );

        Ok(self.statement)
    }

    /// Move the pending transaction, if any, into the statement.
    fn flush(&mut self) {
        match std::mem::replace(&mut self.state, ParserState::Idle) {
            ParserState::StatementLine(pending) | ParserState::Details(pending) => {
                let position = self.statement.transactions.len() + 1;
                self.statement.add_transaction(pending.into_transaction(position));
            }
            ParserState::Idle => {}
        }
    }

    fn leave_details(&mut self) {
        self.state = match std::mem::replace(&mut self.state, ParserState::Idle) {
            ParserState::Details(pending) => ParserState::StatementLine(pending),
            other => other,
        };
    }

    fn set_account(&mut self, value: &str) {
        match value.split_once('/') {
            Some((bank, account)) => {
                if !bank.trim().is_empty() {
                    self.statement.bank_id = bank.trim().to_string();
                }
                self.statement.account_id = account.trim().to_string();
            }
            None if !value.is_empty() => self.statement.account_id = value.to_string(),
            None => {}
        }
    }

    fn parse_statement_line(
        &self,
        line_no: usize,
        line: &str,
        value: &str,
    ) -> Result<PendingTransaction> {
        let invalid = |reason: &str| Error::Mt940ParseError {
            line: line_no,
            message: format!("{} in statement line '{}'", reason, line),
        };

        let caps = self
            .grammar
            .statement_line
            .captures(value.trim())
            .ok_or_else(|| invalid("unexpected layout"))?;

        let posted_at =
            parse_mt940_date(&caps["value_date"]).map_err(|_| invalid("invalid value date"))?;

        let kind = match &caps["mark"] {
            "C" | "RD" => DebitCredit::Credit,
            _ => DebitCredit::Debit,
        };

        let amount = parse_amount(&caps["amount"]).map_err(|_| invalid("invalid amount"))?;

        let reference = caps
            .name("rest")
            .and_then(|rest| {
                let rest = rest.as_str();
                rest.rfind("//").map(|pos| rest[pos + 2..].trim().to_string())
            })
            .filter(|reference| !reference.is_empty());

        Ok(PendingTransaction {
            kind,
            posted_at,
            amount,
            reference,
            subfields: BTreeMap::new(),
            last_code: None,
        })
    }

    fn parse_balance(&self, line_no: usize, line: &str, value: &str) -> Result<(Balance, String)> {
        let invalid = |reason: &str| Error::Mt940ParseError {
            line: line_no,
            message: format!("{} in balance line '{}'", reason, line),
        };

        let caps = self
            .grammar
            .balance
            .captures(value.trim())
            .ok_or_else(|| invalid("unexpected layout"))?;

        let kind = caps["mark"]
            .parse::<DebitCredit>()
            .map_err(|_| invalid("invalid D/C indicator"))?;
        let date = parse_mt940_date(&caps["date"]).map_err(|_| invalid("invalid date"))?;
        let amount = parse_amount(&caps["amount"]).map_err(|_| invalid("invalid amount"))?;

        Ok((Balance { amount, kind, date }, caps["currency"].to_string()))
    }
}

/// SWIFT block framing such as `{1:F01...}{4:` and `-}`.
fn is_envelope(line: &str) -> bool {
    line.starts_with('{') || line == "-" || line.starts_with("-}")
}

/// Split `:86:` text into the part before the first `?NN` code and the
/// `(code, text)` segments that follow.
fn split_subfields(text: &str) -> (&str, Vec<(u8, &str)>) {
    let bytes = text.as_bytes();
    let starts: Vec<usize> = (0..bytes.len())
        .filter(|&i| {
            bytes[i] == b'?'
                && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_digit)
        })
        .collect();

    let leading = match starts.first() {
        Some(&first) => text[..first].trim(),
        None => text.trim(),
    };

    let segments = starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            let code = (bytes[start + 1] - b'0') * 10 + (bytes[start + 2] - b'0');
            (code, text[start + 3..end].trim())
        })
        .collect();

    (leading, segments)
}

fn append_text(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Parse an MT940 amount (`"763,46"`) into a decimal.
fn parse_amount(amount_str: &str) -> Result<Decimal> {
    let normalized = amount_str.replace(',', ".");
    let normalized = normalized.trim_end_matches('.');
    Decimal::from_str(normalized).map_err(|_| Error::InvalidAmount(amount_str.to_string()))
}

/// Parse MT940 date format (YYMMDD) to NaiveDate.
fn parse_mt940_date(date_str: &str) -> Result<NaiveDate> {
    if date_str.len() != 6 {
        return Err(Error::InvalidDate(format!("Invalid MT940 date length: {}", date_str)));
    }

    let field = |range: std::ops::Range<usize>| {
        date_str
            .get(range)
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(|| Error::InvalidDate(date_str.to_string()))
    };
    let year = field(0..2)? as i32;
    let month = field(2..4)?;
    let day = field(4..6)?;

    // Assume 2000+ for years < 50, otherwise 1900+
    let full_year = if year < 50 { 2000 + year } else { 1900 + year };

    NaiveDate::from_ymd_opt(full_year, month, day)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{}-{}", full_year, month, day)))
}
