//! Common types shared by the parsers and the OFX serializer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest `NAME`/`MEMO` text accepted by the consuming banking software.
pub const MAX_TEXT_LEN: usize = 32;

/// Represents a single booked movement on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Debit or credit.
    pub kind: DebitCredit,

    /// Posting (value) date.
    pub posted_at: NaiveDate,

    /// Magnitude of the movement, never negative.
    pub amount: Decimal,

    /// Unique transaction identifier (OFX `FITID`).
    pub id: String,

    /// Short free-text note, at most [`MAX_TEXT_LEN`] characters.
    pub memo: String,

    /// Payee or counterparty display name.
    pub name: String,
}

impl Transaction {
    /// Amount with the sign OFX expects: negative for debits.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.apply_sign(self.amount)
    }
}

/// Debit/Credit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Debit transaction (outgoing).
    Debit,
    /// Credit transaction (incoming).
    Credit,
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" | "DEBIT" => Ok(DebitCredit::Debit),
            "C" | "CREDIT" => Ok(DebitCredit::Credit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

impl DebitCredit {
    /// OFX `TRNTYPE` value.
    pub fn ofx_type(&self) -> &'static str {
        match self {
            DebitCredit::Debit => "DEBIT",
            DebitCredit::Credit => "CREDIT",
        }
    }

    /// Negate debits. Zero stays unsigned so `-0.00` never reaches OFX.
    fn apply_sign(&self, magnitude: Decimal) -> Decimal {
        match self {
            DebitCredit::Debit if !magnitude.is_zero() => -magnitude,
            _ => magnitude,
        }
    }
}

/// Account balance at a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance magnitude.
    pub amount: Decimal,

    /// Whether the account is in credit or in debit.
    pub kind: DebitCredit,

    /// Date of the balance.
    pub date: NaiveDate,
}

impl Balance {
    /// Balance with its sign applied.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.apply_sign(self.amount)
    }
}

/// Values used when the source format does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementDefaults {
    pub bank_id: String,
    pub account_id: String,
    pub currency: String,
}

impl Default for StatementDefaults {
    fn default() -> Self {
        Self {
            bank_id: "BANK_ID".to_string(),
            account_id: "ACCOUNT_ID".to_string(),
            currency: "EUR".to_string(),
        }
    }
}

/// Account statement containing transactions and balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Bank identification (BIC or routing number).
    pub bank_id: String,

    /// Account identification.
    pub account_id: String,

    /// Currency code for the account.
    pub currency: String,

    /// Transactions in the order they appear in the source.
    pub transactions: Vec<Transaction>,

    /// Closing (ledger) balance, if the source carries one.
    pub closing_balance: Option<Balance>,

    /// Closing available balance, if the source carries one.
    pub available_balance: Option<Balance>,
}

impl Statement {
    /// Create an empty statement from the configured defaults.
    pub fn new(defaults: &StatementDefaults) -> Self {
        Self {
            bank_id: defaults.bank_id.clone(),
            account_id: defaults.account_id.clone(),
            currency: defaults.currency.clone(),
            transactions: Vec::new(),
            closing_balance: None,
            available_balance: None,
        }
    }

    /// Add a transaction to the statement.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }
}

/// Keep at most [`MAX_TEXT_LEN`] characters of `text`.
pub fn truncate_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}
