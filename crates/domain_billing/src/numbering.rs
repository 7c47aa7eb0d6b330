//! Document numbers
//!
//! Receipts and transactions are numbered `PREFIX/YYYY/MM/NNNNN`, restarting
//! at 1 every calendar month of the payment date. The counter itself lives
//! in the store and is advanced inside the same unit of work as the insert.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Kind of numbered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Legacy payment receipt (kwitansi)
    Receipt,
    /// Payment transaction
    Transaction,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "KWT",
            DocumentKind::Transaction => "TRX",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Transaction => "transaction",
        }
    }
}

/// Key of one monthly sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceKey {
    pub kind: DocumentKind,
    pub year: i32,
    pub month: u32,
}

impl SequenceKey {
    /// Sequence that a document dated `date` draws from
    pub fn for_date(kind: DocumentKind, date: NaiveDate) -> Self {
        Self {
            kind,
            year: date.year(),
            month: date.month(),
        }
    }

    /// Formats the `sequence`-th number of this month
    pub fn format(&self, sequence: u32) -> String {
        format!("{}/{:04}/{:02}/{:05}", self.kind.prefix(), self.year, self.month, sequence)
    }
}
