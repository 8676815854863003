// 💸 Expense - one recorded spending event
//
// `created_at_millis` is the identity used to de-duplicate local and remote
// copies of the same expense. No two expenses in the local ledger map share it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::category::Category;
use crate::error::{AppError, AppResult};

/// username → expenses in insertion order
pub type Ledger = BTreeMap<String, Vec<Expense>>;

// ============================================================================
// EXPENSE TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpenseType {
    #[serde(alias = "Fijo")]
    Fixed,

    #[default]
    Variable,
}

impl ExpenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Fixed => "Fixed",
            ExpenseType::Variable => "Variable",
        }
    }
}

impl fmt::Display for ExpenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "fijo" => Ok(ExpenseType::Fixed),
            "variable" => Ok(ExpenseType::Variable),
            _ => Err(AppError::UnknownExpenseType(s.to_string())),
        }
    }
}

// ============================================================================
// EXPENSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(alias = "desc")]
    pub description: String,

    #[serde(alias = "monto")]
    pub amount: f64,

    /// Literal label; unknown values are preserved.
    #[serde(alias = "categoria")]
    pub category: String,

    #[serde(rename = "type", alias = "tipo", default)]
    pub kind: ExpenseType,

    /// ISO-8601 timestamp of when the expense was recorded
    #[serde(alias = "fecha")]
    pub date: String,

    #[serde(rename = "createdAtMillis", alias = "ts")]
    pub created_at_millis: i64,
}

impl Expense {
    /// Parsed `date`, if it is a valid RFC 3339 timestamp.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn icon(&self) -> &'static str {
        super::category::category_icon(&self.category)
    }
}

/// An expense tagged with the user it belongs to, as shown in combined reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExpense {
    pub username: String,
    #[serde(flatten)]
    pub expense: Expense,
}

// ============================================================================
// DRAFT (unvalidated form input)
// ============================================================================

/// Raw user input for creating or editing an expense.
#[derive(Debug, Clone, Default)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: String,
    pub category: String,
    pub kind: Option<String>,
}

/// Validated draft, ready to be stamped with time and identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidExpense {
    pub description: String,
    pub amount: f64,
    pub category: Category,
    pub kind: ExpenseType,
}

impl ExpenseDraft {
    pub fn new(description: &str, amount: &str, category: &str, kind: Option<&str>) -> Self {
        ExpenseDraft {
            description: description.to_string(),
            amount: amount.to_string(),
            category: category.to_string(),
            kind: kind.map(str::to_string),
        }
    }

    /// Parse `<amount> <category> [fixed|variable] <description...>` as typed
    /// on the command line or the TUI prompt. Gaps are left empty for
    /// `validate` to report.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        let words: Vec<&str> = words.iter().map(|w| w.as_ref()).collect();
        let (amount, category, mut rest) = match words.as_slice() {
            [amount, category, rest @ ..] => (*amount, *category, rest.to_vec()),
            [amount] => (*amount, "", Vec::new()),
            [] => ("", "", Vec::new()),
        };

        let kind = match rest.first() {
            Some(w) if w.parse::<ExpenseType>().is_ok() => Some(rest.remove(0)),
            _ => None,
        };

        ExpenseDraft::new(&rest.join(" "), amount, category, kind)
    }

    pub fn validate(&self) -> AppResult<ValidExpense> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(AppError::MissingField("description"));
        }

        let raw_amount = self.amount.trim();
        if raw_amount.is_empty() {
            return Err(AppError::MissingField("amount"));
        }
        let amount: f64 = raw_amount
            .parse()
            .map_err(|_| AppError::InvalidAmount(raw_amount.to_string()))?;
        if !amount.is_finite() {
            return Err(AppError::InvalidAmount(raw_amount.to_string()));
        }

        if self.category.trim().is_empty() {
            return Err(AppError::MissingField("category"));
        }
        let category: Category = self.category.parse()?;

        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => ExpenseType::Variable,
            Some(k) => k.parse()?,
        };

        Ok(ValidExpense {
            description: description.to_string(),
            amount,
            category,
            kind,
        })
    }
}

impl ValidExpense {
    pub fn into_expense(self, at: DateTime<Utc>, created_at_millis: i64) -> Expense {
        Expense {
            description: self.description,
            amount: self.amount,
            category: self.category.as_str().to_string(),
            kind: self.kind,
            date: at.to_rfc3339(),
            created_at_millis,
        }
    }
}

// ============================================================================
// TIMESTAMP IDENTITY
// ============================================================================

/// Every `created_at_millis` currently in the ledger, across all users.
pub fn ledger_timestamps(ledger: &Ledger) -> HashSet<i64> {
    ledger
        .values()
        .flat_map(|expenses| expenses.iter().map(|e| e.created_at_millis))
        .collect()
}

/// First millisecond at or after `now_millis` that no stored expense uses.
pub fn next_timestamp(ledger: &Ledger, now_millis: i64) -> i64 {
    let taken = ledger_timestamps(ledger);
    let mut ts = now_millis;
    while taken.contains(&ts) {
        ts += 1;
    }
    ts
}
