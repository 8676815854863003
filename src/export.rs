// 📤 CSV export of a user's ledger

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::entities::Expense;

#[derive(Debug, Serialize)]
struct ExpenseRow<'a> {
    date: &'a str,
    description: &'a str,
    category: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    amount: f64,
    created_at_millis: i64,
}

impl<'a> From<&'a Expense> for ExpenseRow<'a> {
    fn from(e: &'a Expense) -> Self {
        ExpenseRow {
            date: &e.date,
            description: &e.description,
            category: &e.category,
            kind: e.kind.as_str(),
            amount: e.amount,
            created_at_millis: e.created_at_millis,
        }
    }
}

/// Write `expenses` as CSV with a header row. Returns the number of rows.
pub fn write_expenses_csv<W: Write>(writer: W, expenses: &[Expense]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for e in expenses {
        wtr.serialize(ExpenseRow::from(e))?;
    }
    wtr.flush()?;
    Ok(expenses.len())
}

pub fn export_expenses(path: &Path, expenses: &[Expense]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_expenses_csv(file, expenses)
}
