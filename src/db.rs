// 🗄️ Local Store - accounts, ledgers and preferences in a SQLite key/value table
//
// Every record is one JSON value under a fixed key. Reads are total: a
// missing, unreadable or corrupt record loads as empty. Writes replace the
// whole record and report storage errors.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::entities::{Account, Ledger};
use crate::error::AppResult;

pub const ACCOUNTS_KEY: &str = "accounts";
pub const EXPENSES_KEY: &str = "expenses";
pub const DARK_MODE_KEY: &str = "dark_mode";

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Open (or create) the store file.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        debug!(path = %path.display(), "local store opened");
        Ok(LocalStore { conn })
    }

    /// Fresh store that lives only as long as this value.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(LocalStore { conn })
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    pub fn load_accounts(&self) -> Vec<Account> {
        self.load_or_default(ACCOUNTS_KEY)
    }

    pub fn save_accounts(&self, accounts: &[Account]) -> AppResult<()> {
        self.save(ACCOUNTS_KEY, &accounts)
    }

    // ========================================================================
    // EXPENSES
    // ========================================================================

    pub fn load_expenses(&self) -> Ledger {
        self.load_or_default(EXPENSES_KEY)
    }

    pub fn save_expenses(&self, ledger: &Ledger) -> AppResult<()> {
        self.save(EXPENSES_KEY, ledger)
    }

    // ========================================================================
    // PREFERENCES
    // ========================================================================

    pub fn load_dark_mode(&self) -> bool {
        self.load_or_default(DARK_MODE_KEY)
    }

    pub fn save_dark_mode(&self, enabled: bool) -> AppResult<()> {
        self.save(DARK_MODE_KEY, &enabled)
    }

    // ========================================================================
    // RAW KEY/VALUE ACCESS
    // ========================================================================

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                debug!(key, error = %e, "local record unreadable; treating as empty");
                return T::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!(key, error = %e, "local record corrupt; treating as empty");
            T::default()
        })
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AppResult<()> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json)
    }

    pub fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn put_raw(&self, key: &str, value: &str) -> AppResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
impl LocalStore {
    /// Make every later write fail.
    pub(crate) fn reject_writes(&self) {
        self.conn
            .execute_batch(
                "CREATE TRIGGER kv_no_insert BEFORE INSERT ON kv BEGIN SELECT RAISE(ABORT, 'read-only'); END;
                 CREATE TRIGGER kv_no_update BEFORE UPDATE ON kv BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )
            .unwrap();
    }
}

pub fn setup_database(conn: &Connection) -> AppResult<()> {
    // WAL keeps the file consistent if the process dies mid-write
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Expense, ExpenseType};

    fn create_test_expense(amount: f64, category: &str, ts: i64) -> Expense {
        Expense {
            description: format!("Test expense: {}", category),
            amount,
            category: category.to_string(),
            kind: ExpenseType::Variable,
            date: "2025-01-15T09:30:00+00:00".to_string(),
            created_at_millis: ts,
        }
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let store = LocalStore::open_in_memory().unwrap();

        assert!(store.load_accounts().is_empty());
        assert!(store.load_expenses().is_empty());
        assert!(!store.load_dark_mode());
    }

    #[test]
    fn test_corrupt_records_load_as_empty() {
        let store = LocalStore::open_in_memory().unwrap();
        store.put_raw(ACCOUNTS_KEY, "{not json").unwrap();
        store.put_raw(EXPENSES_KEY, "[1, 2, 3]").unwrap();
        store.put_raw(DARK_MODE_KEY, "\"maybe\"").unwrap();

        assert!(store.load_accounts().is_empty());
        assert!(store.load_expenses().is_empty());
        assert!(!store.load_dark_mode());
    }

    #[test]
    fn test_accounts_persist() {
        let store = LocalStore::open_in_memory().unwrap();
        let accounts = vec![
            Account::new("ana", "ana@example.com", "pw").unwrap(),
            Account::new("bob", "bob@example.com", "pw").unwrap(),
        ];

        store.save_accounts(&accounts).unwrap();
        assert_eq!(store.load_accounts(), accounts);
    }

    #[test]
    fn test_ledger_preserves_order_and_fields() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut ledger = Ledger::new();
        ledger.insert(
            "ana".to_string(),
            vec![
                create_test_expense(100.0, "Food", 1),
                create_test_expense(50.0, "Food", 2),
                create_test_expense(200.0, "Transport", 3),
            ],
        );

        store.save_expenses(&ledger).unwrap();
        let loaded = store.load_expenses();

        assert_eq!(loaded, ledger);
        let ts: Vec<i64> = loaded["ana"].iter().map(|e| e.created_at_millis).collect();
        assert_eq!(ts, vec![1, 2, 3]);
    }

    #[test]
    fn test_save_overwrites_previous_value() {
        let store = LocalStore::open_in_memory().unwrap();
        store.save_dark_mode(true).unwrap();
        assert!(store.load_dark_mode());
        store.save_dark_mode(false).unwrap();
        assert!(!store.load_dark_mode());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");

        {
            let store = LocalStore::open(&path).unwrap();
            store.save_dark_mode(true).unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert!(store.load_dark_mode());
    }
}
