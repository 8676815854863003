// ☁️ Remote collaborators - optional cloud mirror
//
// The session only needs a handful of calls on a document store and an
// identity provider. Both are traits so the session never depends on a
// particular backend; the JSON-file implementations here work against any
// shared folder and double as in-memory fakes for tests.

pub mod documents;
pub mod identity;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::entities::{Expense, ExpenseType};

pub use documents::JsonDocumentStore;
pub use identity::DocumentIdentityProvider;

pub const USERS_COLLECTION: &str = "users";
pub const EXPENSES_COLLECTION: &str = "expenses";

/// Cloud profile listings are capped at this many entries.
pub const PROFILE_LIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote document malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid email or password")]
    InvalidLogin,

    #[error("email already registered: {0}")]
    EmailInUse(String),

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("no identity is signed in")]
    NotSignedIn,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

// ============================================================================
// DOCUMENT STORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> RemoteResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

pub trait DocumentStore: Send {
    /// Insert with a generated id; returns the id.
    fn add(&mut self, collection: &str, data: serde_json::Value) -> RemoteResult<String>;

    /// Insert or replace under a caller-chosen id.
    fn set(&mut self, collection: &str, id: &str, data: serde_json::Value) -> RemoteResult<()>;

    fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>>;

    /// Every document in insertion order.
    fn get_all(&self, collection: &str) -> RemoteResult<Vec<Document>>;

    /// Documents whose top-level `field` equals `value`, in insertion order.
    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> RemoteResult<Vec<Document>>;

    /// Deleting a missing id is not an error.
    fn delete_by_id(&mut self, collection: &str, id: &str) -> RemoteResult<()>;
}

// ============================================================================
// IDENTITY PROVIDER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

pub trait IdentityProvider: Send {
    fn sign_up(&mut self, email: &str, password: &str) -> RemoteResult<Identity>;
    fn sign_in(&mut self, email: &str, password: &str) -> RemoteResult<Identity>;
    fn sign_out(&mut self);
    /// Remove the signed-in identity permanently and sign out.
    fn delete_current(&mut self) -> RemoteResult<()>;
    fn current(&self) -> Option<Identity>;
}

/// The pair of collaborators that make up cloud mode.
pub struct Cloud {
    pub documents: Box<dyn DocumentStore>,
    pub identity: Box<dyn IdentityProvider>,
}

impl Cloud {
    pub fn new(documents: Box<dyn DocumentStore>, identity: Box<dyn IdentityProvider>) -> Self {
        Cloud {
            documents,
            identity,
        }
    }

    /// File-backed cloud rooted at `dir` (documents.json + identities.json).
    pub fn open_dir(dir: &Path) -> RemoteResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Cloud::new(
            Box::new(JsonDocumentStore::open(&dir.join("documents.json"))),
            Box::new(DocumentIdentityProvider::open(&dir.join("identities.json"))),
        ))
    }
}

// ============================================================================
// EXPENSE DOCUMENTS
// ============================================================================

/// Shape of a document in the `expenses` collection. Every field is optional
/// on read because other clients may have written partial documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDoc {
    #[serde(default, alias = "usuario", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, alias = "desc")]
    pub description: String,

    #[serde(default, alias = "monto")]
    pub amount: f64,

    #[serde(default, alias = "categoria")]
    pub category: String,

    #[serde(default, rename = "type", alias = "tipo", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ExpenseType>,

    #[serde(default, alias = "fecha", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, rename = "createdAtMillis", alias = "ts", skip_serializing_if = "Option::is_none")]
    pub created_at_millis: Option<i64>,

    /// Server-side write time
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExpenseDoc {
    pub fn from_expense(expense: &Expense, username: &str, uid: &str, now: DateTime<Utc>) -> Self {
        ExpenseDoc {
            username: Some(username.to_string()),
            uid: Some(uid.to_string()),
            description: expense.description.clone(),
            amount: expense.amount,
            category: expense.category.clone(),
            kind: Some(expense.kind),
            date: Some(expense.date.clone()),
            created_at_millis: Some(expense.created_at_millis),
            created_at: Some(now),
        }
    }

    pub fn to_value(&self) -> RemoteResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ============================================================================
// JSON FILE HELPERS
// ============================================================================

/// Missing file reads as the default value.
pub(crate) fn read_json_file<T: DeserializeOwned + Default>(path: &Path) -> RemoteResult<T> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(T::default()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temp file so readers never see half a document.
pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> RemoteResult<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_doc_reads_partial_legacy_document() {
        let value = serde_json::json!({
            "usuario": "ana",
            "uid": "u-1",
            "desc": "Agua",
            "monto": 9000,
            "categoria": "Servicios",
            "ts": 42
        });

        let doc: ExpenseDoc = serde_json::from_value(value).unwrap();
        assert_eq!(doc.username.as_deref(), Some("ana"));
        assert_eq!(doc.description, "Agua");
        assert_eq!(doc.amount, 9000.0);
        assert_eq!(doc.kind, None);
        assert_eq!(doc.date, None);
        assert_eq!(doc.created_at_millis, Some(42));
    }

    #[test]
    fn test_expense_doc_from_expense() {
        let expense = Expense {
            description: "Bus".into(),
            amount: 700.0,
            category: "Transport".into(),
            kind: ExpenseType::Fixed,
            date: "2025-02-01T08:00:00+00:00".into(),
            created_at_millis: 77,
        };
        let doc = ExpenseDoc::from_expense(&expense, "ana", "u-1", Utc::now());
        let value = doc.to_value().unwrap();

        assert_eq!(value["username"], "ana");
        assert_eq!(value["uid"], "u-1");
        assert_eq!(value["type"], "Fixed");
        assert_eq!(value["createdAtMillis"], 77);
    }

    #[test]
    fn test_read_missing_json_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<String> = read_json_file(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_empty());
    }
}
