// Family Expenses - Core Library
// Exposes all modules for use in the CLI, the TUI, the API server and tests

pub mod allowlist;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod export;
pub mod password;
pub mod reconciliation;
pub mod remote;
pub mod reports;
pub mod session;

// Re-export commonly used types
pub use allowlist::{registration_allowed, AllowList};
pub use config::{init_tracing, AppConfig};
pub use db::LocalStore;
pub use entities::{
    Account, Category, Expense, ExpenseDraft, ExpenseType, Ledger, Profile, UserExpense,
};
pub use error::{AppError, AppResult};
pub use export::{export_expenses, write_expenses_csv};
pub use reconciliation::{decode_remote, merge_remote, sync_into_ledger, RemoteExpense};
pub use remote::{
    Cloud, Document, DocumentIdentityProvider, DocumentStore, Identity, IdentityProvider,
    JsonDocumentStore, RemoteError,
};
pub use reports::{
    format_colones, render_report, ChartBoard, ChartKind, ChartRenderer, ChartSpec,
    CategoryTotal, MonthlySeries, Report,
};
pub use session::{CurrentUser, LedgerView, Registration, Session, UserEntry, UserOrigin};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
