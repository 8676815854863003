// Entity models: accounts, categories and expenses

pub mod account;
pub mod category;
pub mod expense;

pub use account::{Account, Profile};
pub use category::{category_icon, Category, DEFAULT_ICON};
pub use expense::{
    ledger_timestamps, next_timestamp, Expense, ExpenseDraft, ExpenseType, Ledger, UserExpense,
    ValidExpense,
};
