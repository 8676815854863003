// ⚠️ Error taxonomy for session operations
//
// Validation and authorization errors are shown to the user and abort the
// operation with no state change. Remote failures are logged where they
// happen and only reach this type when the remote call IS the operation
// (cloud sign-up, cloud sign-in, cloud account deletion).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // ------------------------------------------------------------------
    // (a) validation
    // ------------------------------------------------------------------
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("amount is not a number: {0:?}")]
    InvalidAmount(String),

    #[error("unknown category: {0:?}")]
    UnknownCategory(String),

    #[error("unknown expense type: {0:?} (expected Fixed or Variable)")]
    UnknownExpenseType(String),

    #[error("no expense at position {0}")]
    NoSuchExpense(usize),

    // ------------------------------------------------------------------
    // (b) authorization
    // ------------------------------------------------------------------
    #[error("not authorized to use this instance")]
    NotAllowed,

    #[error("wrong username or password")]
    InvalidCredentials,

    #[error("username or email already exists")]
    AccountExists,

    #[error("user not found in the cloud: {0}")]
    CloudUserNotFound(String),

    #[error("log in first")]
    NotLoggedIn,

    #[error("only the signed-in cloud account can be deleted from this device")]
    NotAccountOwner,

    #[error("no account named {0:?}")]
    NoSuchUser(String),

    // ------------------------------------------------------------------
    // (c) remote collaborator, surfaced only by cloud-account operations
    // ------------------------------------------------------------------
    #[error("cloud error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    // ------------------------------------------------------------------
    // local storage writes
    // ------------------------------------------------------------------
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AppError {
    /// True for errors the user caused by typing something wrong.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::MissingField(_)
                | AppError::InvalidAmount(_)
                | AppError::UnknownCategory(_)
                | AppError::UnknownExpenseType(_)
                | AppError::NoSuchExpense(_)
        )
    }

    /// True for allow-list, credential and ownership rejections.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            AppError::NotAllowed
                | AppError::InvalidCredentials
                | AppError::AccountExists
                | AppError::CloudUserNotFound(_)
                | AppError::NotLoggedIn
                | AppError::NotAccountOwner
                | AppError::NoSuchUser(_)
        )
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AppError::MissingField("description").is_validation());
        assert!(AppError::InvalidAmount("abc".into()).is_validation());
        assert!(!AppError::NotAllowed.is_validation());

        assert!(AppError::NotAllowed.is_authorization());
        assert!(AppError::InvalidCredentials.is_authorization());
        assert!(!AppError::NoSuchExpense(3).is_authorization());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AppError::MissingField("email").to_string(),
            "missing required field: email"
        );
        assert_eq!(
            AppError::InvalidAmount("12,x".into()).to_string(),
            "amount is not a number: \"12,x\""
        );
    }
}
