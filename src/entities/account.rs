// 👤 Account - a family member who can log in and own a ledger
//
// Local accounts carry an argon2 password hash. Cloud profiles carry only
// username and email; the identity provider owns the credential.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::password::{hash_password, verify_password};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(alias = "usuario")]
    pub username: String,

    pub email: String,

    /// PHC-formatted argon2 hash. Empty for accounts mirrored from a cloud profile.
    #[serde(default, rename = "passwordHash")]
    pub password_hash: String,
}

impl Account {
    /// Create a local account, hashing the password.
    pub fn new(username: &str, email: &str, password: &str) -> AppResult<Self> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() {
            return Err(AppError::MissingField("username"));
        }
        if email.is_empty() {
            return Err(AppError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(AppError::MissingField("password"));
        }

        Ok(Account {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
        })
    }

    /// Login identifier may be either the username or the email.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username == identifier || self.email == identifier
    }

    pub fn check_password(&self, password: &str) -> bool {
        !self.password_hash.is_empty() && verify_password(password, &self.password_hash)
    }

    /// Would adding `other` break username or email uniqueness?
    pub fn conflicts_with(&self, username: &str, email: &str) -> bool {
        self.username == username || self.email == email
    }
}

/// Remote user profile stored in the `users` collection, keyed by account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation_hashes_password() {
        let account = Account::new(" ana ", "ana@example.com", "s3cret").unwrap();

        assert_eq!(account.username, "ana");
        assert_eq!(account.email, "ana@example.com");
        assert_ne!(account.password_hash, "s3cret");
        assert!(account.check_password("s3cret"));
        assert!(!account.check_password("S3cret"));
    }

    #[test]
    fn test_account_requires_all_fields() {
        assert!(matches!(
            Account::new("", "a@x.com", "pw"),
            Err(AppError::MissingField("username"))
        ));
        assert!(matches!(
            Account::new("ana", "  ", "pw"),
            Err(AppError::MissingField("email"))
        ));
        assert!(matches!(
            Account::new("ana", "a@x.com", ""),
            Err(AppError::MissingField("password"))
        ));
    }

    #[test]
    fn test_identifier_and_conflicts() {
        let account = Account::new("ana", "ana@example.com", "pw").unwrap();

        assert!(account.matches_identifier("ana"));
        assert!(account.matches_identifier("ana@example.com"));
        assert!(!account.matches_identifier("bob"));

        assert!(account.conflicts_with("ana", "other@example.com"));
        assert!(account.conflicts_with("other", "ana@example.com"));
        assert!(!account.conflicts_with("bob", "bob@example.com"));
    }

    #[test]
    fn test_cloud_mirror_account_never_verifies() {
        let account = Account {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
        };
        assert!(!account.check_password(""));
    }
}
