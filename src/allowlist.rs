// 🔐 Allow-list - optional gate on who may register or log in
//
// A person passes when their email is listed OR their username is listed.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowList {
    #[serde(default)]
    pub emails: HashSet<String>,

    #[serde(default)]
    pub usernames: HashSet<String>,
}

impl AllowList {
    pub fn new<E, U>(emails: E, usernames: U) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        AllowList {
            emails: emails.into_iter().map(Into::into).collect(),
            usernames: usernames.into_iter().map(Into::into).collect(),
        }
    }

    /// Load from a JSON file shaped `{"emails": [...], "usernames": [...]}`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allow-list {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse allow-list {}", path.display()))
    }

    pub fn permits_registration(&self, username: &str, email: &str) -> bool {
        self.emails.contains(email) || self.usernames.contains(username)
    }

    /// Cloud login only knows the typed identifier; it counts as an email
    /// only when it contains `@`.
    pub fn permits_identifier(&self, identifier: &str) -> bool {
        let as_email = identifier.contains('@') && self.emails.contains(identifier);
        as_email || self.usernames.contains(identifier)
    }
}

/// Gate helper: `None` means no allow-list is configured and everyone passes.
pub fn registration_allowed(list: Option<&AllowList>, username: &str, email: &str) -> bool {
    list.map_or(true, |l| l.permits_registration(username, email))
}
