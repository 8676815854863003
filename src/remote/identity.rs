use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::password::{hash_password, verify_password};

use super::{read_json_file, write_json_file, Identity, IdentityProvider, RemoteError, RemoteResult};

/// Same floor the hosted auth providers enforce.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    uid: String,
    email: String,
    password_hash: String,
}

/// Email/password identity provider keeping credentials in a JSON file.
pub struct DocumentIdentityProvider {
    path: Option<PathBuf>,
    credentials: Vec<Credential>,
    current: Option<Identity>,
}

impl DocumentIdentityProvider {
    pub fn open(path: &Path) -> Self {
        DocumentIdentityProvider {
            path: Some(path.to_path_buf()),
            credentials: Vec::new(),
            current: None,
        }
    }

    pub fn in_memory() -> Self {
        DocumentIdentityProvider {
            path: None,
            credentials: Vec::new(),
            current: None,
        }
    }

    fn load(&self) -> RemoteResult<Vec<Credential>> {
        match &self.path {
            Some(path) => read_json_file(path),
            None => Ok(self.credentials.clone()),
        }
    }

    fn store(&mut self, credentials: Vec<Credential>) -> RemoteResult<()> {
        if let Some(path) = &self.path {
            write_json_file(path, &credentials)?;
        }
        self.credentials = credentials;
        Ok(())
    }
}

impl IdentityProvider for DocumentIdentityProvider {
    fn sign_up(&mut self, email: &str, password: &str) -> RemoteResult<Identity> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RemoteError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let mut credentials = self.load()?;
        if credentials.iter().any(|c| c.email.eq_ignore_ascii_case(email)) {
            return Err(RemoteError::EmailInUse(email.to_string()));
        }

        let password_hash =
            hash_password(password).map_err(|e| RemoteError::Hash(e.to_string()))?;

        let identity = Identity {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        credentials.push(Credential {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            password_hash,
        });
        self.store(credentials)?;

        Ok(identity)
    }

    fn sign_in(&mut self, email: &str, password: &str) -> RemoteResult<Identity> {
        let credentials = self.load()?;
        let credential = credentials
            .iter()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .ok_or(RemoteError::InvalidLogin)?;

        if !verify_password(password, &credential.password_hash) {
            return Err(RemoteError::InvalidLogin);
        }

        let identity = Identity {
            uid: credential.uid.clone(),
            email: credential.email.clone(),
        };
        self.current = Some(identity.clone());
        Ok(identity)
    }

    fn sign_out(&mut self) {
        self.current = None;
    }

    fn delete_current(&mut self) -> RemoteResult<()> {
        let current = self.current.clone().ok_or(RemoteError::NotSignedIn)?;
        let mut credentials = self.load()?;
        credentials.retain(|c| c.uid != current.uid);
        self.store(credentials)?;
        self.current = None;
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_then_sign_in() {
        let mut provider = DocumentIdentityProvider::in_memory();
        let created = provider.sign_up("ana@example.com", "secret1").unwrap();

        // sign-up alone does not start a session
        assert!(provider.current().is_none());

        let signed_in = provider.sign_in("ana@example.com", "secret1").unwrap();
        assert_eq!(created, signed_in);
        assert_eq!(provider.current(), Some(signed_in));
    }

    #[test]
    fn test_sign_up_rejects_duplicates_and_weak_passwords() {
        let mut provider = DocumentIdentityProvider::in_memory();
        provider.sign_up("ana@example.com", "secret1").unwrap();

        assert!(matches!(
            provider.sign_up("ANA@example.com", "secret2"),
            Err(RemoteError::EmailInUse(_))
        ));
        assert!(matches!(
            provider.sign_up("bob@example.com", "123"),
            Err(RemoteError::WeakPassword(6))
        ));
    }

    #[test]
    fn test_sign_in_failures() {
        let mut provider = DocumentIdentityProvider::in_memory();
        provider.sign_up("ana@example.com", "secret1").unwrap();

        assert!(matches!(
            provider.sign_in("ana@example.com", "wrong!!"),
            Err(RemoteError::InvalidLogin)
        ));
        assert!(matches!(
            provider.sign_in("nobody@example.com", "secret1"),
            Err(RemoteError::InvalidLogin)
        ));
        assert!(provider.current().is_none());
    }

    #[test]
    fn test_delete_current() {
        let mut provider = DocumentIdentityProvider::in_memory();
        assert!(matches!(
            provider.delete_current(),
            Err(RemoteError::NotSignedIn)
        ));

        provider.sign_up("ana@example.com", "secret1").unwrap();
        provider.sign_in("ana@example.com", "secret1").unwrap();
        provider.delete_current().unwrap();

        assert!(provider.current().is_none());
        assert!(provider.sign_in("ana@example.com", "secret1").is_err());
    }

    #[test]
    fn test_credentials_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");

        DocumentIdentityProvider::open(&path)
            .sign_up("ana@example.com", "secret1")
            .unwrap();

        let mut other = DocumentIdentityProvider::open(&path);
        assert!(other.sign_in("ana@example.com", "secret1").is_ok());
    }
}
