// 🧭 Session - application state behind every user action
//
// Created once at startup and owned by whichever front-end is running (CLI,
// TUI, API server). Holds the local store, the optional cloud collaborators,
// the optional allow-list and the logged-in user. Stored data is reloaded
// from the local store at the start of each operation.
//
// Cloud calls are single attempts. A failure in a mirroring call (add, edit,
// delete, resync, report fetch) is logged and the operation continues with
// local data only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::allowlist::{registration_allowed, AllowList};
use crate::config::AppConfig;
use crate::db::LocalStore;
use crate::entities::{next_timestamp, Account, Expense, ExpenseDraft, Profile};
use crate::error::{AppError, AppResult};
use crate::reconciliation::{decode_remote, merge_remote, sync_into_ledger, RemoteExpense};
use crate::remote::{
    Cloud, DocumentStore, ExpenseDoc, RemoteError, RemoteResult, EXPENSES_COLLECTION,
    PROFILE_LIST_LIMIT, USERS_COLLECTION,
};
use crate::reports::{self, Report};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub username: String,
    /// Cloud account id; set only when logged in through the identity provider
    pub uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Local,
    /// Cloud accounts log in with their email
    Cloud { uid: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum UserOrigin {
    Local,
    Cloud { uid: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntry {
    pub username: String,
    pub email: String,
    #[serde(flatten)]
    pub origin: UserOrigin,
}

/// The logged-in user's own ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerView {
    pub username: String,
    pub expenses: Vec<Expense>,
    pub total: f64,
}

pub struct Session {
    store: LocalStore,
    cloud: Option<Cloud>,
    allowlist: Option<AllowList>,
    current: Option<CurrentUser>,
}

impl Session {
    pub fn new(store: LocalStore, cloud: Option<Cloud>, allowlist: Option<AllowList>) -> Self {
        Session {
            store,
            cloud,
            allowlist,
            current: None,
        }
    }

    /// Build from configuration. A cloud folder that cannot be opened leaves
    /// the session in local-only mode; a bad allow-list file is an error.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = LocalStore::open(&config.db_path)?;
        let allowlist = config.load_allowlist()?;

        let cloud = match &config.cloud_dir {
            Some(dir) => match Cloud::open_dir(dir) {
                Ok(cloud) => {
                    info!(dir = %dir.display(), "cloud sync enabled");
                    Some(cloud)
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "could not open cloud folder; running local-only");
                    None
                }
            },
            None => None,
        };

        Ok(Session::new(store, cloud, allowlist))
    }

    pub fn is_cloud(&self) -> bool {
        self.cloud.is_some()
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.current.as_ref()
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    fn require_user(&self) -> AppResult<CurrentUser> {
        self.current.clone().ok_or(AppError::NotLoggedIn)
    }

    // ========================================================================
    // REGISTRATION & LOGIN
    // ========================================================================

    pub fn register(&mut self, username: &str, email: &str, password: &str) -> AppResult<Registration> {
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

        if !registration_allowed(self.allowlist.as_ref(), username, email) {
            info!(username, "registration rejected by allow-list");
            return Err(AppError::NotAllowed);
        }

        if let Some(cloud) = self.cloud.as_mut() {
            let identity = cloud.identity.sign_up(email, password)?;
            let profile = Profile {
                username: username.to_string(),
                email: email.to_string(),
                created_at: Some(Utc::now()),
            };
            cloud.documents.set(
                USERS_COLLECTION,
                &identity.uid,
                serde_json::to_value(&profile)?,
            )?;
            info!(username, uid = %identity.uid, "registered cloud account");
            return Ok(Registration::Cloud { uid: identity.uid });
        }

        let mut accounts = self.store.load_accounts();
        if accounts.iter().any(|a| a.conflicts_with(username, email)) {
            return Err(AppError::AccountExists);
        }
        accounts.push(Account::new(username, email, password)?);
        self.store.save_accounts(&accounts)?;
        info!(username, "registered local account");
        Ok(Registration::Local)
    }

    /// `identifier` is a username or an email. Returns the logged-in username.
    pub fn login(&mut self, identifier: &str, password: &str) -> AppResult<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(AppError::MissingField("password"));
        }

        let user = if self.cloud.is_some() {
            self.cloud_login(identifier, password)?
        } else {
            self.local_login(identifier, password)?
        };

        let username = user.username.clone();
        let cloud = user.uid.is_some();
        self.current = Some(user);

        // a login whose resync cannot be saved leaves nobody logged in
        if self.cloud.is_some() {
            if let Err(e) = self.sync_from_cloud() {
                self.logout();
                return Err(e);
            }
        }

        info!(username = %username, cloud, "logged in");
        Ok(username)
    }

    fn local_login(&self, identifier: &str, password: &str) -> AppResult<CurrentUser> {
        let accounts = self.store.load_accounts();
        let account = accounts
            .iter()
            .find(|a| a.matches_identifier(identifier) && a.check_password(password))
            .ok_or(AppError::InvalidCredentials)?;

        if !registration_allowed(self.allowlist.as_ref(), &account.username, &account.email) {
            return Err(AppError::NotAllowed);
        }

        Ok(CurrentUser {
            username: account.username.clone(),
            uid: None,
        })
    }

    fn cloud_login(&mut self, identifier: &str, password: &str) -> AppResult<CurrentUser> {
        if let Some(list) = &self.allowlist {
            if !list.permits_identifier(identifier) {
                return Err(AppError::NotAllowed);
            }
        }
        let Some(cloud) = self.cloud.as_mut() else {
            return Err(AppError::InvalidCredentials);
        };

        if identifier.contains('@') {
            let identity = cloud
                .identity
                .sign_in(identifier, password)
                .map_err(credential_error)?;

            let username = match cloud.documents.get(USERS_COLLECTION, &identity.uid) {
                Ok(Some(doc)) => doc
                    .decode::<Profile>()
                    .map(|p| p.username)
                    .unwrap_or_else(|_| identifier.to_string()),
                Ok(None) => identifier.to_string(),
                Err(e) => {
                    warn!(error = %e, "could not read cloud profile; using email as username");
                    identifier.to_string()
                }
            };
            return Ok(CurrentUser {
                username,
                uid: Some(identity.uid),
            });
        }

        let matches = cloud.documents.query_by_field(
            USERS_COLLECTION,
            "username",
            &serde_json::Value::from(identifier),
        )?;
        let profile = matches
            .first()
            .map(|doc| doc.decode::<Profile>())
            .transpose()?
            .ok_or_else(|| AppError::CloudUserNotFound(identifier.to_string()))?;

        let identity = cloud
            .identity
            .sign_in(&profile.email, password)
            .map_err(credential_error)?;
        Ok(CurrentUser {
            username: identifier.to_string(),
            uid: Some(identity.uid),
        })
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            info!(username = %user.username, "logged out");
        }
        if let Some(cloud) = self.cloud.as_mut() {
            if cloud.identity.current().is_some() {
                cloud.identity.sign_out();
            }
        }
    }

    // ========================================================================
    // CLOUD RESYNC
    // ========================================================================

    /// Pull the current user's remote expenses into their local ledger.
    /// Returns how many new expenses were admitted; remote failures admit 0.
    pub fn sync_from_cloud(&mut self) -> AppResult<usize> {
        let (Some(cloud), Some(user)) = (self.cloud.as_ref(), self.current.as_ref()) else {
            return Ok(0);
        };
        let Some(uid) = user.uid.as_deref() else {
            return Ok(0);
        };

        let docs = match cloud.documents.query_by_field(
            EXPENSES_COLLECTION,
            "uid",
            &serde_json::Value::from(uid),
        ) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "cloud resync failed; keeping local data");
                return Ok(0);
            }
        };

        let remote = decode_remote(&docs, Utc::now());
        let mut ledger = self.store.load_expenses();
        let admitted = sync_into_ledger(&mut ledger, &remote, &user.username);
        self.store.save_expenses(&ledger)?;

        if admitted > 0 {
            info!(username = %user.username, admitted, "pulled expenses from cloud");
        }
        Ok(admitted)
    }

    // ========================================================================
    // EXPENSES
    // ========================================================================

    pub fn add_expense(&mut self, draft: &ExpenseDraft) -> AppResult<Expense> {
        self.add_expense_at(draft, Utc::now())
    }

    pub fn add_expense_at(&mut self, draft: &ExpenseDraft, now: DateTime<Utc>) -> AppResult<Expense> {
        let user = self.require_user()?;
        let valid = draft.validate()?;

        let mut ledger = self.store.load_expenses();
        let ts = next_timestamp(&ledger, now.timestamp_millis());
        let expense = valid.into_expense(now, ts);
        ledger
            .entry(user.username.clone())
            .or_default()
            .push(expense.clone());
        self.store.save_expenses(&ledger)?;

        if let (Some(cloud), Some(uid)) = (self.cloud.as_mut(), user.uid.as_deref()) {
            let pushed = ExpenseDoc::from_expense(&expense, &user.username, uid, now)
                .to_value()
                .and_then(|doc| cloud.documents.add(EXPENSES_COLLECTION, doc));
            if let Err(e) = pushed {
                warn!(error = %e, "could not upload expense to cloud");
            }
        }

        Ok(expense)
    }

    /// Replace the expense at `index` (0-based), keeping its date and timestamp.
    pub fn edit_expense(&mut self, index: usize, draft: &ExpenseDraft) -> AppResult<Expense> {
        let user = self.require_user()?;
        let valid = draft.validate()?;

        let mut ledger = self.store.load_expenses();
        let entry = ledger
            .get_mut(&user.username)
            .and_then(|expenses| expenses.get_mut(index))
            .ok_or(AppError::NoSuchExpense(index))?;

        entry.description = valid.description;
        entry.amount = valid.amount;
        entry.category = valid.category.as_str().to_string();
        entry.kind = valid.kind;
        let updated = entry.clone();
        self.store.save_expenses(&ledger)?;

        if let (Some(cloud), Some(uid)) = (self.cloud.as_mut(), user.uid.as_deref()) {
            let doc = ExpenseDoc::from_expense(&updated, &user.username, uid, Utc::now());
            if let Err(e) = replace_remote_expense(cloud.documents.as_mut(), uid, &doc) {
                warn!(error = %e, "could not update expense in cloud");
            }
        }

        Ok(updated)
    }

    /// Remove exactly the expense at `index` (0-based) from the user's ledger.
    pub fn delete_expense(&mut self, index: usize) -> AppResult<Expense> {
        let user = self.require_user()?;
        let mut ledger = self.store.load_expenses();

        let target = ledger
            .get(&user.username)
            .and_then(|expenses| expenses.get(index))
            .cloned()
            .ok_or(AppError::NoSuchExpense(index))?;

        if let (Some(cloud), Some(uid)) = (self.cloud.as_mut(), user.uid.as_deref()) {
            if let Err(e) =
                delete_remote_expense(cloud.documents.as_mut(), uid, target.created_at_millis)
            {
                warn!(error = %e, "could not delete expense in cloud");
            }
        }

        if let Some(expenses) = ledger.get_mut(&user.username) {
            expenses.remove(index);
        }
        self.store.save_expenses(&ledger)?;

        if self.cloud.is_some() {
            self.sync_from_cloud()?;
        }

        Ok(target)
    }

    pub fn expenses(&self) -> AppResult<LedgerView> {
        let user = self.require_user()?;
        let mut ledger = self.store.load_expenses();
        let expenses = ledger.remove(&user.username).unwrap_or_default();
        let total = reports::total(&expenses);

        Ok(LedgerView {
            username: user.username,
            expenses,
            total,
        })
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    /// All local ledgers plus every remote expense not already held locally.
    pub fn report(&self, today: NaiveDate) -> Report {
        let ledger = self.store.load_expenses();

        let remote = match &self.cloud {
            Some(cloud) => match cloud.documents.get_all(EXPENSES_COLLECTION) {
                Ok(docs) => decode_remote(&docs, Utc::now()),
                Err(e) => {
                    warn!(error = %e, "could not read cloud expenses; reporting local data only");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let current = self.current.as_ref().map(|u| u.username.as_str());
        let merged = merge_remote(&ledger, &remote, current);
        Report::build(&merged, today)
    }

    // ========================================================================
    // USERS
    // ========================================================================

    pub fn users(&self) -> Vec<UserEntry> {
        let mut users: Vec<UserEntry> = self
            .store
            .load_accounts()
            .into_iter()
            .map(|a| UserEntry {
                username: a.username,
                email: a.email,
                origin: UserOrigin::Local,
            })
            .collect();

        if let Some(cloud) = &self.cloud {
            match cloud.documents.get_all(USERS_COLLECTION) {
                Ok(docs) => users.extend(docs.iter().take(PROFILE_LIST_LIMIT).filter_map(|doc| {
                    doc.decode::<Profile>().ok().map(|p| UserEntry {
                        username: p.username,
                        email: p.email,
                        origin: UserOrigin::Cloud { uid: doc.id.clone() },
                    })
                })),
                Err(e) => warn!(error = %e, "could not list cloud users"),
            }
        }

        users
    }

    /// Remove a local account and its entire ledger.
    pub fn delete_user(&mut self, username: &str) -> AppResult<()> {
        let mut accounts = self.store.load_accounts();
        let before = accounts.len();
        accounts.retain(|a| a.username != username);

        let mut ledger = self.store.load_expenses();
        let had_ledger = ledger.remove(username).is_some();

        if accounts.len() == before && !had_ledger {
            return Err(AppError::NoSuchUser(username.to_string()));
        }

        self.store.save_accounts(&accounts)?;
        self.store.save_expenses(&ledger)?;

        if self.current.as_ref().is_some_and(|u| u.username == username) {
            self.current = None;
        }
        info!(username, "deleted user and ledger");
        Ok(())
    }

    /// Delete the signed-in cloud identity and its profile, then log out.
    pub fn delete_cloud_account(&mut self, uid: &str) -> AppResult<()> {
        let cloud = self.cloud.as_mut().ok_or(AppError::NotAccountOwner)?;
        let owns = cloud.identity.current().is_some_and(|i| i.uid == uid);
        if !owns {
            return Err(AppError::NotAccountOwner);
        }

        cloud.identity.delete_current()?;
        cloud.documents.delete_by_id(USERS_COLLECTION, uid)?;
        self.current = None;
        info!(uid, "deleted cloud account");
        Ok(())
    }

    // ========================================================================
    // PREFERENCES
    // ========================================================================

    pub fn dark_mode(&self) -> bool {
        self.store.load_dark_mode()
    }

    pub fn set_dark_mode(&self, enabled: bool) -> AppResult<()> {
        self.store.save_dark_mode(enabled)
    }

    pub fn toggle_dark_mode(&self) -> AppResult<bool> {
        let enabled = !self.dark_mode();
        self.set_dark_mode(enabled)?;
        Ok(enabled)
    }
}

/// Bad credentials from the provider are an authorization error; anything
/// else is a cloud failure.
fn credential_error(e: RemoteError) -> AppError {
    match e {
        RemoteError::InvalidLogin => AppError::InvalidCredentials,
        other => AppError::Remote(other),
    }
}

/// First remote expense of `uid` that reconciles under timestamp `ts`.
fn find_remote_expense(
    documents: &dyn DocumentStore,
    uid: &str,
    ts: i64,
) -> RemoteResult<Option<String>> {
    let owned = documents.query_by_field(EXPENSES_COLLECTION, "uid", &serde_json::Value::from(uid))?;
    let now = Utc::now();
    Ok(owned
        .into_iter()
        .find(|doc| {
            doc.decode::<ExpenseDoc>()
                .map(|d| RemoteExpense::from_doc(d, &doc.id, now).expense.created_at_millis == ts)
                .unwrap_or(false)
        })
        .map(|doc| doc.id))
}

fn delete_remote_expense(documents: &mut dyn DocumentStore, uid: &str, ts: i64) -> RemoteResult<()> {
    if let Some(id) = find_remote_expense(documents, uid, ts)? {
        documents.delete_by_id(EXPENSES_COLLECTION, &id)?;
    }
    Ok(())
}

fn replace_remote_expense(documents: &mut dyn DocumentStore, uid: &str, doc: &ExpenseDoc) -> RemoteResult<()> {
    let ts = doc.created_at_millis.unwrap_or_default();
    match find_remote_expense(documents, uid, ts)? {
        Some(id) => documents.set(EXPENSES_COLLECTION, &id, doc.to_value()?),
        None => documents.add(EXPENSES_COLLECTION, doc.to_value()?).map(|_| ()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
