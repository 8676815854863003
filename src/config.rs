use anyhow::Context;
use std::path::PathBuf;

use crate::allowlist::AllowList;

pub const DEFAULT_DB_PATH: &str = "family-expenses.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite file holding the local store
    pub db_path: PathBuf,
    /// Shared folder acting as the cloud; `None` means local-only mode
    pub cloud_dir: Option<PathBuf>,
    pub allowlist_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let db_path = std::env::var("FAMILY_EXPENSES_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
        let cloud_dir = non_empty_var("FAMILY_EXPENSES_CLOUD_DIR").map(PathBuf::from);
        let allowlist_path = non_empty_var("FAMILY_EXPENSES_ALLOWLIST").map(PathBuf::from);
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("APP_PORT is not a port number: {raw}"))?,
            Err(_) => 3000,
        };

        Ok(Self {
            db_path,
            cloud_dir,
            allowlist_path,
            host,
            port,
        })
    }

    pub fn load_allowlist(&self) -> anyhow::Result<Option<AllowList>> {
        self.allowlist_path
            .as_deref()
            .map(AllowList::load)
            .transpose()
    }

    pub fn cloud_enabled(&self) -> bool {
        self.cloud_dir.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides
/// `default_filter`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // a second init (e.g. in tests) is harmless
    if json_logs {
        let _ = builder.with_target(false).json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
