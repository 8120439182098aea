//! Process Configuration
//!
//! Read once from the environment at startup. Missing credentials fail
//! fast so that no handler ever runs against a half-configured store.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::command::DeferPolicy;
use crate::error::{BotError, BotResult};

/// Which storage backend to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// One JSON file per collection under `dir`
    JsonFiles { dir: PathBuf },
    /// Local SQLite database
    Sqlite { path: PathBuf },
    /// Supabase project (PostgREST)
    Supabase { url: String, key: String },
}

impl BackendConfig {
    pub fn is_remote(&self) -> bool {
        matches!(self, BackendConfig::Supabase { .. })
    }
}

/// Configuration for the bot process
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub telegram_token: String,
    pub backend: BackendConfig,
    pub defer_policy: DeferPolicy,
    /// Bind address of the health endpoint
    pub health_addr: SocketAddr,
}

impl BotConfig {
    pub fn from_env() -> BotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BotResult<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| BotError::Config(format!("Missing {}", key)));

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;

        let data_dir = PathBuf::from(var("PANTRY_DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let backend = match var("PANTRY_BACKEND").as_deref().unwrap_or("json") {
            "json" => BackendConfig::JsonFiles { dir: data_dir },
            "sqlite" => BackendConfig::Sqlite {
                path: var("PANTRY_SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_dir.join("pantry.db")),
            },
            "supabase" => BackendConfig::Supabase {
                url: required("SUPABASE_URL")?,
                key: required("SUPABASE_KEY")?,
            },
            other => {
                return Err(BotError::Config(format!(
                    "Unknown PANTRY_BACKEND '{}' (expected json, sqlite or supabase)",
                    other
                )))
            }
        };

        let defer_policy = match var("PANTRY_DEFER").as_deref() {
            None if backend.is_remote() => DeferPolicy::Always,
            None | Some("files") => DeferPolicy::FileIndexOnly,
            Some("always") => DeferPolicy::Always,
            Some(other) => {
                return Err(BotError::Config(format!(
                    "Unknown PANTRY_DEFER '{}' (expected files or always)",
                    other
                )))
            }
        };

        let port: u16 = match var("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| BotError::Config(format!("Invalid PORT '{}'", p)))?,
            None => 3000,
        };

        Ok(Self {
            telegram_token,
            backend,
            defer_policy,
            health_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        })
    }
}
