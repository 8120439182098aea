//! Storage Module
//!
//! Named-list storage (cart, notes, meals) and the attachment index,
//! with interchangeable flat-file, SQLite and Supabase backends.

pub mod json_file;
pub mod postgrest;
pub mod sqlite;

pub use json_file::JsonFileStore;
pub use postgrest::PostgrestStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::BotResult;

/// Reserved entry value that clears a whole collection
pub const CLEAR_ALL: &str = "all";

/// The named collections every backend must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Cart,
    Notes,
    Meals,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Cart, Collection::Notes, Collection::Meals];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Cart => "cart",
            Collection::Notes => "notes",
            Collection::Meals => "meals",
        }
    }

    /// Relational table holding this collection
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Cart => "ShoppingCart",
            Collection::Notes => "Notes",
            Collection::Meals => "Meals",
        }
    }

    /// Text column inside [`Collection::table`]
    pub fn column(&self) -> &'static str {
        match self {
            Collection::Cart => "item",
            Collection::Notes => "note",
            Collection::Meals => "meal",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a `remove` call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveTarget<'a> {
    /// Every entry in the collection
    All,
    /// The oldest entry whose text matches exactly
    Exact(&'a str),
}

impl<'a> RemoveTarget<'a> {
    pub fn parse(entry: &'a str) -> Self {
        if entry == CLEAR_ALL {
            RemoveTarget::All
        } else {
            RemoveTarget::Exact(entry)
        }
    }
}

/// A saved attachment reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub url: String,
    pub description: String,
    /// Channel (chat) the file was saved from
    pub origin_channel: String,
    /// Interaction (message) that saved it
    pub origin_interaction: String,
}

impl FileRecord {
    pub fn new(
        url: impl Into<String>,
        description: impl Into<String>,
        origin_channel: impl Into<String>,
        origin_interaction: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            origin_channel: origin_channel.into(),
            origin_interaction: origin_interaction.into(),
        }
    }

    /// Case-insensitive substring match on the description only
    pub fn matches(&self, keyword: &str) -> bool {
        self.description.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// Ordered free-text collections
///
/// Reads of a missing collection yield an empty vector. Removing a value
/// that is not present is a no-op. When several entries share the same
/// text, an exact removal deletes the oldest one.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append an entry to the end of the collection
    async fn add(&self, collection: Collection, entry: &str) -> BotResult<()>;

    /// All entries in insertion order
    async fn list(&self, collection: Collection) -> BotResult<Vec<String>>;

    /// Remove one entry by exact text, or everything for [`CLEAR_ALL`]
    async fn remove(&self, collection: Collection, entry: &str) -> BotResult<()>;
}

/// Keyword-searchable attachment index
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Store a new record (no dedup)
    async fn save(&self, record: FileRecord) -> BotResult<()>;

    /// Records whose description contains `keyword`, ignoring case.
    /// An empty keyword matches everything.
    async fn find(&self, keyword: &str) -> BotResult<Vec<FileRecord>>;
}

/// Storage handle injected into the command router
#[derive(Clone)]
pub struct Storage {
    pub lists: Arc<dyn ListStore>,
    pub files: Arc<dyn FileIndex>,
    backend: &'static str,
}

impl Storage {
    pub fn new(lists: Arc<dyn ListStore>, files: Arc<dyn FileIndex>, backend: &'static str) -> Self {
        Self { lists, files, backend }
    }

    /// Build a handle backed by a single store implementing both traits
    pub fn from_store<S>(store: S, backend: &'static str) -> Self
    where
        S: ListStore + FileIndex + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store, backend)
    }

    /// Open the backend selected by the configuration
    pub async fn open(config: &BackendConfig) -> BotResult<Self> {
        match config {
            BackendConfig::JsonFiles { dir } => {
                info!("🗂️  Opening flat-file store at {:?}", dir);
                Ok(Self::from_store(JsonFileStore::new(dir), "json"))
            }
            BackendConfig::Sqlite { path } => {
                info!("🗄️  Opening SQLite store at {:?}", path);
                Ok(Self::from_store(SqliteStore::new(path).await?, "sqlite"))
            }
            BackendConfig::Supabase { url, key } => {
                info!("🌐 Connecting to Supabase at {}", url);
                Ok(Self::from_store(PostgrestStore::new(url.clone(), key.clone()), "supabase"))
            }
        }
    }

    /// Short backend name for logs and the health endpoint
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}
