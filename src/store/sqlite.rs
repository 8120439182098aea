//! SQLite Store
//!
//! Relational backend on a local database file. Each call opens its own
//! connection inside `spawn_blocking`, so no handle is shared between tasks.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tokio::task;

use super::{Collection, FileIndex, FileRecord, ListStore, RemoveTarget};
use crate::error::{BotError, BotResult};

#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub async fn new(db_path: impl AsRef<Path>) -> BotResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let path_clone = path.clone();

        task::spawn_blocking(move || {
            if let Some(parent) = path_clone.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(&path_clone)?;

            for collection in Collection::ALL {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {} (
                            id INTEGER PRIMARY KEY AUTOINCREMENT,
                            {} TEXT NOT NULL
                        );",
                        collection.table(),
                        collection.column()
                    ),
                    [],
                )?;
            }

            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS Files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    description TEXT NOT NULL,
                    channel_id TEXT NOT NULL,
                    interaction_id TEXT NOT NULL
                );
                "#,
                [],
            )?;

            Ok::<_, anyhow::Error>(())
        })
        .await
        .map_err(BotError::backend)?
        .map_err(BotError::backend)?;

        Ok(Self { db_path: path })
    }

    /// Run a blocking closure against a fresh connection
    async fn with_conn<T, F>(&self, f: F) -> BotResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(BotError::backend)?
        .map_err(BotError::backend)
    }
}

#[async_trait]
impl ListStore for SqliteStore {
    async fn add(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let entry = entry.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO {} ({}) VALUES (?1)", collection.table(), collection.column()),
                params![&entry],
            )?;
            Ok(())
        })
        .await
    }

    async fn list(&self, collection: Collection) -> BotResult<Vec<String>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} ORDER BY id ASC",
                collection.column(),
                collection.table()
            ))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }

    async fn remove(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let target = match RemoveTarget::parse(entry) {
            RemoveTarget::All => None,
            RemoveTarget::Exact(text) => Some(text.to_string()),
        };

        self.with_conn(move |conn| {
            match target {
                None => {
                    conn.execute(&format!("DELETE FROM {}", collection.table()), [])?;
                }
                Some(text) => {
                    let tx = conn.transaction()?;
                    let oldest: Option<i64> = tx
                        .query_row(
                            &format!(
                                "SELECT id FROM {} WHERE {} = ?1 ORDER BY id ASC LIMIT 1",
                                collection.table(),
                                collection.column()
                            ),
                            params![&text],
                            |row| row.get(0),
                        )
                        .optional()?;

                    if let Some(id) = oldest {
                        tx.execute(
                            &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
                            params![id],
                        )?;
                    }
                    tx.commit()?;
                }
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl FileIndex for SqliteStore {
    async fn save(&self, record: FileRecord) -> BotResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO Files (url, description, channel_id, interaction_id) VALUES (?1, ?2, ?3, ?4)",
                params![&record.url, &record.description, &record.origin_channel, &record.origin_interaction],
            )?;
            Ok(())
        })
        .await
    }

    // SQLite LIKE only folds ASCII case; matching happens on our side
    async fn find(&self, keyword: &str) -> BotResult<Vec<FileRecord>> {
        let records = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT url, description, channel_id, interaction_id
                     FROM Files
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(FileRecord {
                        url: row.get(0)?,
                        description: row.get(1)?,
                        origin_channel: row.get(2)?,
                        origin_interaction: row.get(3)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        Ok(records.into_iter().filter(|r| r.matches(keyword)).collect())
    }
}
