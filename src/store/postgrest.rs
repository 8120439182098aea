//! Supabase (PostgREST) Store
//!
//! Remote relational backend. Every operation is one or two HTTP requests
//! against `{url}/rest/v1/{table}`; any transport error or non-2xx status
//! surfaces as `BackendUnavailable`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Collection, FileIndex, FileRecord, ListStore, RemoveTarget};
use crate::error::{BotError, BotResult};

const FILES_TABLE: &str = "Files";
const FILE_COLUMNS: &str = "url,description,channel_id,interaction_id";

#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Deserialize)]
struct FileRow {
    url: String,
    description: String,
    channel_id: String,
    interaction_id: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            url: row.url,
            description: row.description,
            origin_channel: row.channel_id,
            origin_interaction: row.interaction_id,
        }
    }
}

impl PostgrestStore {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> BotResult<Response> {
        let resp = self.authorized(request).send().await.map_err(BotError::backend)?;
        resp.error_for_status().map_err(BotError::backend)
    }

    async fn insert(&self, table: &str, row: Value) -> BotResult<()> {
        debug!("POST {} {}", table, row);
        self.send(
            self.client
                .post(self.table_url(table))
                .header("Prefer", "return=minimal")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    async fn select<T: for<'de> Deserialize<'de>>(&self, table: &str, query: &[(&str, String)]) -> BotResult<Vec<T>> {
        let resp = self.send(self.client.get(self.table_url(table)).query(query)).await?;
        resp.json().await.map_err(BotError::backend)
    }

    async fn delete(&self, table: &str, query: &[(&str, String)]) -> BotResult<()> {
        self.send(self.client.delete(self.table_url(table)).query(query)).await?;
        Ok(())
    }
}

/// `ilike` pattern selecting a superset of the rows containing `keyword`.
///
/// `*` is the PostgREST wildcard and cannot be escaped, so the keyword is
/// split on it and each fragment is escaped for `ILIKE`.
fn ilike_filter(keyword: &str) -> String {
    let fragments: Vec<String> = keyword.split('*').map(escape_like).collect();
    format!("ilike.*{}*", fragments.join("*"))
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ListStore for PostgrestStore {
    async fn add(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let mut row = Map::new();
        row.insert(collection.column().to_string(), Value::String(entry.to_string()));
        self.insert(collection.table(), Value::Object(row)).await
    }

    async fn list(&self, collection: Collection) -> BotResult<Vec<String>> {
        let column = collection.column();
        let rows: Vec<Map<String, Value>> = self
            .select(
                collection.table(),
                &[("select", column.to_string()), ("order", "id.asc".to_string())],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    async fn remove(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let column = collection.column();
        match RemoveTarget::parse(entry) {
            // PostgREST refuses an unfiltered DELETE
            RemoveTarget::All => {
                self.delete(collection.table(), &[(column, "not.is.null".to_string())]).await
            }
            RemoveTarget::Exact(text) => {
                let oldest: Vec<IdRow> = self
                    .select(
                        collection.table(),
                        &[
                            ("select", "id".to_string()),
                            (column, format!("eq.{}", text)),
                            ("order", "id.asc".to_string()),
                            ("limit", "1".to_string()),
                        ],
                    )
                    .await?;

                match oldest.first() {
                    Some(row) => self.delete(collection.table(), &[("id", format!("eq.{}", row.id))]).await,
                    None => Ok(()),
                }
            }
        }
    }
}

#[async_trait]
impl FileIndex for PostgrestStore {
    async fn save(&self, record: FileRecord) -> BotResult<()> {
        self.insert(
            FILES_TABLE,
            json!({
                "url": record.url,
                "description": record.description,
                "channel_id": record.origin_channel,
                "interaction_id": record.origin_interaction,
            }),
        )
        .await
    }

    async fn find(&self, keyword: &str) -> BotResult<Vec<FileRecord>> {
        let rows: Vec<FileRow> = self
            .select(
                FILES_TABLE,
                &[
                    ("select", FILE_COLUMNS.to_string()),
                    ("description", ilike_filter(keyword)),
                    ("order", "id.asc".to_string()),
                ],
            )
            .await?;

        // The server-side filter is only a pre-selection
        Ok(rows
            .into_iter()
            .map(FileRecord::from)
            .filter(|r| r.matches(keyword))
            .collect())
    }
}
