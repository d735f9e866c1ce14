//! [`DocumentStore`] over a PostgREST endpoint.
//!
//! Rows in the CV table look like:
//!
//! ```json
//! { "id": "…", "user_id": "…", "name": "Amna Tariq", "template_id": "template1",
//!   "content": { …form fields…, "profileImage": { "media_type": "…", "data": "…" } },
//!   "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:05:00Z" }
//! ```
//!
//! Numeric ids are accepted and carried as strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glory_core::{RecordPayload, RemoteRecord, Scope, DEFAULT_TEMPLATE_ID};
use glory_infra::{default_http_client, Query, RestClient};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::RemoteSettings;
use crate::error::RemoteError;
use crate::ports::DocumentStore;

#[derive(Debug, Deserialize)]
struct CvRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    user_id: String,
    name: String,
    #[serde(default)]
    template_id: Option<String>,
    #[serde(default)]
    content: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CvRow> for RemoteRecord {
    fn from(row: CvRow) -> Self {
        RemoteRecord {
            id: row.id,
            owner_id: row.user_id,
            name: row.name,
            template_id: row
                .template_id
                .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string()),
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct CvRowWrite<'a> {
    user_id: &'a str,
    name: &'a str,
    template_id: &'a str,
    content: &'a Value,
}

impl<'a> From<&'a RecordPayload> for CvRowWrite<'a> {
    fn from(p: &'a RecordPayload) -> Self {
        Self {
            user_id: &p.owner_id,
            name: &p.name,
            template_id: &p.template_id,
            content: &p.content,
        }
    }
}

fn id_as_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(d)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

pub struct RestDocumentStore {
    client: RestClient,
    table: String,
}

impl RestDocumentStore {
    pub fn new(client: RestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        let http = default_http_client().map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        let client = RestClient::new(http, &settings.base_url, settings.api_key.clone())?;
        Ok(Self::new(client, settings.table.clone()))
    }

    /// Forward the signed-in user's token so row level security applies.
    pub fn set_access_token(&self, token: Option<String>) {
        self.client.set_access_token(token);
    }

    fn scoped(query: Query, scope: &Scope) -> Query {
        match scope {
            Scope::Owner(user_id) => query.eq("user_id", user_id),
            Scope::Any => query,
        }
    }

    fn single(rows: Vec<CvRow>, what: &str) -> Result<RemoteRecord, RemoteError> {
        rows.into_iter()
            .next()
            .map(RemoteRecord::from)
            .ok_or_else(|| RemoteError::Decode(format!("{what} returned no row")))
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn find_candidates_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Vec<RemoteRecord>, RemoteError> {
        let query = Query::new()
            .eq("user_id", owner_id)
            .eq("name", name)
            .order_desc("updated_at");
        let rows: Vec<CvRow> = self.client.select(&self.table, &query).await?;
        Ok(rows.into_iter().map(RemoteRecord::from).collect())
    }

    async fn create(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError> {
        let rows: Vec<CvRow> = self
            .client
            .insert(&self.table, &CvRowWrite::from(payload))
            .await?;
        Self::single(rows, "insert")
    }

    async fn update(
        &self,
        id: &str,
        payload: &RecordPayload,
        scope: &Scope,
    ) -> Result<RemoteRecord, RemoteError> {
        let query = Self::scoped(Query::new().eq("id", id), scope);
        let rows: Vec<CvRow> = self
            .client
            .update(&self.table, &query, &CvRowWrite::from(payload))
            .await?;
        rows.into_iter()
            .next()
            .map(RemoteRecord::from)
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                message: format!("CV {id} not found or not editable"),
            })
    }

    async fn get_by_id(
        &self,
        id: &str,
        scope: &Scope,
    ) -> Result<Option<RemoteRecord>, RemoteError> {
        let query = Self::scoped(Query::new().eq("id", id), scope).limit(1);
        let rows: Vec<CvRow> = self.client.select(&self.table, &query).await?;
        Ok(rows.into_iter().next().map(RemoteRecord::from))
    }
}
