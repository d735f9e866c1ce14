use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Characters PostgREST needs escaped inside a filter value.
const FILTER_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@');

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl NetError {
    /// Transport-level failures are worth retrying on the next tick;
    /// rejections from the server are not.
    pub fn is_transient(&self) -> bool {
        match self {
            NetError::Request(e) => e.is_timeout() || e.is_connect(),
            NetError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub fn default_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("glory/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
}

/// Row filter, ordering and limit for a REST table call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        let encoded = utf8_percent_encode(value, FILTER_VALUE).to_string();
        self.pairs.push((column.to_string(), format!("eq.{encoded}")));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.pairs
            .push(("order".to_string(), format!("{column}.desc")));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.pairs.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Thin PostgREST client: `GET/POST/PATCH {base}/rest/v1/{table}`.
///
/// Every call asks for `return=representation`, so writes answer with the
/// stored rows.
pub struct RestClient {
    client: Client,
    base: Url,
    api_key: String,
    access_token: Mutex<Option<String>>,
}

impl RestClient {
    pub fn new(client: Client, base_url: &str, api_key: impl Into<String>) -> Result<Self, NetError> {
        let mut base =
            Url::parse(base_url).map_err(|e| NetError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(NetError::InvalidUrl(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
            access_token: Mutex::new(None),
        })
    }

    /// Bearer token of the signed-in user; `None` falls back to the api key.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn table_url(&self, table: &str, query: &Query) -> Result<Url, NetError> {
        let mut url = self
            .base
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| NetError::InvalidUrl(format!("{table}: {e}")))?;
        let qs = query.to_query_string();
        if !qs.is_empty() {
            url.set_query(Some(&qs));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.api_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .header("Prefer", "return=representation")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Vec<T>, NetError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| NetError::Decode(e.to_string()))
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, NetError> {
        let url = self.table_url(table, query)?;
        debug!("GET {}", url);
        self.send(self.request(Method::GET, url)).await
    }

    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<T>, NetError> {
        let url = self.table_url(table, &Query::new())?;
        debug!("POST {}", url);
        self.send(self.request(Method::POST, url).json(body)).await
    }

    pub async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>, NetError> {
        let url = self.table_url(table, query)?;
        debug!("PATCH {}", url);
        self.send(self.request(Method::PATCH, url).json(body)).await
    }
}
