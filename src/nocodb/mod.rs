use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{Config, Tables};
use crate::model::{RecordKind, SyncStatus};
use crate::nocodb::model::ListPage;

pub mod model;

/// The spreadsheet-side operations the syncer relies on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows of a table (paging is internal), or only those still pending.
    async fn list(&self, kind: RecordKind, only_pending: bool) -> Result<Vec<Value>>;

    async fn create(&self, kind: RecordKind, fields: &Value) -> Result<Value>;

    async fn update(&self, kind: RecordKind, id: i64, fields: &Value) -> Result<()>;

    /// Whether the store answers and the configured base is reachable.
    async fn check_connection(&self) -> bool;
}

/// Keep rows whose `sync_status` is null, empty or pending.
pub fn pending_only(rows: Vec<Value>) -> Vec<Value> {
    rows.into_iter()
        .filter(|row| SyncStatus::is_pending_value(row.get("sync_status")))
        .collect()
}

/// REST client for NocoDB's v2 data API.
#[derive(Clone)]
pub struct NocoClient {
    http: Client,
    base_url: Url,
    api_token: String,
    base_id: String,
    tables: Tables,
    page_size: u32,
}

impl fmt::Debug for NocoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NocoClient")
            .field("base_url", &self.base_url)
            .field("base_id", &self.base_id)
            .finish_non_exhaustive()
    }
}

impl NocoClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.nocodb.url)
            .with_context(|| format!("invalid nocodb.url: {}", cfg.nocodb.url))?;
        Self::with_base_url(
            base_url,
            cfg.nocodb.api_token.clone(),
            cfg.nocodb.base_id.clone(),
            cfg.nocodb.tables.clone(),
            cfg.nocodb.page_size,
        )
    }

    pub fn with_base_url(
        base_url: Url,
        api_token: String,
        base_id: String,
        tables: Tables,
        page_size: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("noco-odoo-sync/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_token,
            base_id,
            tables,
            page_size: page_size.max(1),
        })
    }

    fn table_id(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Product => &self.tables.products,
            RecordKind::Contact => &self.tables.contacts,
        }
    }

    fn records_url(&self, table: &str) -> Result<Url> {
        self.base_url
            .join(&format!("api/v2/tables/{}/records", table))
            .context("invalid NocoDB base URL")
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, url)
            .header("xc-token", &self.api_token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build NocoDB request")
    }

    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        debug!(method=%request.method(), url=%request.url(), "sending nocodb request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach NocoDB")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "NocoDB API error");
            return Err(anyhow!("nocodb error {}: {}", status, body));
        }
        Ok(res)
    }

    /// One page of rows.
    pub async fn list_page(&self, table: &str, limit: u32, offset: u32) -> Result<ListPage> {
        let mut url = self.records_url(table)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let request = self.build_request(Method::GET, url, None)?;
        let res = self.send(request).await?;
        res.json::<ListPage>()
            .await
            .with_context(|| format!("invalid list response for table {table}"))
    }

    /// Every row of `table`, following pages until a short or last page.
    pub async fn list_all(&self, table: &str) -> Result<Vec<Value>> {
        let mut rows = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self.list_page(table, self.page_size, offset).await?;
            let last = page.is_last(self.page_size);
            let fetched = page.list.len() as u32;
            rows.extend(page.list);
            if last || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        debug!(table, count = rows.len(), "listed nocodb rows");
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for NocoClient {
    async fn list(&self, kind: RecordKind, only_pending: bool) -> Result<Vec<Value>> {
        let rows = self.list_all(self.table_id(kind)).await?;
        Ok(if only_pending { pending_only(rows) } else { rows })
    }

    async fn create(&self, kind: RecordKind, fields: &Value) -> Result<Value> {
        let table = self.table_id(kind);
        let request = self.build_request(Method::POST, self.records_url(table)?, Some(fields))?;
        let res = self.send(request).await?;
        let created: Value = res.json().await.context("invalid create response")?;
        info!(table, "created nocodb row");
        Ok(created)
    }

    async fn update(&self, kind: RecordKind, id: i64, fields: &Value) -> Result<()> {
        let table = self.table_id(kind);
        let mut body = match fields {
            Value::Object(map) => map.clone(),
            other => return Err(anyhow!("update fields must be an object, got {other}")),
        };
        // v2 identifies the row by `Id` inside the body.
        body.insert("Id".into(), Value::from(id));
        let body = Value::Object(body);
        let request = self.build_request(Method::PATCH, self.records_url(table)?, Some(&body))?;
        self.send(request).await?;
        debug!(table, id, "updated nocodb row");
        Ok(())
    }

    async fn check_connection(&self) -> bool {
        let url = match self
            .base_url
            .join(&format!("api/v2/meta/bases/{}", self.base_id))
        {
            Ok(url) => url,
            Err(err) => {
                warn!(?err, "invalid NocoDB base URL");
                return false;
            }
        };
        let request = match self.build_request(Method::GET, url, None) {
            Ok(request) => request,
            Err(err) => {
                warn!(?err, "failed to build NocoDB health request");
                return false;
            }
        };
        match self.send(request).await {
            Ok(_) => true,
            Err(err) => {
                warn!(?err, "NocoDB connection check failed");
                false
            }
        }
    }
}
