use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::odoo::model::{RpcParams, RpcRequest, RpcResponse};

pub mod domain;
pub mod model;
pub mod resolve;

pub use domain::{Domain, Op};

pub const PRODUCT_MODEL: &str = "product.template";
pub const PARTNER_MODEL: &str = "res.partner";
pub const CATEGORY_MODEL: &str = "product.category";
pub const PARTNER_TAG_MODEL: &str = "res.partner.category";
pub const TAX_MODEL: &str = "account.tax";
pub const COUNTRY_MODEL: &str = "res.country";
pub const STATE_MODEL: &str = "res.country.state";

#[derive(Debug, Error)]
pub enum ErpError {
    #[error("Odoo authentication failed: {0}")]
    Auth(String),
    #[error("failed to reach Odoo: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Odoo HTTP error {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("Odoo error: {0}")]
    Fault(String),
    #[error("unexpected Odoo response: {0}")]
    Protocol(String),
}

impl ErpError {
    /// Whether the session could not be established (as opposed to a
    /// failure of one particular call).
    pub fn is_auth(&self) -> bool {
        matches!(self, ErpError::Auth(_))
    }
}

/// The ERP operations the syncer relies on. `OdooClient` is the real
/// implementation; tests substitute in-memory fakes.
#[async_trait]
pub trait ErpService: Send + Sync {
    /// Return the authenticated uid, logging in on first use.
    async fn ensure_session(&self) -> Result<i64, ErpError>;

    async fn search(
        &self,
        model: &str,
        domain: &Domain,
        limit: Option<u32>,
    ) -> Result<Vec<i64>, ErpError>;

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ErpError>;

    async fn create(&self, model: &str, vals: &Value) -> Result<i64, ErpError>;

    async fn write(&self, model: &str, id: i64, vals: &Value) -> Result<(), ErpError>;

    /// Read one record by id; `None` when it does not exist.
    async fn read(&self, model: &str, id: i64, fields: &[&str]) -> Result<Option<Value>, ErpError> {
        let rows = self
            .search_read(model, &Domain::eq("id", id), fields, Some(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Server version string, when the backend reports one.
    async fn server_version(&self) -> Result<Option<String>, ErpError> {
        Ok(None)
    }
}

/// JSON-RPC client for Odoo's `/jsonrpc` endpoint.
pub struct OdooClient {
    http: Client,
    endpoint: Url,
    db: String,
    username: String,
    api_key: String,
    uid: OnceCell<i64>,
    next_id: AtomicU64,
}

impl fmt::Debug for OdooClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooClient")
            .field("endpoint", &self.endpoint)
            .field("db", &self.db)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl OdooClient {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = Url::parse(&cfg.odoo.url)
            .with_context(|| format!("invalid odoo.url: {}", cfg.odoo.url))?;
        Self::with_base_url(
            base_url,
            cfg.odoo.db.clone(),
            cfg.odoo.username.clone(),
            cfg.odoo.api_key.clone(),
        )
    }

    pub fn with_base_url(
        base_url: Url,
        db: String,
        username: String,
        api_key: String,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("noco-odoo-sync/0.1")
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        let endpoint = base_url
            .join("jsonrpc")
            .context("invalid Odoo base URL")?;
        Ok(Self {
            http,
            endpoint,
            db,
            username,
            api_key,
            uid: OnceCell::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request, ErpError> {
        Ok(self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(body)
            .build()?)
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, ErpError> {
        let envelope = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let body = serde_json::to_value(&envelope)
            .map_err(|e| ErpError::Protocol(format!("unserializable request: {e}")))?;
        let request = self.build_request(&body)?;
        debug!(url=%request.url(), service, method, "sending odoo request");

        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Odoo HTTP error");
            return Err(ErpError::Http { status, body });
        }

        let payload: RpcResponse = res
            .json()
            .await
            .map_err(|e| ErpError::Protocol(format!("invalid JSON-RPC body: {e}")))?;
        if let Some(err) = payload.error {
            if err.exception_name().ends_with("AccessDenied") {
                return Err(ErpError::Auth(err.detail()));
            }
            return Err(ErpError::Fault(err.detail()));
        }
        Ok(payload.result.unwrap_or(Value::Null))
    }

    /// Log in and return the uid. Odoo answers `false` for bad credentials.
    pub async fn authenticate(&self) -> Result<i64, ErpError> {
        let result = self
            .call(
                "common",
                "authenticate",
                json!([self.db, self.username, self.api_key, {}]),
            )
            .await?;
        match result.as_i64() {
            Some(uid) if uid > 0 => {
                info!(uid, db = %self.db, "authenticated with Odoo");
                Ok(uid)
            }
            _ => Err(ErpError::Auth(format!(
                "invalid credentials for {} on {}",
                self.username, self.db
            ))),
        }
    }

    /// Server version info; used by health checks.
    pub async fn version(&self) -> Result<Value, ErpError> {
        self.call("common", "version", json!([])).await
    }

    /// `execute_kw` against the object service.
    pub async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, ErpError> {
        let uid = self.ensure_session().await?;
        self.call(
            "object",
            "execute_kw",
            json!([self.db, uid, self.api_key, model, method, args, kwargs]),
        )
        .await
    }
}

fn limit_kwargs(limit: Option<u32>) -> serde_json::Map<String, Value> {
    let mut kwargs = serde_json::Map::new();
    if let Some(limit) = limit {
        kwargs.insert("limit".into(), json!(limit));
    }
    kwargs
}

#[async_trait]
impl ErpService for OdooClient {
    async fn ensure_session(&self) -> Result<i64, ErpError> {
        self.uid
            .get_or_try_init(|| self.authenticate())
            .await
            .copied()
    }

    async fn search(
        &self,
        model: &str,
        domain: &Domain,
        limit: Option<u32>,
    ) -> Result<Vec<i64>, ErpError> {
        let result = self
            .execute(model, "search", json!([domain]), Value::Object(limit_kwargs(limit)))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ErpError::Protocol(format!("search on {model} returned non-ids: {e}")))
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ErpError> {
        let mut kwargs = limit_kwargs(limit);
        kwargs.insert("fields".into(), json!(fields));
        let result = self
            .execute(model, "search_read", json!([domain]), Value::Object(kwargs))
            .await?;
        match result {
            Value::Array(rows) => Ok(rows),
            other => Err(ErpError::Protocol(format!(
                "search_read on {model} returned {other}"
            ))),
        }
    }

    async fn create(&self, model: &str, vals: &Value) -> Result<i64, ErpError> {
        let result = self.execute(model, "create", json!([vals]), json!({})).await?;
        // Newer servers answer batch-style with a list of ids.
        let id = match &result {
            Value::Array(ids) => ids.first().and_then(Value::as_i64),
            other => other.as_i64(),
        };
        id.ok_or_else(|| ErpError::Protocol(format!("create on {model} returned {result}")))
    }

    async fn write(&self, model: &str, id: i64, vals: &Value) -> Result<(), ErpError> {
        let result = self
            .execute(model, "write", json!([[id], vals]), json!({}))
            .await?;
        if result == Value::Bool(true) {
            Ok(())
        } else {
            Err(ErpError::Fault(format!(
                "write on {model} #{id} was not acknowledged: {result}"
            )))
        }
    }

    async fn server_version(&self) -> Result<Option<String>, ErpError> {
        let info = self.version().await?;
        Ok(info
            .get("server_version")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
