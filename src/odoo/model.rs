use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::de;

/// JSON-RPC 2.0 envelope posted to `/jsonrpc`.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: RpcParams<'a>,
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct RpcParams<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub args: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

impl RpcError {
    /// Server-side exception class, e.g. `odoo.exceptions.AccessDenied`.
    pub fn exception_name(&self) -> &str {
        self.data.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }

    /// The most specific message available.
    pub fn detail(&self) -> String {
        match &self.data {
            Some(d) if !d.message.is_empty() => d.message.clone(),
            _ => format!("{} (code {})", self.message, self.code),
        }
    }
}

/// Product category reference row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub complete_name: Option<String>,
}

impl Category {
    pub const FIELDS: &'static [&'static str] = &["id", "name", "complete_name"];
}

/// Sales tax reference row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tax {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
}

impl Tax {
    pub const FIELDS: &'static [&'static str] = &["id", "name", "amount"];
}

/// Country reference row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Country {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub code: Option<String>,
}

impl Country {
    pub const FIELDS: &'static [&'static str] = &["id", "name", "code"];
}
