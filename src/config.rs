//! Configuration loader and validator for the NocoDB→Odoo syncer.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub odoo: Odoo,
    pub nocodb: NocoDb,
    #[serde(default)]
    pub ai: Ai,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub poll_interval_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_brand")]
    pub brand: String,
}

/// Odoo connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Odoo {
    pub url: String,
    pub db: String,
    pub username: String,
    pub api_key: String,
    /// Country used to narrow state lookups when a contact has none.
    #[serde(default)]
    pub default_country: Option<String>,
}

/// NocoDB connection settings and table mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NocoDb {
    pub url: String,
    pub api_token: String,
    pub base_id: String,
    pub tables: Tables,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Table ids (or names) for the synced tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tables {
    pub products: String,
    pub contacts: String,
}

/// Optional Gemini settings. An empty key disables generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ai {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: default_ai_model(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_brand() -> String {
    "UniPack".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_ai_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Ai {
    pub fn enabled(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// Secrets may live in the environment instead of the file.
fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(v) = non_empty("ODOO_API_KEY") {
        cfg.odoo.api_key = v;
    }
    if let Some(v) = non_empty("NOCODB_API_TOKEN") {
        cfg.nocodb.api_token = v;
    }
    if let Some(v) = non_empty("GEMINI_API_KEY") {
        cfg.ai.gemini_api_key = v;
    }
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }
    if cfg.app.concurrency == 0 || cfg.app.concurrency > 64 {
        return Err(ConfigError::Invalid("app.concurrency must be in 1..=64"));
    }

    if cfg.odoo.url.trim().is_empty() {
        return Err(ConfigError::Invalid("odoo.url must be non-empty"));
    }
    if cfg.odoo.db.trim().is_empty() {
        return Err(ConfigError::Invalid("odoo.db must be non-empty"));
    }
    if cfg.odoo.username.trim().is_empty() {
        return Err(ConfigError::Invalid("odoo.username must be non-empty"));
    }
    if cfg.odoo.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("odoo.api_key must be non-empty"));
    }

    if cfg.nocodb.url.trim().is_empty() {
        return Err(ConfigError::Invalid("nocodb.url must be non-empty"));
    }
    if cfg.nocodb.api_token.trim().is_empty() {
        return Err(ConfigError::Invalid("nocodb.api_token must be non-empty"));
    }
    if cfg.nocodb.base_id.trim().is_empty() {
        return Err(ConfigError::Invalid("nocodb.base_id must be non-empty"));
    }
    if cfg.nocodb.tables.products.trim().is_empty() {
        return Err(ConfigError::Invalid("nocodb.tables.products must be non-empty"));
    }
    if cfg.nocodb.tables.contacts.trim().is_empty() {
        return Err(ConfigError::Invalid("nocodb.tables.contacts must be non-empty"));
    }
    if cfg.nocodb.page_size == 0 || cfg.nocodb.page_size > 1000 {
        return Err(ConfigError::Invalid("nocodb.page_size must be in 1..=1000"));
    }

    if cfg.ai.model.trim().is_empty() {
        return Err(ConfigError::Invalid("ai.model must be non-empty"));
    }

    Ok(())
}

/// Returns an example YAML document covering every setting.
pub fn example() -> &'static str {
    r#"app:
  poll_interval_ms: 60000
  concurrency: 10
  brand: "UniPack"

odoo:
  url: "https://erp.example.com"
  db: "example"
  username: "sync@example.com"
  api_key: "YOUR_ODOO_API_KEY"
  default_country: "India"

nocodb:
  url: "https://noco.example.com"
  api_token: "YOUR_NOCODB_API_TOKEN"
  base_id: "NOCODB_BASE_ID"
  tables:
    products: "Products"
    contacts: "Contacts"
  page_size: 100

ai:
  gemini_api_key: ""
  model: "gemini-2.0-flash"
"#
}
