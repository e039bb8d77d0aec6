use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::de;

/// The two synced tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Product,
    Contact,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Product => "product",
            RecordKind::Contact => "contact",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            RecordKind::Product => "products",
            RecordKind::Contact => "contacts",
        }
    }
}

/// Values written to the `sync_status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }

    /// Whether a raw `sync_status` cell still needs pushing: null, empty or
    /// `pending` in any letter case.
    pub fn is_pending_value(raw: Option<&Value>) -> bool {
        match raw {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case(SyncStatus::Pending.as_str())
            }
            Some(_) => false,
        }
    }
}

/// Business fields of a product row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductFields {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub sales_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub cost: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub internal_ref: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub hsn_code: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub sales_tax: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub barcode: Option<String>,
}

/// A Products row as stored in NocoDB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub odoo_id: Option<i64>,
    #[serde(flatten)]
    pub fields: ProductFields,
}

/// Business fields of a contact row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactFields {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub street2: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub gst_number: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub pan: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_customer: bool,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_vendor: bool,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub tags: Option<String>,
}

/// A Contacts row as stored in NocoDB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactRecord {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub odoo_id: Option<i64>,
    #[serde(flatten)]
    pub fields: ContactFields,
}

/// Result of reconciling one record. Never persisted as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { odoo_id: i64 },
    Updated { odoo_id: i64 },
    Errored(String),
}

impl SyncOutcome {
    /// The Odoo id the row is now linked to, when the push succeeded.
    pub fn odoo_id(&self) -> Option<i64> {
        match self {
            SyncOutcome::Created { odoo_id } | SyncOutcome::Updated { odoo_id } => Some(*odoo_id),
            SyncOutcome::Errored(_) => None,
        }
    }
}

/// Columns the reconciler writes back to the source row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncWriteBack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odoo_id: Option<i64>,
    pub sync_status: SyncStatus,
    pub last_synced: DateTime<Utc>,
}

impl SyncWriteBack {
    pub fn synced(odoo_id: i64) -> Self {
        Self {
            odoo_id: Some(odoo_id),
            sync_status: SyncStatus::Synced,
            last_synced: Utc::now(),
        }
    }

    pub fn errored() -> Self {
        Self {
            odoo_id: None,
            sync_status: SyncStatus::Error,
            last_synced: Utc::now(),
        }
    }
}

/// Aggregate of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub success: bool,
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
    pub message: String,
}

impl BatchSummary {
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            created: 0,
            updated: 0,
            message: error.clone(),
            errors: vec![error],
        }
    }
}

/// Products followed by contacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncAllSummary {
    pub success: bool,
    pub products: BatchSummary,
    pub contacts: BatchSummary,
}

/// Response to a single-record create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordResponse {
    pub id: i64,
    pub name: String,
    pub success: bool,
    pub message: String,
}

/// Per-item result of a batch upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemResult {
    pub success: bool,
    pub id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchUpsertResponse {
    pub success: bool,
    pub results: Vec<ItemResult>,
}

/// Product as read back from Odoo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "list_price", default)]
    pub price: f64,
    #[serde(rename = "standard_price", default)]
    pub cost: f64,
    #[serde(rename = "default_code", default, deserialize_with = "de::odoo_string")]
    pub internal_ref: Option<String>,
    #[serde(rename = "categ_id", default, deserialize_with = "de::many2one_name")]
    pub category: Option<String>,
    #[serde(rename = "description_sale", default, deserialize_with = "de::odoo_string")]
    pub description: Option<String>,
}

impl ProductView {
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "list_price",
        "standard_price",
        "default_code",
        "categ_id",
        "description_sale",
    ];
}

/// Partner as read back from Odoo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactView {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "de::odoo_string")]
    pub city: Option<String>,
    #[serde(rename = "state_id", default, deserialize_with = "de::many2one_name")]
    pub state: Option<String>,
    #[serde(rename = "country_id", default, deserialize_with = "de::many2one_name")]
    pub country: Option<String>,
    #[serde(default)]
    pub is_company: bool,
    #[serde(default)]
    pub customer_rank: i64,
    #[serde(rename = "supplier_rank", default)]
    pub vendor_rank: i64,
}

impl ContactView {
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "email",
        "phone",
        "mobile",
        "street",
        "city",
        "state_id",
        "country_id",
        "is_company",
        "customer_rank",
        "supplier_rank",
    ];

    pub fn is_customer(&self) -> bool {
        self.customer_rank > 0
    }

    pub fn is_vendor(&self) -> bool {
        self.vendor_rank > 0
    }
}

/// Customer row for the GST-keyed batch upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerInput {
    pub company_name: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub address_line_1: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub address_line_2: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub gst_number: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub pan: Option<String>,
}

/// Product row for the code-keyed batch upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductUpsert {
    #[serde(flatten)]
    pub fields: ProductFields,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub machine_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub odoo: bool,
    pub nocodb: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odoo_server_version: Option<String>,
}
