//! Single-record operations, batch upserts keyed by business codes,
//! reference listings and health.
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::ai::AiService;
use crate::model::{
    BatchSummary, BatchUpsertResponse, ContactFields, ContactView, CustomerInput, HealthReport,
    HealthStatus, ItemResult, ProductFields, ProductUpsert, ProductView, RecordKind,
    RecordResponse, SyncAllSummary,
};
use crate::odoo::model::{Category, Country, Tax};
use crate::odoo::{
    resolve, Domain, ErpError, ErpService, Op, CATEGORY_MODEL, COUNTRY_MODEL, PARTNER_MODEL,
    PRODUCT_MODEL, TAX_MODEL,
};
use crate::sync::SyncEngine;
use crate::transform;

/// Failure of a synchronous, single-outcome operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to authenticate with Odoo: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    NotFound(String),
}

impl ServiceError {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Failed(_) => 1,
            ServiceError::Unavailable(_) => 3,
            ServiceError::NotFound(_) => 4,
        }
    }

    fn from_erp(context: &str, err: ErpError) -> Self {
        if err.is_auth() {
            ServiceError::Unavailable(err.to_string())
        } else {
            ServiceError::Failed(format!("{context}: {err}"))
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct SyncService {
    engine: SyncEngine,
    ai: AiService,
}

impl SyncService {
    pub fn new(engine: SyncEngine, ai: AiService) -> Self {
        Self { engine, ai }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn ai(&self) -> &AiService {
        &self.ai
    }

    fn erp(&self) -> &dyn ErpService {
        self.engine.erp()
    }

    async fn ensure_session(&self) -> ServiceResult<()> {
        self.erp()
            .ensure_session()
            .await
            .map(|_| ())
            .map_err(|err| ServiceError::Unavailable(err.to_string()))
    }

    pub async fn sync(&self, kind: RecordKind, only_pending: bool) -> BatchSummary {
        self.engine.sync(kind, only_pending).await
    }

    pub async fn sync_all(&self, only_pending: bool) -> SyncAllSummary {
        self.engine.sync_all(only_pending).await
    }

    #[instrument(skip_all)]
    pub async fn create_product(&self, fields: &ProductFields) -> ServiceResult<RecordResponse> {
        self.ensure_session().await?;
        let context = "Failed to create product";
        let vals = transform::product_vals(self.erp(), fields)
            .await
            .and_then(|vals| vals.to_value())
            .map_err(|err| ServiceError::Failed(format!("{context}: {err:#}")))?;
        let id = self
            .erp()
            .create(PRODUCT_MODEL, &vals)
            .await
            .map_err(|err| ServiceError::from_erp(context, err))?;
        let name = transform::product_name(fields).unwrap_or_default().to_string();
        info!(id, %name, "created product");
        Ok(RecordResponse {
            id,
            name,
            success: true,
            message: "Product created successfully in Odoo".into(),
        })
    }

    #[instrument(skip_all)]
    pub async fn create_contact(&self, fields: &ContactFields) -> ServiceResult<RecordResponse> {
        self.ensure_session().await?;
        let context = "Failed to create contact";
        let vals = transform::partner_vals(self.erp(), fields, self.engine.options())
            .await
            .and_then(|vals| vals.to_value())
            .map_err(|err| ServiceError::Failed(format!("{context}: {err:#}")))?;
        let id = self
            .erp()
            .create(PARTNER_MODEL, &vals)
            .await
            .map_err(|err| ServiceError::from_erp(context, err))?;
        let name = transform::partner_name(fields).unwrap_or_default().to_string();
        info!(id, %name, "created contact");
        Ok(RecordResponse {
            id,
            name,
            success: true,
            message: "Contact created successfully in Odoo".into(),
        })
    }

    async fn read_view<T: DeserializeOwned>(
        &self,
        model: &str,
        id: i64,
        fields: &[&str],
        label: &str,
    ) -> ServiceResult<T> {
        self.ensure_session().await?;
        let context = format!("Failed to fetch {}", label.to_lowercase());
        let row = self
            .erp()
            .read(model, id, fields)
            .await
            .map_err(|err| ServiceError::from_erp(&context, err))?
            .ok_or_else(|| ServiceError::NotFound(format!("{label} with ID {id} not found")))?;
        serde_json::from_value(row)
            .map_err(|err| ServiceError::Failed(format!("{context}: {err}")))
    }

    pub async fn get_product(&self, id: i64) -> ServiceResult<ProductView> {
        self.read_view(PRODUCT_MODEL, id, ProductView::FIELDS, "Product")
            .await
    }

    pub async fn get_contact(&self, id: i64) -> ServiceResult<ContactView> {
        self.read_view(PARTNER_MODEL, id, ContactView::FIELDS, "Contact")
            .await
    }

    /// Create or update each product, matched on its internal reference.
    #[instrument(skip_all, fields(count = items.len(), generate_ai = generate_ai))]
    pub async fn upsert_products(
        &self,
        items: &[ProductUpsert],
        generate_ai: bool,
    ) -> ServiceResult<BatchUpsertResponse> {
        self.ensure_session().await?;
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = match self.upsert_product(item, generate_ai).await {
                Ok(result) => result,
                Err(err) => ItemResult {
                    success: false,
                    id: None,
                    message: format!("{err:#}"),
                },
            };
            results.push(result);
        }
        Ok(BatchUpsertResponse {
            success: results.iter().all(|r| r.success),
            results,
        })
    }

    async fn upsert_product(
        &self,
        item: &ProductUpsert,
        generate_ai: bool,
    ) -> anyhow::Result<ItemResult> {
        let mut fields = item.fields.clone();
        if fields.product_name.is_none() && generate_ai {
            if let Some(code) = fields.internal_ref.as_deref() {
                let machine = item.machine_name.as_deref().unwrap_or("Machine");
                let name = self
                    .ai
                    .generate_product_name(code, machine, item.size.as_deref())
                    .await;
                fields.product_name = Some(name);
            }
        }

        let vals = transform::product_vals(self.erp(), &fields).await?.to_value()?;
        let existing = match fields.internal_ref.as_deref() {
            Some(code) => resolve::find_product_by_code(self.erp(), code).await?,
            None => None,
        };
        upsert(self.erp(), PRODUCT_MODEL, existing, &vals).await
    }

    /// Create or update each customer company, matched on its GST number.
    #[instrument(skip_all, fields(count = items.len()))]
    pub async fn upsert_customers(
        &self,
        items: &[CustomerInput],
    ) -> ServiceResult<BatchUpsertResponse> {
        self.ensure_session().await?;
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = match self.upsert_customer(item).await {
                Ok(result) => result,
                Err(err) => ItemResult {
                    success: false,
                    id: None,
                    message: format!("{err:#}"),
                },
            };
            results.push(result);
        }
        Ok(BatchUpsertResponse {
            success: results.iter().all(|r| r.success),
            results,
        })
    }

    async fn upsert_customer(&self, item: &CustomerInput) -> anyhow::Result<ItemResult> {
        let fields = customer_fields(item);
        let vals = transform::partner_vals(self.erp(), &fields, self.engine.options())
            .await?
            .to_value()?;
        let existing = match fields.gst_number.as_deref() {
            Some(vat) => resolve::find_partner_by_vat(self.erp(), vat).await?,
            None => None,
        };
        upsert(self.erp(), PARTNER_MODEL, existing, &vals).await
    }

    async fn list_reference<T: DeserializeOwned>(
        &self,
        model: &str,
        domain: Domain,
        fields: &[&str],
    ) -> ServiceResult<Vec<T>> {
        self.ensure_session().await?;
        let context = format!("Failed to list {model}");
        let rows = self
            .erp()
            .search_read(model, &domain, fields, None)
            .await
            .map_err(|err| ServiceError::from_erp(&context, err))?;
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|err| ServiceError::Failed(format!("{context}: {err}")))
    }

    pub async fn categories(&self) -> ServiceResult<Vec<Category>> {
        self.list_reference(CATEGORY_MODEL, Domain::new(), Category::FIELDS)
            .await
    }

    /// Sales taxes only.
    pub async fn taxes(&self) -> ServiceResult<Vec<Tax>> {
        let domain = Domain::new().and("type_tax_use", Op::Eq, "sale");
        self.list_reference(TAX_MODEL, domain, Tax::FIELDS).await
    }

    pub async fn countries(&self) -> ServiceResult<Vec<Country>> {
        self.list_reference(COUNTRY_MODEL, Domain::new(), Country::FIELDS)
            .await
    }

    pub async fn health(&self) -> HealthReport {
        let odoo = match self.erp().ensure_session().await {
            Ok(_) => true,
            Err(err) => {
                warn!(%err, "Odoo health check failed");
                false
            }
        };
        let odoo_server_version = match self.erp().server_version().await {
            Ok(version) => version,
            Err(err) => {
                warn!(%err, "could not read Odoo server version");
                None
            }
        };
        let nocodb = self.engine.store().check_connection().await;
        HealthReport {
            status: if odoo && nocodb {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            odoo,
            nocodb,
            version: env!("CARGO_PKG_VERSION").to_string(),
            odoo_server_version,
        }
    }
}

/// Write to `existing` when there is one, else create.
async fn upsert(
    erp: &dyn ErpService,
    model: &str,
    existing: Option<i64>,
    vals: &serde_json::Value,
) -> anyhow::Result<ItemResult> {
    let (id, message) = match existing {
        Some(id) => {
            erp.write(model, id, vals).await?;
            (id, "Updated")
        }
        None => (erp.create(model, vals).await?, "Created"),
    };
    Ok(ItemResult {
        success: true,
        id: Some(id),
        message: message.into(),
    })
}

/// Customers are companies with a customer rank.
fn customer_fields(item: &CustomerInput) -> ContactFields {
    ContactFields {
        company_name: Some(item.company_name.clone()),
        email: item.email.clone(),
        phone: item.phone.clone(),
        mobile: item.mobile.clone(),
        street: item.address_line_1.clone(),
        street2: item.address_line_2.clone(),
        city: item.city.clone(),
        state: item.state.clone(),
        zip: item.pincode.clone(),
        gst_number: item.gst_number.clone(),
        pan: item.pan.clone(),
        is_customer: true,
        ..Default::default()
    }
}
