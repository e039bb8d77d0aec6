//! The reconciliation engine: one external row in, exactly one Odoo create
//! or write out, then the linkage and status written back to the row.
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use tracing::{error, info, instrument, warn};

use crate::model::{ContactRecord, ProductRecord, RecordKind, SyncOutcome, SyncWriteBack};
use crate::nocodb::RecordStore;
use crate::odoo::{resolve, ErpError, ErpService, PARTNER_MODEL, PRODUCT_MODEL};
use crate::transform::{self, TransformOptions};

/// Run a secondary operation whose failure must not affect the caller.
/// Errors are logged at `warn` and turned into `None`; nothing is rethrown.
pub async fn best_effort<T, E, F>(what: &str, fut: F) -> Option<T>
where
    E: Display,
    F: Future<Output = std::result::Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%err, what, "best-effort step failed; continuing without it");
            None
        }
    }
}

/// A row kind the engine knows how to push into Odoo.
#[async_trait]
pub trait SyncEntity: DeserializeOwned + Send + Sync {
    const KIND: RecordKind;
    const MODEL: &'static str;

    /// Source-side `Id`.
    fn row_id(&self) -> i64;

    fn odoo_id(&self) -> Option<i64>;

    /// Human label used in logs and error messages.
    fn label(&self) -> String;

    /// Natural-key lookup for rows not linked yet.
    async fn find_match(&self, erp: &dyn ErpService) -> Result<Option<i64>, ErpError>;

    /// Odoo write payload.
    async fn vals(&self, erp: &dyn ErpService, opts: &TransformOptions) -> Result<Value>;
}

#[async_trait]
impl SyncEntity for ProductRecord {
    const KIND: RecordKind = RecordKind::Product;
    const MODEL: &'static str = PRODUCT_MODEL;

    fn row_id(&self) -> i64 {
        self.id
    }

    fn odoo_id(&self) -> Option<i64> {
        self.odoo_id
    }

    fn label(&self) -> String {
        transform::product_name(&self.fields)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    async fn find_match(&self, erp: &dyn ErpService) -> Result<Option<i64>, ErpError> {
        match transform::product_name(&self.fields) {
            Some(name) => resolve::find_product_by_name(erp, name).await,
            None => Ok(None),
        }
    }

    async fn vals(&self, erp: &dyn ErpService, _opts: &TransformOptions) -> Result<Value> {
        transform::product_vals(erp, &self.fields).await?.to_value()
    }
}

#[async_trait]
impl SyncEntity for ContactRecord {
    const KIND: RecordKind = RecordKind::Contact;
    const MODEL: &'static str = PARTNER_MODEL;

    fn row_id(&self) -> i64 {
        self.id
    }

    fn odoo_id(&self) -> Option<i64> {
        self.odoo_id
    }

    fn label(&self) -> String {
        transform::partner_name(&self.fields)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    async fn find_match(&self, erp: &dyn ErpService) -> Result<Option<i64>, ErpError> {
        if let Some(email) = self.fields.email.as_deref() {
            if let Some(id) = resolve::find_partner_by_email(erp, email).await? {
                return Ok(Some(id));
            }
        }
        // company name only stands in when the row has no name
        let name = self.fields.name.as_deref();
        match name.or(self.fields.company_name.as_deref()) {
            Some(name) => resolve::find_partner_by_name(erp, name).await,
            None => Ok(None),
        }
    }

    async fn vals(&self, erp: &dyn ErpService, opts: &TransformOptions) -> Result<Value> {
        transform::partner_vals(erp, &self.fields, opts).await?.to_value()
    }
}

/// Issue the single create-or-write for `record`. Nothing is written back.
async fn push<E: SyncEntity>(
    erp: &dyn ErpService,
    opts: &TransformOptions,
    record: &E,
) -> Result<SyncOutcome> {
    let vals = record.vals(erp, opts).await?;
    // An existing link is authoritative; no existence check before writing.
    let target = match record.odoo_id() {
        Some(id) => Some(id),
        None => record.find_match(erp).await?,
    };
    Ok(match target {
        Some(odoo_id) => {
            erp.write(E::MODEL, odoo_id, &vals).await?;
            SyncOutcome::Updated { odoo_id }
        }
        None => {
            let odoo_id = erp.create(E::MODEL, &vals).await?;
            SyncOutcome::Created { odoo_id }
        }
    })
}

/// Reconcile one row. Errors never escape: they come back as
/// `SyncOutcome::Errored` after the row has been marked `error`.
#[instrument(skip_all, fields(kind = E::KIND.as_str(), row = record.row_id()))]
pub async fn reconcile<E: SyncEntity>(
    erp: &dyn ErpService,
    store: &dyn RecordStore,
    opts: &TransformOptions,
    record: &E,
) -> SyncOutcome {
    match push(erp, opts, record).await {
        Ok(outcome) => {
            let Some(odoo_id) = outcome.odoo_id() else {
                return outcome;
            };
            info!(odoo_id, label = %record.label(), ?outcome, "pushed to odoo");
            let linked = SyncWriteBack::synced(odoo_id);
            if let Err(err) = write_back(store, E::KIND, record.row_id(), &linked).await {
                // Odoo already holds the change; keep the outcome.
                error!(?err, odoo_id, "failed to record sync linkage");
            }
            outcome
        }
        Err(err) => {
            let message = format!("{err:#}");
            warn!(error = %message, label = %record.label(), "sync failed");
            best_effort(
                "mark row as errored",
                write_back(store, E::KIND, record.row_id(), &SyncWriteBack::errored()),
            )
            .await;
            SyncOutcome::Errored(message)
        }
    }
}

pub(crate) async fn write_back(
    store: &dyn RecordStore,
    kind: RecordKind,
    id: i64,
    wb: &SyncWriteBack,
) -> Result<()> {
    let fields = serde_json::to_value(wb)?;
    store.update(kind, id, &fields).await
}
