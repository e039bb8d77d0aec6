use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::model::{
    BatchSummary, ContactRecord, ProductRecord, RecordKind, SyncAllSummary, SyncOutcome,
    SyncWriteBack,
};
use crate::nocodb::RecordStore;
use crate::odoo::ErpService;
use crate::reconcile::{best_effort, reconcile, write_back, SyncEntity};
use crate::transform::TransformOptions;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Drives the reconciler over a table and folds the outcomes.
#[derive(Clone)]
pub struct SyncEngine {
    erp: Arc<dyn ErpService>,
    store: Arc<dyn RecordStore>,
    concurrency: usize,
    opts: TransformOptions,
}

impl SyncEngine {
    pub fn new(erp: Arc<dyn ErpService>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            erp,
            store,
            concurrency: DEFAULT_CONCURRENCY,
            opts: TransformOptions::default(),
        }
    }

    pub fn from_config(
        cfg: &Config,
        erp: Arc<dyn ErpService>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self::new(erp, store)
            .with_concurrency(cfg.app.concurrency)
            .with_options(TransformOptions {
                default_country: cfg.odoo.default_country.clone(),
            })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_options(mut self, opts: TransformOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn erp(&self) -> &dyn ErpService {
        self.erp.as_ref()
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &TransformOptions {
        &self.opts
    }

    /// Sync one table; `only_pending` restricts the run to unsynced rows.
    pub async fn sync(&self, kind: RecordKind, only_pending: bool) -> BatchSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", %run_id, kind = kind.as_str(), only_pending);
        match kind {
            RecordKind::Product => {
                self.sync_kind::<ProductRecord>(only_pending)
                    .instrument(span)
                    .await
            }
            RecordKind::Contact => {
                self.sync_kind::<ContactRecord>(only_pending)
                    .instrument(span)
                    .await
            }
        }
    }

    /// Products first, then contacts.
    pub async fn sync_all(&self, only_pending: bool) -> SyncAllSummary {
        let products = self.sync(RecordKind::Product, only_pending).await;
        let contacts = self.sync(RecordKind::Contact, only_pending).await;
        SyncAllSummary {
            success: products.success && contacts.success,
            products,
            contacts,
        }
    }

    async fn sync_kind<E: SyncEntity>(&self, only_pending: bool) -> BatchSummary {
        let plural = E::KIND.plural();

        if let Err(err) = self.erp.ensure_session().await {
            error!(%err, "cannot sync without an Odoo session");
            return BatchSummary::failed(format!("Failed to authenticate with Odoo: {err}"));
        }

        let rows = match self.store.list(E::KIND, only_pending).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(?err, "failed to fetch rows");
                return BatchSummary::failed(format!("Failed to fetch {plural}: {err:#}"));
            }
        };
        info!(count = rows.len(), "fetched rows");

        let erp = self.erp.as_ref();
        let store = self.store.as_ref();
        let opts = &self.opts;
        let mut results = stream::iter(rows)
            .map(|row| sync_row::<E>(erp, store, opts, row))
            .buffer_unordered(self.concurrency);

        let mut summary = BatchSummary::default();
        while let Some(outcome) = results.next().await {
            match outcome {
                SyncOutcome::Created { .. } => summary.created += 1,
                SyncOutcome::Updated { .. } => summary.updated += 1,
                SyncOutcome::Errored(message) => summary.errors.push(message),
            }
        }

        summary.success = summary.errors.is_empty();
        summary.message = format!(
            "Synced {} {} ({} created, {} updated)",
            summary.created + summary.updated,
            plural,
            summary.created,
            summary.updated
        );
        if summary.success {
            info!(created = summary.created, updated = summary.updated, "sync finished");
        } else {
            warn!(
                created = summary.created,
                updated = summary.updated,
                errors = summary.errors.len(),
                "sync finished with errors"
            );
        }
        summary
    }
}

/// Decode and reconcile one raw row; every failure is folded into the
/// returned outcome with a message naming the row.
async fn sync_row<E: SyncEntity>(
    erp: &dyn ErpService,
    store: &dyn RecordStore,
    opts: &TransformOptions,
    row: Value,
) -> SyncOutcome {
    let kind = E::KIND.as_str();
    let record = match E::deserialize(&row) {
        Ok(record) => record,
        Err(err) => {
            let id = row.get("Id").cloned().unwrap_or(Value::Null);
            warn!(%err, %id, "skipping undecodable row");
            if let Ok(Some(row_id)) = crate::de::opt_i64(&id) {
                best_effort(
                    "mark row as errored",
                    write_back(store, E::KIND, row_id, &SyncWriteBack::errored()),
                )
                .await;
            }
            let message = format!("Error syncing {kind} #{id}: invalid row: {err}");
            return SyncOutcome::Errored(message);
        }
    };
    match reconcile(erp, store, opts, &record).await {
        SyncOutcome::Errored(reason) => SyncOutcome::Errored(format!(
            "Error syncing {kind} '{}': {reason}",
            record.label()
        )),
        outcome => outcome,
    }
}
