pub mod ai;
pub mod config;
pub mod de;
pub mod model;
pub mod nocodb;
pub mod odoo;
pub mod reconcile;
pub mod service;
pub mod sync;
pub mod transform;

use anyhow::Result;
use std::sync::Arc;

use crate::ai::AiService;
use crate::config::Config;
use crate::nocodb::NocoClient;
use crate::odoo::OdooClient;
use crate::service::SyncService;
use crate::sync::SyncEngine;

/// Build both clients once and wire them into the service.
pub fn build_service(cfg: &Config) -> Result<SyncService> {
    let erp = Arc::new(OdooClient::from_config(cfg)?);
    let store = Arc::new(NocoClient::from_config(cfg)?);
    let engine = SyncEngine::from_config(cfg, erp, store);
    let ai = AiService::from_config(cfg)?;
    Ok(SyncService::new(engine, ai))
}
