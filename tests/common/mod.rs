#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use noco_odoo_sync::model::RecordKind;
use noco_odoo_sync::nocodb::{pending_only, RecordStore};
use noco_odoo_sync::odoo::domain::Condition;
use noco_odoo_sync::odoo::{Domain, ErpError, ErpService, Op};

#[derive(Debug, Clone, PartialEq)]
pub enum ErpCall {
    Search { model: String, domain: Value },
    SearchRead { model: String, domain: Value },
    Create { model: String, vals: Value },
    Write { model: String, id: i64, vals: Value },
}

#[derive(Default)]
struct ErpState {
    records: HashMap<String, Vec<Map<String, Value>>>,
    next_id: i64,
    calls: Vec<ErpCall>,
    failing_names: HashSet<String>,
    failing_models: HashSet<String>,
}

/// In-memory Odoo: evaluates `=`, `=ilike` and `ilike` domains over
/// seeded rows and records every call.
#[derive(Clone, Default)]
pub struct FakeErp {
    state: Arc<Mutex<ErpState>>,
    auth_fails: Arc<AtomicBool>,
    auth_attempts: Arc<AtomicU32>,
}

fn matches(row: &Map<String, Value>, cond: &Condition) -> bool {
    let Some(actual) = row.get(&cond.field) else {
        return false;
    };
    match cond.op {
        Op::Eq => actual == &cond.value,
        Op::EqILike | Op::ILike => {
            let (Some(actual), Some(wanted)) = (actual.as_str(), cond.value.as_str()) else {
                return false;
            };
            let (actual, wanted) = (actual.to_lowercase(), wanted.to_lowercase());
            if cond.op == Op::EqILike {
                actual == wanted
            } else {
                actual.contains(&wanted)
            }
        }
    }
}

impl FakeErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly and return its id.
    pub async fn seed(&self, model: &str, vals: Value) -> i64 {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        let mut row = vals.as_object().cloned().unwrap_or_default();
        row.insert("id".into(), json!(id));
        state.records.entry(model.to_string()).or_default().push(row);
        id
    }

    pub fn fail_auth(&self) {
        self.auth_fails.store(true, Ordering::SeqCst);
    }

    pub fn auth_attempts(&self) -> u32 {
        self.auth_attempts.load(Ordering::SeqCst)
    }

    /// Creates and writes carrying this `name` fail with a server fault.
    pub async fn fail_on_name(&self, name: &str) {
        self.state.lock().await.failing_names.insert(name.to_string());
    }

    /// Every call against `model` fails.
    pub async fn fail_model(&self, model: &str) {
        self.state.lock().await.failing_models.insert(model.to_string());
    }

    pub async fn calls(&self) -> Vec<ErpCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn creates(&self, model: &str) -> Vec<Value> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                ErpCall::Create { model: m, vals } if m == model => Some(vals),
                _ => None,
            })
            .collect()
    }

    pub async fn writes(&self, model: &str) -> Vec<(i64, Value)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                ErpCall::Write { model: m, id, vals } if m == model => Some((id, vals)),
                _ => None,
            })
            .collect()
    }

    pub async fn searches(&self, model: &str) -> Vec<Value> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                ErpCall::Search { model: m, domain } if m == model => Some(domain),
                _ => None,
            })
            .collect()
    }

    pub async fn records(&self, model: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state
            .records
            .get(model)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn check_model(state: &ErpState, model: &str) -> Result<(), ErpError> {
        if state.failing_models.contains(model) {
            return Err(ErpError::Fault(format!("{model} is unavailable")));
        }
        Ok(())
    }

    fn check_name(state: &ErpState, vals: &Value) -> Result<(), ErpError> {
        if let Some(name) = vals.get("name").and_then(Value::as_str) {
            if state.failing_names.contains(name) {
                return Err(ErpError::Fault(format!("validation failed for {name}")));
            }
        }
        Ok(())
    }

    fn filter(state: &ErpState, model: &str, domain: &Domain, limit: Option<u32>) -> Vec<Value> {
        let rows = state.records.get(model).cloned().unwrap_or_default();
        let hits = rows
            .into_iter()
            .filter(|row| domain.conditions().iter().all(|c| matches(row, c)))
            .map(Value::Object);
        match limit {
            Some(n) => hits.take(n as usize).collect(),
            None => hits.collect(),
        }
    }
}

#[async_trait]
impl ErpService for FakeErp {
    async fn ensure_session(&self) -> Result<i64, ErpError> {
        self.auth_attempts.fetch_add(1, Ordering::SeqCst);
        if self.auth_fails.load(Ordering::SeqCst) {
            return Err(ErpError::Auth("invalid credentials".into()));
        }
        Ok(2)
    }

    async fn search(
        &self,
        model: &str,
        domain: &Domain,
        limit: Option<u32>,
    ) -> Result<Vec<i64>, ErpError> {
        let mut state = self.state.lock().await;
        state.calls.push(ErpCall::Search {
            model: model.into(),
            domain: serde_json::to_value(domain).unwrap(),
        });
        Self::check_model(&state, model)?;
        Ok(Self::filter(&state, model, domain, limit)
            .iter()
            .filter_map(|row| row["id"].as_i64())
            .collect())
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        _fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ErpError> {
        let mut state = self.state.lock().await;
        state.calls.push(ErpCall::SearchRead {
            model: model.into(),
            domain: serde_json::to_value(domain).unwrap(),
        });
        Self::check_model(&state, model)?;
        Ok(Self::filter(&state, model, domain, limit))
    }

    async fn create(&self, model: &str, vals: &Value) -> Result<i64, ErpError> {
        let mut state = self.state.lock().await;
        state.calls.push(ErpCall::Create {
            model: model.into(),
            vals: vals.clone(),
        });
        Self::check_model(&state, model)?;
        Self::check_name(&state, vals)?;
        state.next_id += 1;
        let id = state.next_id;
        let mut row = vals.as_object().cloned().unwrap_or_default();
        row.insert("id".into(), json!(id));
        state.records.entry(model.to_string()).or_default().push(row);
        Ok(id)
    }

    async fn write(&self, model: &str, id: i64, vals: &Value) -> Result<(), ErpError> {
        let mut state = self.state.lock().await;
        state.calls.push(ErpCall::Write {
            model: model.into(),
            id,
            vals: vals.clone(),
        });
        Self::check_model(&state, model)?;
        Self::check_name(&state, vals)?;
        let row = state
            .records
            .get_mut(model)
            .and_then(|rows| rows.iter_mut().find(|r| r["id"] == json!(id)))
            .ok_or_else(|| ErpError::Fault(format!("Record {model}({id}) does not exist")))?;
        if let Some(vals) = vals.as_object() {
            for (k, v) in vals {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}

/// NocoDB stand-in: rows per table, updates merged in place and logged.
#[derive(Clone, Default)]
pub struct RecordingStore {
    rows: Arc<Mutex<HashMap<RecordKind, Vec<Value>>>>,
    updates: Arc<Mutex<Vec<(RecordKind, i64, Value)>>>,
    fail_updates: Arc<AtomicBool>,
    fail_list: Arc<AtomicBool>,
}

impl RecordingStore {
    pub fn with_rows(kind: RecordKind, rows: Vec<Value>) -> Self {
        let store = Self::default();
        store
            .rows
            .try_lock()
            .expect("fresh store")
            .insert(kind, rows);
        store
    }

    pub async fn put_rows(&self, kind: RecordKind, rows: Vec<Value>) {
        self.rows.lock().await.insert(kind, rows);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub async fn updates(&self) -> Vec<(RecordKind, i64, Value)> {
        self.updates.lock().await.clone()
    }

    pub async fn row(&self, kind: RecordKind, id: i64) -> Option<Value> {
        self.rows
            .lock()
            .await
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r["Id"] == json!(id)).cloned())
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn list(&self, kind: RecordKind, only_pending: bool) -> Result<Vec<Value>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("nocodb error 500: boom"));
        }
        let rows = self.rows.lock().await.get(&kind).cloned().unwrap_or_default();
        Ok(if only_pending { pending_only(rows) } else { rows })
    }

    async fn create(&self, kind: RecordKind, fields: &Value) -> Result<Value> {
        let mut rows = self.rows.lock().await;
        let table = rows.entry(kind).or_default();
        let mut row = fields.clone();
        row["Id"] = json!(table.len() as i64 + 1);
        table.push(row.clone());
        Ok(row)
    }

    async fn update(&self, kind: RecordKind, id: i64, fields: &Value) -> Result<()> {
        self.updates.lock().await.push((kind, id, fields.clone()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("nocodb error 503: unavailable"));
        }
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r["Id"] == json!(id)))
            .ok_or_else(|| anyhow!("row {id} not found"))?;
        if let (Some(row), Some(fields)) = (row.as_object_mut(), fields.as_object()) {
            for (k, v) in fields {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn check_connection(&self) -> bool {
        !self.fail_list.load(Ordering::SeqCst)
    }
}
