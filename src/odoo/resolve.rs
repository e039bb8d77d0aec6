//! Identity resolution against Odoo: natural-key matching for synced
//! records, get-or-create for categories and partner tags, and lookup-only
//! resolution for taxes, countries and states.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info};

use super::{
    Domain, ErpError, ErpService, Op, CATEGORY_MODEL, COUNTRY_MODEL, PARTNER_MODEL,
    PARTNER_TAG_MODEL, PRODUCT_MODEL, STATE_MODEL, TAX_MODEL,
};

static ISO_COUNTRY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("static regex"));

/// First id matching `domain`, if any.
pub async fn find_one(
    erp: &dyn ErpService,
    model: &str,
    domain: &Domain,
) -> Result<Option<i64>, ErpError> {
    let ids = erp.search(model, domain, Some(1)).await?;
    Ok(ids.into_iter().next())
}

pub async fn find_product_by_name(
    erp: &dyn ErpService,
    name: &str,
) -> Result<Option<i64>, ErpError> {
    find_one(erp, PRODUCT_MODEL, &Domain::eq("name", name)).await
}

pub async fn find_product_by_code(
    erp: &dyn ErpService,
    code: &str,
) -> Result<Option<i64>, ErpError> {
    find_one(erp, PRODUCT_MODEL, &Domain::eq("default_code", code)).await
}

pub async fn find_partner_by_email(
    erp: &dyn ErpService,
    email: &str,
) -> Result<Option<i64>, ErpError> {
    find_one(erp, PARTNER_MODEL, &Domain::eq("email", email)).await
}

pub async fn find_partner_by_name(
    erp: &dyn ErpService,
    name: &str,
) -> Result<Option<i64>, ErpError> {
    find_one(erp, PARTNER_MODEL, &Domain::eq("name", name)).await
}

pub async fn find_partner_by_vat(
    erp: &dyn ErpService,
    vat: &str,
) -> Result<Option<i64>, ErpError> {
    find_one(erp, PARTNER_MODEL, &Domain::eq("vat", vat)).await
}

/// Search by exact name; create a record with that name when none exists.
pub async fn get_or_create_by_name(
    erp: &dyn ErpService,
    model: &str,
    name: &str,
) -> Result<i64, ErpError> {
    if let Some(id) = find_one(erp, model, &Domain::eq("name", name)).await? {
        debug!(model, name, id, "resolved existing reference");
        return Ok(id);
    }
    let id = erp.create(model, &json!({ "name": name })).await?;
    info!(model, name, id, "created missing reference");
    Ok(id)
}

pub async fn get_or_create_category(erp: &dyn ErpService, name: &str) -> Result<i64, ErpError> {
    get_or_create_by_name(erp, CATEGORY_MODEL, name).await
}

pub async fn get_or_create_tag(erp: &dyn ErpService, name: &str) -> Result<i64, ErpError> {
    get_or_create_by_name(erp, PARTNER_TAG_MODEL, name).await
}

/// Try each domain in turn; the first one with a hit wins.
async fn first_hit(
    erp: &dyn ErpService,
    model: &str,
    attempts: Vec<Domain>,
) -> Result<Option<i64>, ErpError> {
    for domain in attempts {
        if let Some(id) = find_one(erp, model, &domain).await? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// Sales tax by exact name, then by case-insensitive partial name.
pub async fn find_tax(erp: &dyn ErpService, name: &str) -> Result<Option<i64>, ErpError> {
    let sale = || Domain::eq("type_tax_use", "sale");
    first_hit(
        erp,
        TAX_MODEL,
        vec![
            sale().and("name", Op::Eq, name),
            sale().and("name", Op::ILike, name),
        ],
    )
    .await
}

/// Country by ISO code (two letters) or name, case-insensitively.
pub async fn find_country(erp: &dyn ErpService, value: &str) -> Result<Option<i64>, ErpError> {
    let value = value.trim();
    let mut attempts = Vec::with_capacity(3);
    if ISO_COUNTRY_CODE.is_match(value) {
        attempts.push(Domain::new().and("code", Op::EqILike, value));
    }
    attempts.push(Domain::new().and("name", Op::EqILike, value));
    attempts.push(Domain::new().and("name", Op::ILike, value));
    first_hit(erp, COUNTRY_MODEL, attempts).await
}

/// State by name, narrowed to `country_id` when known.
pub async fn find_state(
    erp: &dyn ErpService,
    name: &str,
    country_id: Option<i64>,
) -> Result<Option<i64>, ErpError> {
    let scoped = |op: Op| {
        let domain = Domain::new().and("name", op, name.trim());
        match country_id {
            Some(id) => domain.and("country_id", Op::Eq, id),
            None => domain,
        }
    };
    first_hit(erp, STATE_MODEL, vec![scoped(Op::EqILike), scoped(Op::ILike)]).await
}

/// Split a comma-separated tag cell into distinct, non-blank names.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
