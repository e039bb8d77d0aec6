//! Mapping of spreadsheet rows onto Odoo write payloads.
//!
//! Optional values that are absent on the row are left out of the payload
//! entirely, so an update never blanks a field that Odoo already holds.
use anyhow::{bail, Result};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::model::{ContactFields, ProductFields};
use crate::odoo::{resolve, ErpService};
use crate::reconcile::best_effort;

/// x2many write commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum X2Many {
    /// `(4, id)`: add a link, keep existing ones.
    Link(i64),
    /// `(6, 0, ids)`: replace the whole set.
    Set(Vec<i64>),
}

impl Serialize for X2Many {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            X2Many::Link(id) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&4)?;
                seq.serialize_element(id)?;
                seq.end()
            }
            X2Many::Set(ids) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&6)?;
                seq.serialize_element(&0)?;
                seq.serialize_element(ids)?;
                seq.end()
            }
        }
    }
}

/// `product.template` values.
#[derive(Debug, Clone, Default, serde::Serialize, PartialEq)]
pub struct ProductVals {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categ_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_sale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l10n_in_hsn_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taxes_id: Vec<X2Many>,
}

/// `res.partner` values.
#[derive(Debug, Clone, Default, serde::Serialize, PartialEq, Eq)]
pub struct PartnerVals {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_company: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l10n_in_pan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_rank: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_rank: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category_id: Vec<X2Many>,
}

impl ProductVals {
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl PartnerVals {
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Settings that influence contact resolution.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Country assumed for contacts that carry none.
    pub default_country: Option<String>,
}

/// Name a product is written (and matched) under.
pub fn product_name(fields: &ProductFields) -> Option<&str> {
    fields.product_name.as_deref()
}

/// Name a partner is written (and matched) under: the company name when
/// given, else the contact's own name.
pub fn partner_name(fields: &ContactFields) -> Option<&str> {
    fields.company_name.as_deref().or(fields.name.as_deref())
}

pub async fn product_vals(erp: &dyn ErpService, fields: &ProductFields) -> Result<ProductVals> {
    let Some(name) = product_name(fields) else {
        bail!("product name is required");
    };

    let mut vals = ProductVals {
        name: name.to_string(),
        list_price: fields.sales_price,
        standard_price: fields.cost,
        default_code: fields.internal_ref.clone(),
        description_sale: fields.description.clone(),
        l10n_in_hsn_code: fields.hsn_code.clone(),
        barcode: fields.barcode.clone(),
        ..Default::default()
    };

    if let Some(category) = fields.category.as_deref() {
        vals.categ_id = best_effort(
            "resolve product category",
            resolve::get_or_create_category(erp, category),
        )
        .await;
    }

    if let Some(tax) = fields.sales_tax.as_deref() {
        let tax_id = best_effort("resolve sales tax", resolve::find_tax(erp, tax))
            .await
            .flatten();
        if let Some(id) = tax_id {
            vals.taxes_id = vec![X2Many::Set(vec![id])];
        }
    }

    Ok(vals)
}

pub async fn partner_vals(
    erp: &dyn ErpService,
    fields: &ContactFields,
    opts: &TransformOptions,
) -> Result<PartnerVals> {
    let Some(name) = partner_name(fields) else {
        bail!("contact name is required");
    };

    let mut vals = PartnerVals {
        name: name.to_string(),
        is_company: fields.company_name.as_ref().map(|_| true),
        email: fields.email.clone(),
        phone: fields.phone.clone(),
        mobile: fields.mobile.clone(),
        street: fields.street.clone(),
        street2: fields.street2.clone(),
        city: fields.city.clone(),
        zip: fields.zip.clone(),
        website: fields.website.clone(),
        vat: fields.gst_number.clone(),
        l10n_in_pan: fields.pan.clone(),
        // 0 would reset a rank already set in Odoo
        customer_rank: fields.is_customer.then_some(1),
        supplier_rank: fields.is_vendor.then_some(1),
        ..Default::default()
    };

    let country = fields
        .country
        .as_deref()
        .or(opts.default_country.as_deref());
    if let Some(country) = country {
        vals.country_id = best_effort("resolve country", resolve::find_country(erp, country))
            .await
            .flatten();
    }

    if let Some(state) = fields.state.as_deref() {
        vals.state_id = best_effort(
            "resolve state",
            resolve::find_state(erp, state, vals.country_id),
        )
        .await
        .flatten();
    }

    if let Some(tags) = fields.tags.as_deref() {
        for tag in resolve::split_tags(tags) {
            if let Some(id) =
                best_effort("resolve partner tag", resolve::get_or_create_tag(erp, &tag)).await
            {
                vals.category_id.push(X2Many::Link(id));
            }
        }
    }

    Ok(vals)
}
