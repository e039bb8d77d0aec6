mod common;

use common::{FakeErp, RecordingStore};
use serde_json::json;
use std::sync::Arc;

use noco_odoo_sync::ai::AiService;
use noco_odoo_sync::model::{
    ContactFields, CustomerInput, HealthStatus, ProductFields, ProductUpsert,
};
use noco_odoo_sync::odoo::{
    CATEGORY_MODEL, COUNTRY_MODEL, PARTNER_MODEL, PRODUCT_MODEL, STATE_MODEL, TAX_MODEL,
};
use noco_odoo_sync::service::{ServiceError, SyncService};
use noco_odoo_sync::sync::SyncEngine;
use noco_odoo_sync::transform::TransformOptions;

fn service(erp: &FakeErp, store: &RecordingStore) -> SyncService {
    let engine = SyncEngine::new(Arc::new(erp.clone()), Arc::new(store.clone())).with_options(
        TransformOptions {
            default_country: Some("India".into()),
        },
    );
    SyncService::new(engine, AiService::new(None, "UniPack"))
}

#[tokio::test]
async fn create_product_returns_record_response() {
    let erp = FakeErp::new();
    let svc = service(&erp, &RecordingStore::default());
    let fields = ProductFields {
        product_name: Some("Widget".into()),
        sales_price: Some(10.0),
        ..Default::default()
    };

    let res = svc.create_product(&fields).await.unwrap();

    assert!(res.success);
    assert_eq!(res.name, "Widget");
    assert_eq!(erp.records(PRODUCT_MODEL).await[0]["id"], res.id);
}

#[tokio::test]
async fn create_without_name_is_a_failure() {
    let erp = FakeErp::new();
    let svc = service(&erp, &RecordingStore::default());

    let err = svc
        .create_product(&ProductFields::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Failed(ref m) if m.starts_with("Failed to create product")));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn auth_failure_is_unavailable() {
    let erp = FakeErp::new();
    erp.fail_auth();
    let svc = service(&erp, &RecordingStore::default());

    let err = svc
        .create_contact(&ContactFields {
            name: Some("Ada".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(erp.calls().await.is_empty());
}

#[tokio::test]
async fn get_product_reads_view_or_not_found() {
    let erp = FakeErp::new();
    let id = erp
        .seed(
            PRODUCT_MODEL,
            json!({
                "name": "Widget",
                "list_price": 12.5,
                "standard_price": 4.0,
                "default_code": false,
                "categ_id": [3, "All / Boxes"],
                "description_sale": "Sturdy",
            }),
        )
        .await;
    let svc = service(&erp, &RecordingStore::default());

    let view = svc.get_product(id).await.unwrap();
    assert_eq!(view.name, "Widget");
    assert_eq!(view.price, 12.5);
    assert_eq!(view.internal_ref, None);
    assert_eq!(view.category.as_deref(), Some("All / Boxes"));

    let err = svc.get_product(id + 100).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(ref m) if m == &format!("Product with ID {} not found", id + 100)));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn get_contact_reports_ranks() {
    let erp = FakeErp::new();
    let id = erp
        .seed(
            PARTNER_MODEL,
            json!({"name": "Acme", "customer_rank": 0, "supplier_rank": 2, "state_id": false}),
        )
        .await;
    let svc = service(&erp, &RecordingStore::default());

    let view = svc.get_contact(id).await.unwrap();

    assert!(view.is_vendor());
    assert!(!view.is_customer());
    assert_eq!(view.state, None);
}

#[tokio::test]
async fn upsert_products_matches_on_internal_reference() {
    let erp = FakeErp::new();
    let existing = erp
        .seed(PRODUCT_MODEL, json!({"name": "Old", "default_code": "UP-1"}))
        .await;
    let svc = service(&erp, &RecordingStore::default());
    let items: Vec<ProductUpsert> = serde_json::from_value(json!([
        {"product_name": "Slotter", "internal_ref": "UP-1"},
        {"internal_ref": "UP-2", "machine_name": "Smart Line", "size": "120"},
        {"sales_price": 3},
    ]))
    .unwrap();

    let res = svc.upsert_products(&items, true).await.unwrap();

    assert!(!res.success);
    assert_eq!(res.results[0].id, Some(existing));
    assert_eq!(res.results[0].message, "Updated");
    assert!(res.results[1].success);
    assert_eq!(res.results[1].message, "Created");
    assert!(!res.results[2].success);
    assert!(res.results[2].message.contains("name is required"));

    let created = &erp.creates(PRODUCT_MODEL).await[0];
    assert_eq!(created["name"], "UniPack Smart Line");
    assert_eq!(created["default_code"], "UP-2");
}

#[tokio::test]
async fn upsert_products_without_ai_leaves_names_alone() {
    let erp = FakeErp::new();
    let svc = service(&erp, &RecordingStore::default());
    let items = vec![ProductUpsert {
        fields: ProductFields {
            internal_ref: Some("UP-9".into()),
            ..Default::default()
        },
        machine_name: Some("Slotter".into()),
        size: None,
    }];

    let res = svc.upsert_products(&items, false).await.unwrap();

    assert!(!res.results[0].success);
    assert!(erp.creates(PRODUCT_MODEL).await.is_empty());
}

#[tokio::test]
async fn upsert_customers_matches_on_gst() {
    let erp = FakeErp::new();
    let india = erp
        .seed(COUNTRY_MODEL, json!({"name": "India", "code": "IN"}))
        .await;
    let mh = erp
        .seed(STATE_MODEL, json!({"name": "Maharashtra", "country_id": india}))
        .await;
    let existing = erp
        .seed(PARTNER_MODEL, json!({"name": "Old Co", "vat": "27AAAAA0000A1Z5"}))
        .await;
    let svc = service(&erp, &RecordingStore::default());
    let items = vec![
        CustomerInput {
            company_name: "Acme Cartons".into(),
            gst_number: Some("27AAAAA0000A1Z5".into()),
            state: Some("maharashtra".into()),
            pincode: Some("411001".into()),
            ..Default::default()
        },
        CustomerInput {
            company_name: "New Boxes".into(),
            pan: Some("AAAAA0000A".into()),
            ..Default::default()
        },
    ];

    let res = svc.upsert_customers(&items).await.unwrap();

    assert!(res.success);
    assert_eq!(res.results[0].id, Some(existing));
    assert_eq!(res.results[1].message, "Created");

    let (id, vals) = &erp.writes(PARTNER_MODEL).await[0];
    assert_eq!(*id, existing);
    assert_eq!(vals["name"], "Acme Cartons");
    assert_eq!(vals["is_company"], true);
    assert_eq!(vals["customer_rank"], 1);
    assert_eq!(vals["country_id"], india);
    assert_eq!(vals["state_id"], mh);
    assert_eq!(vals["zip"], "411001");
    assert_eq!(vals["vat"], "27AAAAA0000A1Z5");

    let created = &erp.creates(PARTNER_MODEL).await[0];
    assert_eq!(created["l10n_in_pan"], "AAAAA0000A");
}

#[tokio::test]
async fn reference_listings() {
    let erp = FakeErp::new();
    erp.seed(CATEGORY_MODEL, json!({"name": "Boxes", "complete_name": "All / Boxes"}))
        .await;
    erp.seed(TAX_MODEL, json!({"name": "GST 18%", "amount": 18.0, "type_tax_use": "sale"}))
        .await;
    erp.seed(TAX_MODEL, json!({"name": "GST 18% (purchase)", "amount": 18.0, "type_tax_use": "purchase"}))
        .await;
    erp.seed(COUNTRY_MODEL, json!({"name": "India", "code": "IN"}))
        .await;
    let svc = service(&erp, &RecordingStore::default());

    let categories = svc.categories().await.unwrap();
    assert_eq!(categories[0].complete_name.as_deref(), Some("All / Boxes"));

    let taxes = svc.taxes().await.unwrap();
    assert_eq!(taxes.len(), 1);
    assert_eq!(taxes[0].name, "GST 18%");

    let countries = svc.countries().await.unwrap();
    assert_eq!(countries[0].code.as_deref(), Some("IN"));
}

#[tokio::test]
async fn health_reports_each_side() {
    let erp = FakeErp::new();
    let store = RecordingStore::default();
    let svc = service(&erp, &store);

    let report = svc.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.odoo && report.nocodb);
    assert_eq!(report.version, env!("CARGO_PKG_VERSION"));

    store.fail_list();
    erp.fail_auth();
    let report = svc.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.odoo);
    assert!(!report.nocodb);
}
