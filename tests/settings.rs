use chrono::{TimeZone, Utc};
use serde_json::json;
use storefront::{
    error::AppError,
    dto::orders::CreateOrderRequest,
    models::{OrderStatus, PaymentStatus, StoreSettings},
    services::{
        order_service::{OrderTotals, build_order_number, compute_totals, validate_order},
        settings_service::settings_from_value,
    },
};
use uuid::Uuid;

fn order_request(extra: serde_json::Value) -> CreateOrderRequest {
    let mut body = json!({
        "items": [
            { "productId": 7, "price": 1500, "quantity": 2 },
            { "productId": "enamel-mug", "name": "Mug", "price": 1200, "quantity": 1 }
        ],
        "customer": { "name": "Ada", "email": "ada@example.com" },
        "shippingAddress": { "line1": "1 Main St", "city": "Springfield" }
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(body).unwrap()
}

#[test]
fn defaults_cover_every_section() {
    let settings = StoreSettings::default();
    assert_eq!(settings.shipping.flat_rate, 500);
    assert_eq!(settings.shipping.free_shipping_threshold, 5000);
    assert_eq!(settings.notifications.low_stock_threshold, 5);
    assert!(settings.security.allow_guest_checkout);
    assert_eq!(settings.products.tax_rate, 0.0);
}

#[test]
fn partial_documents_fill_in_defaults() {
    let settings = settings_from_value(json!({
        "general": { "storeName": "Corner Shop" },
        "products": { "taxRate": 10.0 }
    }));
    assert_eq!(settings.general.store_name, "Corner Shop");
    assert_eq!(settings.general.store_email, "store@example.com");
    assert_eq!(settings.products.tax_rate, 10.0);
    assert_eq!(settings.shipping, StoreSettings::default().shipping);

    let serialized = serde_json::to_value(&settings).unwrap();
    assert_eq!(settings_from_value(serialized), settings);
}

#[test]
fn unreadable_documents_fall_back_to_defaults() {
    assert_eq!(settings_from_value(json!("nope")), StoreSettings::default());
    assert_eq!(
        settings_from_value(json!({ "shipping": { "flatRate": "lots" } })),
        StoreSettings::default()
    );
}

#[test]
fn shipping_and_tax_rules() {
    let mut settings = StoreSettings::default();
    assert_eq!(settings.shipping.cost_for(4999), 500);
    assert_eq!(settings.shipping.cost_for(5000), 0);

    settings.shipping.enable_free_shipping = false;
    assert_eq!(settings.shipping.cost_for(10_000), 500);

    settings.products.tax_rate = 8.25;
    assert_eq!(settings.products.tax_for(10_000), 825);
    assert_eq!(settings.products.tax_for(1), 0);
}

#[test]
fn missing_totals_are_derived_from_items_and_settings() {
    let mut settings = StoreSettings::default();
    settings.products.tax_rate = 10.0;

    let totals = compute_totals(&order_request(json!({})), &settings).unwrap();
    assert_eq!(
        totals,
        OrderTotals {
            subtotal: 4200,
            shipping: 500,
            tax: 420,
            total: 5120,
        }
    );
}

#[test]
fn client_totals_are_kept() {
    let request = order_request(json!({ "subtotal": 4200, "shipping": 0, "tax": 0, "total": 4200 }));
    let totals = compute_totals(&request, &StoreSettings::default()).unwrap();
    assert_eq!(totals.shipping, 0);
    assert_eq!(totals.total, 4200);
}

#[test]
fn oversized_line_totals_are_rejected() {
    let request = order_request(json!({
        "items": [{ "productId": 1, "price": 5_000_000_000_000_000_000i64, "quantity": 2 }]
    }));
    assert!(validate_order(&request).is_ok());
    assert!(matches!(
        compute_totals(&request, &StoreSettings::default()),
        Err(AppError::BadRequest(_))
    ));

    let near_max = order_request(json!({
        "items": [{ "productId": 1, "price": i64::MAX - 10, "quantity": 1 }],
        "shipping": 500
    }));
    assert!(compute_totals(&near_max, &StoreSettings::default()).is_err());
}

#[test]
fn order_validation() {
    assert!(validate_order(&order_request(json!({}))).is_ok());
    assert_eq!(order_request(json!({})).payment_method, "cash_on_delivery");

    let empty = order_request(json!({ "items": [] }));
    assert!(validate_order(&empty).is_err());

    let zero = order_request(json!({ "items": [{ "productId": 1, "price": 100, "quantity": 0 }] }));
    assert!(validate_order(&zero).is_err());

    let nameless = order_request(json!({ "customer": { "name": " ", "email": "a@b.c" } }));
    assert!(validate_order(&nameless).is_err());

    let bad_email = order_request(json!({ "customer": { "name": "Ada", "email": "ada" } }));
    assert!(validate_order(&bad_email).is_err());

    let negative_total = order_request(json!({ "total": -1 }));
    assert!(validate_order(&negative_total).is_err());
}

#[test]
fn order_numbers_embed_date_and_id_prefix() {
    let id = Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap();
    let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
    assert_eq!(build_order_number(id, at), "ORD-20260309-1b4e28ba");
}

#[test]
fn statuses_parse_from_their_wire_names() {
    for status in OrderStatus::ALL {
        assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
    }
    for status in PaymentStatus::ALL {
        assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
    }
    assert!("paid".parse::<OrderStatus>().is_err());
    assert_eq!(
        serde_json::from_value::<OrderStatus>(json!("shipped")).unwrap(),
        OrderStatus::Shipped
    );
}
