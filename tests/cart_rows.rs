use serde_json::json;
use storefront::cart_rows::{normalize_cart_items, parse_temp_item_id, temp_item_id};

const NOW: i64 = 1_760_000_000_000;

#[test]
fn empty_cart_aggregate_yields_no_items() {
    assert!(normalize_cart_items(json!([null]), NOW).is_empty());
    assert!(normalize_cart_items(json!(null), NOW).is_empty());
    assert!(normalize_cart_items(json!("[null]"), NOW).is_empty());
}

#[test]
fn accepts_array_text_and_nested_arrays() {
    let item = json!({ "id": "a1", "productId": 7, "quantity": 2, "price": 1000 });

    let from_array = normalize_cart_items(json!([item.clone()]), NOW);
    let from_text = normalize_cart_items(json!(json!([item.clone()]).to_string()), NOW);
    let from_nested = normalize_cart_items(json!([[item.clone(), null]]), NOW);

    for items in [from_array, from_text, from_nested] {
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a1");
        assert_eq!(items[0].product_id, 7);
        assert_eq!(items[0].quantity, 2);
        assert!(!items[0].is_temporary);
    }
}

#[test]
fn missing_ids_get_temporary_ids_from_created_at() {
    let items = normalize_cart_items(
        json!([
            { "productId": 7, "quantity": 1, "createdAt": "2025-10-09T08:00:00.000+00:00" },
            { "id": "", "productId": 8, "quantity": 1 },
            { "id": null, "product_id": "9", "quantity": "3" }
        ]),
        NOW,
    );

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, temp_item_id(7, 1_759_996_800_000));
    assert_eq!(items[1].id, temp_item_id(8, NOW));
    assert_eq!(items[2].id, temp_item_id(9, NOW));
    assert_eq!(items[2].quantity, 3);
    assert!(items.iter().all(|i| i.is_temporary));
}

#[test]
fn temporary_ids_are_stable_across_reads() {
    let raw = json!([{ "productId": 7, "quantity": 1, "createdAt": "2025-10-09T08:00:00+00:00" }]);
    let first = normalize_cart_items(raw.clone(), NOW);
    let second = normalize_cart_items(raw, NOW + 5_000);
    assert_eq!(first[0].id, second[0].id);
}

#[test]
fn drops_entries_without_product_or_with_bad_quantity() {
    let items = normalize_cart_items(
        json!([
            { "id": "x", "quantity": 1 },
            { "id": "y", "productId": 3, "quantity": 0 },
            { "id": "z", "productId": 4, "quantity": -2 },
            42,
            "not json",
            { "id": "ok", "productId": 5 }
        ]),
        NOW,
    );

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "ok");
    assert_eq!(items[0].quantity, 1);
}

#[test]
fn first_image_and_prices_are_carried() {
    let items = normalize_cart_items(
        json!([{
            "id": "a",
            "productId": 1,
            "quantity": 2,
            "price": 2500,
            "salePrice": 2000,
            "inventory": 4,
            "images": "[\"/uploads/products/a.jpg\",\"/uploads/products/b.jpg\"]"
        }]),
        NOW,
    );

    let item = &items[0];
    assert_eq!(item.image.as_deref(), Some("/uploads/products/a.jpg"));
    assert_eq!(item.sale_price, Some(2000));
    assert_eq!(item.inventory, Some(4));
    assert_eq!(item.line_total(), 4000);
}

#[test]
fn temp_id_helpers() {
    let id = temp_item_id(12, NOW);
    assert_eq!(id, format!("temp_12_{NOW}"));
    assert_eq!(parse_temp_item_id(&id), Some(12));

    assert_eq!(parse_temp_item_id("temp_abc_1"), None);
    assert_eq!(parse_temp_item_id("temp_12"), None);
    assert_eq!(parse_temp_item_id("3f2b1c9e-0000-4000-8000-000000000000"), None);
}
