mod common;

use common::{create_product, create_user, inventory_of, setup_state, unique};
use serde_json::json;
use storefront::{
    dto::{
        admin::InventoryAdjustRequest,
        cart::{AddToCartRequest, ProductRef},
        orders::{CreateOrderRequest, UpdateOrderStatusRequest, UpdatePaymentStatusRequest},
    },
    error::AppError,
    middleware::cart_owner::CartOwner,
    models::{OrderStatus, PaymentStatus},
    routes::params::{LowStockQuery, OrderListQuery},
    services::{admin_service, cart_service, order_service},
};
use uuid::Uuid;

fn order_request(lines: &[(i64, i64, i32)]) -> CreateOrderRequest {
    let items: Vec<_> = lines
        .iter()
        .map(|(product_id, price, quantity)| {
            json!({ "productId": product_id, "price": price, "quantity": quantity })
        })
        .collect();
    serde_json::from_value(json!({
        "items": items,
        "customer": { "name": "Flow Shopper", "email": "Shopper@Flow.Test" },
        "shippingAddress": { "line1": "1 Test Street", "city": "Testville" },
    }))
    .expect("valid order request")
}

async fn reserved_flags(state: &storefront::state::AppState, order_id: Uuid) -> anyhow::Result<Vec<bool>> {
    let rows: Vec<(bool,)> = sqlx::query_as(
        "SELECT inventory_reserved FROM order_items WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows.into_iter().map(|(flag,)| flag).collect())
}

#[tokio::test]
async fn placing_an_order_records_lines_and_takes_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let owner = CartOwner::User(user.user_id);
    let mug = create_product(&state, 1500, 10).await?;
    let cap = create_product(&state, 1200, 4).await?;

    cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id: ProductRef::Id(mug),
            quantity: Some(2),
        },
    )
    .await?;

    let resp = order_service::create_order(
        &state,
        Some(&user),
        &owner,
        order_request(&[(mug, 1500, 2), (cap, 1200, 1)]),
    )
    .await?;
    let placed = resp.data.expect("order");

    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.order.user_id, Some(user.user_id));
    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.order.payment_status, "unpaid");
    assert_eq!(placed.order.customer_email, "shopper@flow.test");
    assert_eq!(placed.order.subtotal, 4200);
    assert!(placed.order.order_number.starts_with("ORD-"));
    assert!(placed.items.iter().all(|item| item.name.starts_with("Product ")));

    assert_eq!(inventory_of(&state, mug).await?, 8);
    assert_eq!(inventory_of(&state, cap).await?, 3);
    assert_eq!(reserved_flags(&state, placed.order.id).await?, vec![true, true]);

    let cart = cart_service::get_cart(&state, &owner).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn short_stock_is_not_decremented() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let owner = CartOwner::Guest(unique("guest"));
    let scarce = create_product(&state, 3000, 1).await?;

    let placed = order_service::create_order(&state, None, &owner, order_request(&[(scarce, 3000, 3)]))
        .await?
        .data
        .expect("order");

    assert!(placed.order.user_id.is_none());
    assert_eq!(placed.items.len(), 1);
    assert_eq!(inventory_of(&state, scarce).await?, 1);
    assert_eq!(reserved_flags(&state, placed.order.id).await?, vec![false]);
    Ok(())
}

#[tokio::test]
async fn invalid_orders_are_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let owner = CartOwner::Guest(unique("guest"));

    let err = order_service::create_order(&state, None, &owner, order_request(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = order_service::create_order(&state, None, &owner, order_request(&[(i64::MAX, 100, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn shoppers_see_and_cancel_only_their_orders() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let owner = CartOwner::User(user.user_id);
    let product = create_product(&state, 2000, 5).await?;

    let placed = order_service::create_order(&state, Some(&user), &owner, order_request(&[(product, 2000, 2)]))
        .await?
        .data
        .expect("order");
    assert_eq!(inventory_of(&state, product).await?, 3);

    let listed = order_service::list_orders(&state, &user, OrderListQuery::default()).await?;
    assert_eq!(listed.meta.and_then(|m| m.total), Some(1));

    let err = order_service::get_order(&state, &stranger, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = order_service::cancel_order(&state, &stranger, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let cancelled = order_service::cancel_order(&state, &user, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(inventory_of(&state, product).await?, 5);

    // Already cancelled: no second restore.
    let err = order_service::cancel_order(&state, &user, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(inventory_of(&state, product).await?, 5);
    Ok(())
}

#[tokio::test]
async fn admin_manages_orders_and_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let shopper = create_user(&state, "user").await?;
    let owner = CartOwner::User(shopper.user_id);
    let product = create_product(&state, 5000, 6).await?;

    let placed = order_service::create_order(&state, Some(&shopper), &owner, order_request(&[(product, 5000, 4)]))
        .await?
        .data
        .expect("order");
    assert_eq!(inventory_of(&state, product).await?, 2);

    let err = admin_service::get_order_admin(&state, &shopper, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let paid = admin_service::update_payment_status(
        &state,
        &admin,
        placed.order.id,
        UpdatePaymentStatusRequest {
            payment_status: PaymentStatus::Paid,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(paid.order.payment_status, "paid");
    assert!(paid.order.paid_at.is_some());

    let shipped = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.order.status, "shipped");
    assert_eq!(inventory_of(&state, product).await?, 2);

    admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await?;
    assert_eq!(inventory_of(&state, product).await?, 6);

    let err = admin_service::update_order_status(
        &state,
        &admin,
        Uuid::new_v4(),
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn admin_inventory_and_analytics() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let empty = create_product(&state, 100, 0).await?;

    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            threshold: Some(0),
            per_page: Some(100),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert!(low.items.iter().any(|p| p.id == empty));
    assert!(low.items.iter().all(|p| p.inventory <= 0));

    let restocked = admin_service::adjust_inventory(&state, &admin, empty, InventoryAdjustRequest { delta: 7 })
        .await?
        .data
        .expect("product");
    assert_eq!(restocked.inventory, 7);

    let err = admin_service::adjust_inventory(&state, &admin, empty, InventoryAdjustRequest { delta: -8 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(inventory_of(&state, empty).await?, 7);

    let err = admin_service::adjust_inventory(&state, &admin, empty, InventoryAdjustRequest { delta: i32::MAX })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(inventory_of(&state, empty).await?, 7);

    let summary = admin_service::analytics(&state, &admin).await?.data.expect("summary");
    assert!(summary.product_count >= 1);
    assert!(summary.revenue >= 0);
    assert!(summary.recent_orders.len() <= 5);
    assert!(summary.top_products.len() <= 5);
    Ok(())
}
