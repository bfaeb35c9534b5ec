use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde_json::Value;
use sqlx::{Connection, PgConnection};
use uuid::Uuid;

use crate::{
    audit::record,
    dto::orders::{CreateOrderRequest, OrderItemInput, OrderList, OrderWithItems},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult, is_undefined_column},
    middleware::{auth::AuthUser, cart_owner::CartOwner},
    models::{Order, OrderItem, OrderStatus, PaymentStatus, StoreSettings},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, product_service::resolve_product, settings_service::load_settings},
    state::AppState,
};

/// One validated line, ready to insert.
struct PreparedItem {
    product_id: i64,
    name: String,
    price: i64,
    quantity: i32,
}

/// Order totals in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
}

/// Client-supplied totals win; anything missing is derived from the items and store settings.
///
/// Amounts that do not fit in minor units are rejected rather than wrapped.
pub fn compute_totals(
    payload: &CreateOrderRequest,
    settings: &StoreSettings,
) -> AppResult<OrderTotals> {
    let overflow = || AppError::BadRequest("order amount is too large".into());

    let subtotal = match payload.subtotal {
        Some(subtotal) => subtotal,
        None => payload.items.iter().try_fold(0i64, |acc, item| {
            item.price
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| acc.checked_add(line))
                .ok_or_else(overflow)
        })?,
    };
    let shipping = payload
        .shipping
        .unwrap_or_else(|| settings.shipping.cost_for(subtotal));
    let tax = payload
        .tax
        .unwrap_or_else(|| settings.products.tax_for(subtotal));
    let total = match payload.total {
        Some(total) => total,
        None => subtotal
            .checked_add(shipping)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(overflow)?,
    };

    Ok(OrderTotals {
        subtotal,
        shipping,
        tax,
        total,
    })
}

pub fn validate_order(payload: &CreateOrderRequest) -> AppResult<()> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    if let Some(item) = payload.items.iter().find(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest(format!(
            "Invalid quantity {} for product {}",
            item.quantity, item.product_id
        )));
    }
    if payload.items.iter().any(|item| item.price < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    let client_totals = [payload.subtotal, payload.shipping, payload.tax, payload.total];
    if client_totals.into_iter().flatten().any(|amount| amount < 0) {
        return Err(AppError::BadRequest("order totals must not be negative".into()));
    }
    if payload.customer.name.trim().is_empty() {
        return Err(AppError::BadRequest("customer name is required".into()));
    }
    let email = payload.customer.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("customer email is invalid".into()));
    }
    Ok(())
}

/// `ORD-YYYYMMDD-xxxxxxxx`, the suffix taken from the order id.
pub fn build_order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let simple = order_id.simple().to_string();
    format!("ORD-{}-{}", at.format("%Y%m%d"), &simple[..8])
}

pub async fn create_order(
    state: &AppState,
    user: Option<&AuthUser>,
    owner: &CartOwner,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let settings = load_settings(&state.pool).await?;
    if user.is_none() && !settings.security.allow_guest_checkout {
        return Err(AppError::Unauthorized);
    }
    validate_order(&payload)?;

    let mut prepared = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        prepared.push(prepare_item(state, item).await?);
    }

    let totals = compute_totals(&payload, &settings)?;
    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let user_id = user.map(|u| u.user_id);

    let mut order = Order {
        id: order_id,
        order_number: build_order_number(order_id, now),
        user_id,
        subtotal: totals.subtotal,
        shipping_cost: totals.shipping,
        tax: totals.tax,
        total: totals.total,
        status: OrderStatus::Pending.as_str().to_string(),
        payment_status: PaymentStatus::Unpaid.as_str().to_string(),
        payment_method: payload.payment_method.trim().to_string(),
        customer_name: payload.customer.name.trim().to_string(),
        customer_email: payload.customer.email.trim().to_lowercase(),
        customer_phone: payload.customer.phone.filter(|p| !p.trim().is_empty()),
        shipping_address: payload.shipping_address,
        billing_address: payload.billing_address,
        notes: payload.notes.filter(|n| !n.trim().is_empty()),
        paid_at: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = state.pool.begin().await?;
    let created_at = insert_order(&mut tx, &order).await?;
    order.created_at = created_at;
    order.updated_at = created_at;

    let mut items = Vec::with_capacity(prepared.len());
    for line in &prepared {
        let reserved = reserve_inventory(&mut tx, line.product_id, line.quantity).await?;
        if !reserved {
            tracing::warn!(
                order_id = %order.id,
                product_id = line.product_id,
                quantity = line.quantity,
                "insufficient inventory, decrement skipped"
            );
        }

        let item_id = Uuid::new_v4();
        let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
            r#"
            INSERT INTO order_items (id, order_id, product_id, name, price, quantity, inventory_reserved)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(item_id)
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(line.price)
        .bind(line.quantity)
        .bind(reserved)
        .fetch_one(&mut *tx)
        .await?;

        items.push(OrderItem {
            id: item_id,
            order_id: order.id,
            product_id: Some(line.product_id),
            name: line.name.clone(),
            price: line.price,
            quantity: line.quantity,
            created_at,
        });
    }

    tx.commit().await?;
    tracing::info!(order_id = %order.id, order_number = %order.order_number, items = items.len(), "order placed");

    if let Err(err) = cart_service::clear_items(&state.pool, owner).await {
        tracing::warn!(error = %err, order_id = %order.id, "failed to clear cart after order");
    }

    record(
        &state.pool,
        user_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

async fn prepare_item(state: &AppState, item: &OrderItemInput) -> AppResult<PreparedItem> {
    let product = resolve_product(state, &item.product_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Product {} not found", item.product_id)))?;

    let name = item
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or(product.name);

    Ok(PreparedItem {
        product_id: product.id,
        name,
        price: item.price,
        quantity: item.quantity,
    })
}

/// Inserts the order row, retrying with the legacy column set when the table predates the full one.
async fn insert_order(conn: &mut PgConnection, order: &Order) -> AppResult<DateTime<Utc>> {
    let mut savepoint = conn.begin().await?;
    let full = sqlx::query_as::<_, (DateTime<Utc>,)>(
        r#"
        INSERT INTO orders (
            id, order_number, user_id, subtotal, shipping_cost, tax, total, status,
            payment_status, payment_method, customer_name, customer_email, customer_phone,
            shipping_address, billing_address, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING created_at
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.shipping_cost)
    .bind(order.tax)
    .bind(order.total)
    .bind(&order.status)
    .bind(&order.payment_status)
    .bind(&order.payment_method)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(&order.billing_address)
    .bind(&order.notes)
    .fetch_one(&mut *savepoint)
    .await;

    match full {
        Ok((created_at,)) => {
            savepoint.commit().await?;
            Ok(created_at)
        }
        Err(err) if is_undefined_column(&err) => {
            savepoint.rollback().await?;
            tracing::warn!(error = %err, "orders table lacks columns, using legacy insert");
            insert_legacy_order(conn, order).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn insert_legacy_order(conn: &mut PgConnection, order: &Order) -> AppResult<DateTime<Utc>> {
    let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
        r#"
        INSERT INTO orders (
            id, user_id, order_number, total, status,
            customer_name, customer_email, customer_phone, shipping_address
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING created_at
        "#,
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(&order.order_number)
    .bind(order.total)
    .bind(&order.status)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .fetch_one(&mut *conn)
    .await?;
    Ok(created_at)
}

/// Guarded decrement; `false` when stock was short and nothing changed.
async fn reserve_inventory(conn: &mut PgConnection, product_id: i64, quantity: i32) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET inventory = inventory - $2, updated_at = now()
        WHERE id = $1 AND inventory >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts back stock taken by an order's lines. Only lines whose decrement went through count.
pub(crate) async fn restore_inventory(conn: &mut PgConnection, order_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE products p
        SET inventory = p.inventory + oi.quantity, updated_at = now()
        FROM (
            SELECT product_id, SUM(quantity)::int AS quantity
            FROM order_items
            WHERE order_id = $1 AND product_id IS NOT NULL AND inventory_reserved
            GROUP BY product_id
        ) oi
        WHERE p.id = oi.product_id
        "#,
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE order_items SET inventory_reserved = FALSE WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Cancels one of the caller's pending orders and returns its stock.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut tx = state.pool.begin().await?;
    let status: Option<(String,)> =
        sqlx::query_as("SELECT status FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (status,) = status.ok_or(AppError::NotFound)?;
    if status != OrderStatus::Pending.as_str() {
        return Err(AppError::BadRequest(format!(
            "Only pending orders can be cancelled (order is {status})"
        )));
    }

    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(OrderStatus::Cancelled.as_str())
        .execute(&mut *tx)
        .await?;
    let restored = restore_inventory(&mut tx, id).await?;
    tx.commit().await?;
    tracing::info!(order_id = %id, restored, "order cancelled");

    record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(state, id).await?;
    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        subtotal: model.subtotal,
        shipping_cost: model.shipping_cost,
        tax: model.tax,
        total: model.total,
        status: model.status,
        payment_status: model.payment_status,
        payment_method: model.payment_method,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        shipping_address: model.shipping_address,
        billing_address: model.billing_address.filter(|v: &Value| !v.is_null()),
        notes: model.notes,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        price: model.price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
