use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit::record,
    dto::{
        admin::{AnalyticsSummary, InventoryAdjustRequest, StatusCount, TopProduct},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest, UpdatePaymentStatusRequest},
        products::ProductList,
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderStatus, PaymentStatus, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery, SortOrder},
    services::{
        order_service::{load_items, order_from_entity, restore_inventory},
        product_service::product_from_entity,
        settings_service::load_settings,
    },
    state::AppState,
};

const TOP_PRODUCTS: i64 = 5;
const RECENT_ORDERS: u64 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(state, user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(state, user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity)
        .ok_or(AppError::NotFound)?;
    let items = load_items(state, order.id).await?;

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Moving an order into `cancelled` hands its reserved stock back.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(state, user)?;

    let mut tx = state.pool.begin().await?;
    let current: Option<(String,)> =
        sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let (current,) = current.ok_or(AppError::NotFound)?;

    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(payload.status.as_str())
        .execute(&mut *tx)
        .await?;
    if payload.status == OrderStatus::Cancelled && current != OrderStatus::Cancelled.as_str() {
        let restored = restore_inventory(&mut tx, id).await?;
        tracing::info!(order_id = %id, restored, "restored inventory for cancelled order");
    }
    tx.commit().await?;

    record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "from": current, "to": payload.status.as_str() }),
    )
    .await;

    get_order_admin(state, user, id).await.map(|mut response| {
        response.message = "Order updated".into();
        response
    })
}

pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(state, user)?;
    let status = payload.payment_status;

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = $2,
            paid_at = CASE
                WHEN $2 = 'paid' THEN COALESCE(paid_at, now())
                WHEN $2 = 'unpaid' THEN NULL
                ELSE paid_at
            END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    record(
        &state.pool,
        Some(user.user_id),
        "order_payment_update",
        "orders",
        serde_json::json!({ "order_id": id, "payment_status": status.as_str() }),
    )
    .await;
    if status == PaymentStatus::Paid {
        tracing::info!(order_id = %id, "order marked paid");
    }

    get_order_admin(state, user, id).await.map(|mut response| {
        response.message = "Payment status updated".into();
        response
    })
}

/// Products at or under the threshold, emptiest first.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(state, user)?;
    let threshold = match query.threshold {
        Some(threshold) => threshold,
        None => load_settings(&state.pool).await?.notifications.low_stock_threshold,
    };
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Inventory.lte(threshold))
        .order_by_asc(ProdCol::Inventory)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(state, user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let inventory = product
        .inventory
        .checked_add(payload.delta)
        .filter(|inventory| *inventory >= 0)
        .ok_or_else(|| AppError::BadRequest("inventory out of range".into()))?;

    let mut active: ProductActive = product.into();
    active.inventory = Set(inventory);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    record(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        product_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn analytics(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AnalyticsSummary>> {
    ensure_admin(state, user)?;
    let threshold = load_settings(&state.pool)
        .await?
        .notifications
        .low_stock_threshold;

    let (revenue, order_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total) FILTER (WHERE status <> 'cancelled'), 0)::bigint,
               COUNT(*)
        FROM orders
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(&state.pool)
    .await?;

    let (customer_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'user'")
            .fetch_one(&state.pool)
            .await?;

    let (product_count, low_stock_count): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE inventory <= $1) FROM products",
    )
    .bind(threshold)
    .fetch_one(&state.pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT oi.product_id,
               MAX(oi.name) AS name,
               SUM(oi.quantity)::bigint AS units_sold,
               SUM(oi.price * oi.quantity)::bigint AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status <> 'cancelled'
        GROUP BY oi.product_id
        ORDER BY units_sold DESC, revenue DESC
        LIMIT $1
        "#,
    )
    .bind(TOP_PRODUCTS)
    .fetch_all(&state.pool)
    .await?;

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Analytics",
        AnalyticsSummary {
            revenue,
            order_count,
            orders_by_status,
            customer_count,
            product_count,
            low_stock_count,
            top_products,
            recent_orders,
        },
        Some(Meta::empty()),
    ))
}
