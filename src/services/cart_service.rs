use chrono::Utc;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::record,
    cart_rows::{normalize_cart_items, parse_temp_item_id},
    db::DbPool,
    dto::cart::{AddToCartRequest, DirectUpdateRequest, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::cart_owner::CartOwner,
    models::Cart,
    response::{ApiResponse, Meta},
    services::product_service::resolve_product,
    state::AppState,
};

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_id: Option<String>,
    items: Option<Value>,
}

#[derive(FromRow)]
struct CartLine {
    id: Uuid,
    product_id: i64,
    inventory: i32,
}

/// How a request names a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTarget {
    Row(Uuid),
    /// Temporary ids only carry the product.
    Product(i64),
}

impl ItemTarget {
    /// `None` when the id can name neither a row nor a product.
    pub fn parse(item_id: &str) -> Option<Self> {
        let item_id = item_id.trim();
        if let Some(product_id) = parse_temp_item_id(item_id) {
            return Some(ItemTarget::Product(product_id));
        }
        Uuid::parse_str(item_id).ok().map(ItemTarget::Row)
    }
}

// Items aggregate to `[null]` for an empty cart; normalize_cart_items drops those.
const CART_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.guest_id,
           json_agg(
               CASE WHEN ci.product_id IS NULL THEN NULL ELSE json_build_object(
                   'id', ci.id,
                   'productId', ci.product_id,
                   'quantity', ci.quantity,
                   'createdAt', ci.created_at,
                   'name', p.name,
                   'slug', p.slug,
                   'price', p.price,
                   'salePrice', p.sale_price,
                   'inventory', p.inventory,
                   'images', p.images
               ) END
               ORDER BY ci.created_at
           ) AS items
    FROM carts c
    LEFT JOIN cart_items ci ON ci.cart_id = c.id
    LEFT JOIN products p ON p.id = ci.product_id
    WHERE c.user_id = $1 OR c.guest_id = $2
    GROUP BY c.id
    LIMIT 1
"#;

async fn fetch_cart(pool: &DbPool, owner: &CartOwner) -> AppResult<Option<Cart>> {
    let row = sqlx::query_as::<_, CartRow>(CART_SELECT)
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| {
        let items = normalize_cart_items(
            row.items.unwrap_or(Value::Null),
            Utc::now().timestamp_millis(),
        );
        Cart::new(row.id, row.user_id, row.guest_id, items)
    }))
}

async fn cart_id_of(pool: &DbPool, owner: &CartOwner) -> AppResult<Option<Uuid>> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 OR guest_id = $2 LIMIT 1")
            .bind(owner.user_id())
            .bind(owner.guest_id())
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(id,)| id))
}

/// Finds the owner's cart, creating it on first use.
///
/// A failed lookup is logged and treated like a missing cart. Creation relies on
/// the unique owner columns so concurrent first requests end up sharing one row.
pub async fn get_or_create_cart(state: &AppState, owner: &CartOwner) -> AppResult<Cart> {
    match fetch_cart(&state.pool, owner).await {
        Ok(Some(cart)) => return Ok(cart),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "cart lookup failed, creating cart"),
    }

    let created = sqlx::query(
        "INSERT INTO carts (user_id, guest_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .execute(&state.pool)
    .await?;
    if created.rows_affected() > 0 {
        tracing::debug!(owner = ?owner, "created cart");
    }

    fetch_cart(&state.pool, owner)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart missing after insert")))
}

pub async fn get_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<Cart>> {
    let cart = get_or_create_cart(state, owner).await?;
    Ok(ApiResponse::success("Cart", cart, Some(Meta::empty())))
}

pub async fn add_to_cart(
    state: &AppState,
    owner: &CartOwner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = resolve_product(state, &payload.product_id)
        .await?
        .filter(|p| p.is_published)
        .ok_or(AppError::NotFound)?;

    let cart = get_or_create_cart(state, owner).await?;
    let in_cart = cart
        .items
        .iter()
        .find(|item| item.product_id == product.id)
        .map(|item| item.quantity)
        .unwrap_or(0);
    if in_cart
        .checked_add(quantity)
        .is_none_or(|wanted| wanted > product.inventory)
    {
        return Err(AppError::BadRequest(format!(
            "Only {} of {} in stock",
            product.inventory, product.name
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart.id)
    .bind(product.id)
    .bind(quantity)
    .execute(&state.pool)
    .await?;
    touch_cart(&state.pool, cart.id).await?;

    record(
        &state.pool,
        owner.user_id(),
        "cart_add",
        "cart_items",
        serde_json::json!({ "cart_id": cart.id, "product_id": product.id, "quantity": quantity }),
    )
    .await;

    let cart = get_or_create_cart(state, owner).await?;
    Ok(ApiResponse::success("Added to cart", cart, Some(Meta::empty())))
}

/// `PUT /api/cart`: sets a line's quantity; 0 removes the line.
pub async fn update_item(
    state: &AppState,
    owner: &CartOwner,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let target = ItemTarget::parse(&payload.item_id).ok_or(AppError::NotFound)?;
    set_quantity(state, owner, &[target], payload.quantity).await
}

/// `POST /api/cart/direct-update`: like [`update_item`], falling back to `productId`
/// when the item id does not resolve.
pub async fn direct_update(
    state: &AppState,
    owner: &CartOwner,
    payload: DirectUpdateRequest,
) -> AppResult<ApiResponse<Cart>> {
    let mut targets: Vec<ItemTarget> = ItemTarget::parse(&payload.item_id).into_iter().collect();
    if let Some(product_id) = payload.product_id.as_ref().and_then(|p| p.as_id()) {
        targets.push(ItemTarget::Product(product_id));
    }
    if targets.is_empty() {
        return Err(AppError::NotFound);
    }
    set_quantity(state, owner, &targets, payload.quantity).await
}

async fn set_quantity(
    state: &AppState,
    owner: &CartOwner,
    targets: &[ItemTarget],
    quantity: i32,
) -> AppResult<ApiResponse<Cart>> {
    if quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }
    let cart_id = cart_id_of(&state.pool, owner)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut line = None;
    for target in targets {
        line = find_line(&state.pool, cart_id, *target).await?;
        if line.is_some() {
            break;
        }
    }
    let line = line.ok_or(AppError::NotFound)?;

    if quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(line.id)
            .bind(cart_id)
            .execute(&state.pool)
            .await?;
    } else {
        if quantity > line.inventory {
            return Err(AppError::BadRequest(format!(
                "Only {} in stock",
                line.inventory
            )));
        }
        sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = now() WHERE id = $1 AND cart_id = $2",
        )
        .bind(line.id)
        .bind(cart_id)
        .bind(quantity)
        .execute(&state.pool)
        .await?;
    }
    touch_cart(&state.pool, cart_id).await?;

    record(
        &state.pool,
        owner.user_id(),
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_id": cart_id, "product_id": line.product_id, "quantity": quantity }),
    )
    .await;

    let cart = get_or_create_cart(state, owner).await?;
    Ok(ApiResponse::success("Cart updated", cart, Some(Meta::empty())))
}

async fn find_line(pool: &DbPool, cart_id: Uuid, target: ItemTarget) -> AppResult<Option<CartLine>> {
    let line = match target {
        ItemTarget::Row(id) => {
            sqlx::query_as::<_, CartLine>(
                r#"
                SELECT ci.id, ci.product_id, p.inventory
                FROM cart_items ci
                JOIN products p ON p.id = ci.product_id
                WHERE ci.id = $1 AND ci.cart_id = $2
                "#,
            )
            .bind(id)
            .bind(cart_id)
            .fetch_optional(pool)
            .await?
        }
        ItemTarget::Product(product_id) => {
            sqlx::query_as::<_, CartLine>(
                r#"
                SELECT ci.id, ci.product_id, p.inventory
                FROM cart_items ci
                JOIN products p ON p.id = ci.product_id
                WHERE ci.product_id = $1 AND ci.cart_id = $2
                "#,
            )
            .bind(product_id)
            .bind(cart_id)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(line)
}

pub async fn remove_item(
    state: &AppState,
    owner: &CartOwner,
    item_id: &str,
) -> AppResult<ApiResponse<Cart>> {
    let target = ItemTarget::parse(item_id).ok_or(AppError::NotFound)?;
    let cart_id = cart_id_of(&state.pool, owner)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = match target {
        ItemTarget::Row(id) => {
            sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
                .bind(id)
                .bind(cart_id)
                .execute(&state.pool)
                .await?
        }
        ItemTarget::Product(product_id) => {
            sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND cart_id = $2")
                .bind(product_id)
                .bind(cart_id)
                .execute(&state.pool)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    touch_cart(&state.pool, cart_id).await?;

    record(
        &state.pool,
        owner.user_id(),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_id": cart_id, "item_id": item_id }),
    )
    .await;

    let cart = get_or_create_cart(state, owner).await?;
    Ok(ApiResponse::success("Removed from cart", cart, Some(Meta::empty())))
}

pub async fn clear_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<Cart>> {
    let removed = clear_items(&state.pool, owner).await?;
    tracing::debug!(removed, "cleared cart");
    let cart = get_or_create_cart(state, owner).await?;
    Ok(ApiResponse::success("Cart cleared", cart, Some(Meta::empty())))
}

/// Deletes every line in the owner's cart, returning how many went.
pub async fn clear_items(pool: &DbPool, owner: &CartOwner) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM cart_items
        WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1 OR guest_id = $2)
        "#,
    )
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Moves a guest cart's lines into the user's cart and drops the guest cart.
pub async fn merge_guest_cart(state: &AppState, user_id: Uuid, guest_id: &str) -> AppResult<()> {
    let guest = CartOwner::Guest(guest_id.to_string());
    if cart_id_of(&state.pool, &guest).await?.is_none() {
        return Ok(());
    }
    let user_cart = get_or_create_cart(state, &CartOwner::User(user_id)).await?;

    let mut tx = state.pool.begin().await?;
    let merged = sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        SELECT gen_random_uuid(), $1, gi.product_id, gi.quantity
        FROM cart_items gi
        JOIN carts g ON g.id = gi.cart_id
        WHERE g.guest_id = $2
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
        "#,
    )
    .bind(user_cart.id)
    .bind(guest_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM carts WHERE guest_id = $1")
        .bind(guest_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%user_id, lines = merged.rows_affected(), "merged guest cart");
    Ok(())
}

async fn touch_cart(pool: &DbPool, cart_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}
