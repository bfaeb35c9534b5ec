use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
};

use crate::{
    dto::cart::{AddToCartRequest, DirectUpdateRequest, UpdateCartItemRequest},
    error::AppResult,
    extract::AppJson,
    middleware::cart_owner::CartOwner,
    models::Cart,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

type CartResponse = (HeaderMap, Json<ApiResponse<Cart>>);

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_cart)
                .post(add_to_cart)
                .put(update_cart_item)
                .delete(clear_cart),
        )
        .route("/direct-update", post(direct_update))
        .route("/{item_id}", delete(remove_cart_item))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart, created on first use", body = ApiResponse<Cart>)
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, owner: CartOwner) -> AppResult<CartResponse> {
    let resp = cart_service::get_cart(&state, &owner).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or incremented", body = ApiResponse<Cart>),
        (status = 400, description = "Invalid quantity or not enough stock"),
        (status = 404, description = "Product not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    owner: CartOwner,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> AppResult<CartResponse> {
    let resp = cart_service::add_to_cart(&state, &owner, payload).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/cart",
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity set; 0 removes the item", body = ApiResponse<Cart>),
        (status = 400, description = "Negative quantity or not enough stock"),
        (status = 404, description = "Cart item not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    owner: CartOwner,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> AppResult<CartResponse> {
    let resp = cart_service::update_item(&state, &owner, payload).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart/direct-update",
    request_body = DirectUpdateRequest,
    responses(
        (status = 200, description = "Quantity set, locating the item by temporary id or product", body = ApiResponse<Cart>),
        (status = 400, description = "Negative quantity or not enough stock"),
        (status = 404, description = "Cart item not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn direct_update(
    State(state): State<AppState>,
    owner: CartOwner,
    AppJson(payload): AppJson<DirectUpdateRequest>,
) -> AppResult<CartResponse> {
    let resp = cart_service::direct_update(&state, &owner, payload).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{item_id}",
    params(
        ("item_id" = String, Path, description = "Cart item id or temporary id")
    ),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<Cart>),
        (status = 404, description = "Cart item not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    owner: CartOwner,
    Path(item_id): Path<String>,
) -> AppResult<CartResponse> {
    let resp = cart_service::remove_item(&state, &owner, &item_id).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "All items removed", body = ApiResponse<Cart>)
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    owner: CartOwner,
) -> AppResult<CartResponse> {
    let resp = cart_service::clear_cart(&state, &owner).await?;
    Ok((owner.cookie_headers(), Json(resp)))
}
