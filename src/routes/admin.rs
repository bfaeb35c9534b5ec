use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{AnalyticsSummary, InventoryAdjustRequest},
        categories::CategoryForm,
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest, UpdatePaymentStatusRequest},
        products::{ProductDetail, ProductForm, ProductList},
        users::{UpdateRoleRequest, UserList},
    },
    error::AppResult,
    extract::{AppJson, AppQuery},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, User},
    response::{ApiResponse, Created},
    routes::params::{LowStockQuery, OrderListQuery, ProductQuery, UserListQuery},
    services::{admin_service, category_service, product_service, user_service},
    state::AppState,
    uploads::MultipartForm,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/users", get(list_users))
        .route("/users/{id}/role", patch(update_user_role))
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/orders/{id}/payment-status", patch(update_payment_status))
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/{id}", patch(adjust_inventory))
        .route("/analytics", get(analytics))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "All products, unpublished included", body = ApiResponse<ProductList>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    ensure_admin(&state, &user)?;
    let resp = product_service::list_products(&state, query, true).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    params(
        ("id" = String, Path, description = "Product id or slug")
    ),
    responses(
        (status = 200, description = "Any product", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    ensure_admin(&state, &user)?;
    let resp = product_service::get_product(&state, &id, true).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body(content_type = "multipart/form-data", description = "Product fields plus `images` files"),
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid form or duplicate slug"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Created<Product>> {
    ensure_admin(&state, &user)?;
    let form = MultipartForm::collect(multipart).await?;
    let form = ProductForm::from_multipart(&form)?;
    let resp = product_service::create_product(&state, &user, form).await?;
    Ok(Created(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body(content_type = "multipart/form-data", description = "Fields to change plus new `images` files"),
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 400, description = "Invalid form or duplicate slug"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    ensure_admin(&state, &user)?;
    let form = MultipartForm::collect(multipart).await?;
    let form = ProductForm::from_multipart(&form)?;
    let resp = product_service::update_product(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body(content_type = "multipart/form-data", description = "Category fields plus an `image` file"),
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Invalid form or duplicate slug"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Created<Category>> {
    ensure_admin(&state, &user)?;
    let form = MultipartForm::collect(multipart).await?;
    let form = CategoryForm::from_multipart(&form);
    let resp = category_service::create_category(&state, &user, form).await?;
    Ok(Created(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    request_body(content_type = "multipart/form-data", description = "Fields to change plus an optional `image` file"),
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_admin(&state, &user)?;
    let form = MultipartForm::collect(multipart).await?;
    let form = CategoryForm::from_multipart(&form);
    let resp = category_service::update_category(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category deleted; its products are detached", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = category_service::delete_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_users(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<User>),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_role(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get any order with items (admin only)", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/payment-status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Payment status changed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Unknown payment status"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdatePaymentStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::update_payment_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Products at or below the threshold", body = ApiResponse<ProductList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = InventoryAdjustRequest,
    responses(
        (status = 200, description = "Inventory adjusted", body = ApiResponse<Product>),
        (status = 400, description = "Zero delta or negative result"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<InventoryAdjustRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = admin_service::adjust_inventory(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/analytics",
    responses(
        (status = 200, description = "Store summary", body = ApiResponse<AnalyticsSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn analytics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AnalyticsSummary>>> {
    let resp = admin_service::analytics(&state, &user).await?;
    Ok(Json(resp))
}
