use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};

use crate::{
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest},
    error::AppResult,
    extract::AppJson,
    middleware::cart_owner::{GUEST_COOKIE, read_cookie},
    models::User,
    response::{ApiResponse, Created},
    services::{
        auth_service::{login_user, register_user},
        cart_service::merge_guest_cart,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Invalid input or email taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Created<User>> {
    let resp = register_user(&state, payload).await?;
    Ok(Created(resp))
}

/// A guest cart carried in the cookie is folded into the user's cart.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = login_user(&state, payload).await?;

    if let (Some(guest_id), Some(data)) = (read_cookie(&headers, GUEST_COOKIE), resp.data.as_ref()) {
        if let Err(err) = merge_guest_cart(&state, data.user.id, &guest_id).await {
            tracing::warn!(error = %err, "guest cart merge failed");
        }
    }
    Ok(Json(resp))
}
