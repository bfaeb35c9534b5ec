use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::AppResult,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::StoreSettings,
    response::ApiResponse,
    services::settings_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Store settings, defaults when never saved", body = ApiResponse<StoreSettings>)
    ),
    tag = "Settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<StoreSettings>>> {
    let resp = settings_service::get_settings(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = StoreSettings,
    responses(
        (status = 200, description = "Settings replaced", body = ApiResponse<StoreSettings>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<StoreSettings>,
) -> AppResult<Json<ApiResponse<StoreSettings>>> {
    let resp = settings_service::update_settings(&state, &user, payload).await?;
    Ok(Json(resp))
}
