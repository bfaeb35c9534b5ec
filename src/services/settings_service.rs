use serde_json::Value;

use crate::{
    audit::record,
    db::DbPool,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::StoreSettings,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Stored settings, or defaults when nothing has been saved yet.
pub async fn load_settings(pool: &DbPool) -> AppResult<StoreSettings> {
    let row: Option<(Value,)> = sqlx::query_as("SELECT data FROM settings WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some((data,)) => settings_from_value(data),
        None => StoreSettings::default(),
    })
}

/// Missing sections and fields fall back to defaults; an unreadable document is replaced by them.
pub fn settings_from_value(data: Value) -> StoreSettings {
    serde_json::from_value(data).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "stored settings unreadable, using defaults");
        StoreSettings::default()
    })
}

pub async fn get_settings(state: &AppState) -> AppResult<ApiResponse<StoreSettings>> {
    let settings = load_settings(&state.pool).await?;
    Ok(ApiResponse::success("Settings", settings, Some(Meta::empty())))
}

pub async fn update_settings(
    state: &AppState,
    user: &AuthUser,
    settings: StoreSettings,
) -> AppResult<ApiResponse<StoreSettings>> {
    ensure_admin(state, user)?;
    let data = serde_json::to_value(&settings)
        .map_err(|e| anyhow::anyhow!("serialize settings: {e}"))?;

    let (stored,): (Value,) = sqlx::query_as(
        r#"
        INSERT INTO settings (id, data, updated_at)
        VALUES (1, $1, now())
        ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
        RETURNING data
        "#,
    )
    .bind(data)
    .fetch_one(&state.pool)
    .await?;

    record(
        &state.pool,
        Some(user.user_id),
        "settings_update",
        "settings",
        serde_json::json!({}),
    )
    .await;

    Ok(ApiResponse::success(
        "Settings updated",
        settings_from_value(stored),
        Some(Meta::empty()),
    ))
}
