use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit::record,
    dto::users::{UpdateProfileRequest, UpdateRoleRequest, UserList},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    forms::like_pattern,
    middleware::auth::{AuthUser, ensure_admin},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    services::auth_service::{hash_password, validate_password, verify_password},
    state::AppState,
};

const ROLES: [&str; 2] = ["user", "admin"];

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let profile = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Profile", profile, Some(Meta::empty())))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let password_hash = match payload.new_password.as_deref() {
        Some(new_password) => {
            let current = payload.current_password.as_deref().ok_or_else(|| {
                AppError::BadRequest("currentPassword is required to change password".into())
            })?;
            if !verify_password(current, &existing.password_hash)? {
                return Err(AppError::BadRequest("Current password is incorrect".into()));
            }
            validate_password(new_password)?;
            Some(hash_password(new_password)?)
        }
        None => None,
    };

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        let phone = phone.trim().to_string();
        active.phone = Set((!phone.is_empty()).then_some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set((!address.is_null()).then_some(address));
    }
    let changed_password = password_hash.is_some();
    if let Some(hash) = password_hash {
        active.password_hash = Set(hash);
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    record(
        &state.pool,
        Some(user.user_id),
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id, "password_changed": changed_password }),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(state, user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(UserCol::Name).ilike(pattern.clone()))
                .add(Expr::col(UserCol::Email).ilike(pattern)),
        );
    }
    if let Some(role) = query.role.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(UserCol::Role.eq(role.clone()));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(state, user)?;
    let role = payload.role.trim().to_lowercase();
    if !ROLES.contains(&role.as_str()) {
        return Err(AppError::BadRequest("role must be `user` or `admin`".into()));
    }

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    active.role = Set(role.clone());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    record(
        &state.pool,
        Some(user.user_id),
        "user_role_update",
        "users",
        serde_json::json!({ "user_id": id, "role": role }),
    )
    .await;

    Ok(ApiResponse::success(
        "User updated",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        password_hash: model.password_hash,
        role: model.role,
        phone: model.phone,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
