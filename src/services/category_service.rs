use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use sqlx::FromRow;

use crate::{
    audit::record,
    dto::categories::{CategoryDetail, CategoryForm, CategoryList, CategoryWithCount},
    entity::{
        categories::{ActiveModel, Column, Entity as Categories, Model as CategoryModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    forms::slugify,
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
    uploads::{UploadKind, discard_uploads, save_upload},
};

#[derive(FromRow)]
struct CategoryCountRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_count: i64,
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let rows = sqlx::query_as::<_, CategoryCountRow>(
        r#"
        SELECT c.id, c.name, c.slug, c.description, c.image, c.created_at, c.updated_at,
               COUNT(p.id) FILTER (WHERE p.is_published) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id
        GROUP BY c.id
        ORDER BY c.name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .map(|row| CategoryWithCount {
            category: Category {
                id: row.id,
                name: row.name,
                slug: row.slug,
                description: row.description,
                image: row.image,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            product_count: row.product_count,
        })
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Category by slug with its published products.
pub async fn get_category(state: &AppState, slug: &str) -> AppResult<ApiResponse<CategoryDetail>> {
    let category = Categories::find()
        .filter(Column::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let products = Products::find()
        .filter(ProdCol::CategoryId.eq(category.id))
        .filter(ProdCol::IsPublished.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Category",
        CategoryDetail {
            category: category_from_entity(category),
            products,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    form: CategoryForm,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(state, user)?;
    let name = form
        .name
        .ok_or_else(|| AppError::BadRequest("name is required".into()))?;
    let slug = slugify(form.slug.as_deref().unwrap_or(&name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("slug must contain letters or digits".into()));
    }

    let image = match &form.image {
        Some(file) => Some(save_upload(&state.config.upload_dir, UploadKind::Categories, file).await?),
        None => None,
    };

    let active = ActiveModel {
        id: NotSet,
        name: Set(name),
        slug: Set(slug),
        description: Set(form.description.filter(|d| !d.is_empty())),
        image: Set(image.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let category = match active.insert(&state.orm).await {
        Ok(category) => category,
        Err(err) => {
            if let Some(path) = image {
                discard_uploads(&state.config.upload_dir, &[path]).await;
            }
            return Err(slug_conflict(err));
        }
    };

    record(
        &state.pool,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    form: CategoryForm,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(state, user)?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = form.name {
        active.name = Set(name);
    }
    if let Some(slug) = form.slug {
        let slug = slugify(&slug);
        if slug.is_empty() {
            return Err(AppError::BadRequest("slug must contain letters or digits".into()));
        }
        active.slug = Set(slug);
    }
    if let Some(description) = form.description {
        active.description = Set((!description.is_empty()).then_some(description));
    }
    let image = match &form.image {
        Some(file) => Some(save_upload(&state.config.upload_dir, UploadKind::Categories, file).await?),
        None => None,
    };
    if let Some(path) = &image {
        active.image = Set(Some(path.clone()));
    }
    active.updated_at = Set(Utc::now().into());
    let category = match active.update(&state.orm).await {
        Ok(category) => category,
        Err(err) => {
            if let Some(path) = image {
                discard_uploads(&state.config.upload_dir, &[path]).await;
            }
            return Err(slug_conflict(err));
        }
    };

    record(
        &state.pool,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category updated",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(state, user)?;
    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    record(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub(crate) fn slug_conflict(err: sea_orm::DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::BadRequest("slug is already in use".into())
        }
        _ => AppError::OrmError(err),
    }
}

pub(crate) fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        slug: model.slug,
        description: model.description,
        image: model.image,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
