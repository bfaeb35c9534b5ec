use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;

use crate::{
    audit::record,
    dto::{
        cart::ProductRef,
        products::{ProductDetail, ProductForm, ProductList},
    },
    entity::{
        categories::{Column as CatCol, Entity as Categories},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    forms::{like_pattern, slugify},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::category_service::{category_from_entity, slug_conflict},
    state::AppState,
    uploads::{UploadKind, decode_images, discard_uploads, encode_images, save_uploads},
};

/// Lists products; the storefront sees published rows only.
pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
    include_unpublished: bool,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if !include_unpublished {
        condition = condition.add(Column::IsPublished.eq(true));
    }

    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(slug) = query.category.as_ref().filter(|s| !s.is_empty()) {
        let category = Categories::find()
            .filter(CatCol::Slug.eq(slug.as_str()))
            .one(&state.orm)
            .await?;
        match category {
            Some(category) => condition = condition.add(Column::CategoryId.eq(category.id)),
            None => {
                return Ok(ApiResponse::success(
                    "Products",
                    ProductList { items: Vec::new() },
                    Some(Meta::new(page, limit, 0)),
                ));
            }
        }
    }

    if let Some(featured) = query.featured {
        condition = condition.add(Column::IsFeatured.eq(featured));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

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
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Looks a product up by numeric id or slug. Unpublished rows are hidden unless `include_unpublished`.
pub async fn get_product(
    state: &AppState,
    id_or_slug: &str,
    include_unpublished: bool,
) -> AppResult<ApiResponse<ProductDetail>> {
    let product = resolve_product(state, &ProductRef::Text(id_or_slug.to_string()))
        .await?
        .filter(|p| include_unpublished || p.is_published)
        .ok_or(AppError::NotFound)?;

    let category = match product.category_id {
        Some(category_id) => Categories::find_by_id(category_id)
            .one(&state.orm)
            .await?
            .map(category_from_entity),
        None => None,
    };

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product: product_from_entity(product),
            category,
        },
        None,
    ))
}

/// Resolves a client product reference: text is tried as a slug first, then as an integer id.
pub async fn resolve_product(
    state: &AppState,
    product_ref: &ProductRef,
) -> AppResult<Option<ProductModel>> {
    if let Some(text) = product_ref.as_text() {
        let by_slug = Products::find()
            .filter(Column::Slug.eq(text))
            .one(&state.orm)
            .await?;
        if by_slug.is_some() {
            return Ok(by_slug);
        }
    }
    match product_ref.as_id() {
        Some(id) => Ok(Products::find_by_id(id).one(&state.orm).await?),
        None => Ok(None),
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(state, user)?;
    let name = form
        .name
        .ok_or_else(|| AppError::BadRequest("name is required".into()))?;
    let price = form
        .price
        .ok_or_else(|| AppError::BadRequest("price is required".into()))?;
    let slug = slugify(form.slug.as_deref().unwrap_or(&name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("slug must contain letters or digits".into()));
    }
    let sale_price = form.sale_price.flatten();
    validate_sale_price(price, sale_price)?;
    let category_id = form.category_id.flatten();
    ensure_category_exists(state, category_id).await?;

    let saved = save_uploads(&state.config.upload_dir, UploadKind::Products, &form.new_images).await?;
    let mut images = form.existing_images.unwrap_or_default();
    images.extend(saved.iter().cloned());

    let active = ActiveModel {
        id: NotSet,
        name: Set(name),
        slug: Set(slug),
        description: Set(form.description.filter(|d| !d.is_empty())),
        price: Set(price),
        sale_price: Set(sale_price),
        inventory: Set(form.inventory.unwrap_or(0)),
        category_id: Set(category_id),
        images: Set(encode_images(&images)),
        is_featured: Set(form.is_featured.unwrap_or(false)),
        is_published: Set(form.is_published.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = match active.insert(&state.orm).await {
        Ok(product) => product,
        Err(err) => {
            discard_uploads(&state.config.upload_dir, &saved).await;
            return Err(slug_conflict(err));
        }
    };

    record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(state, user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let price = form.price.unwrap_or(existing.price);
    let sale_price = match form.sale_price {
        Some(sale_price) => sale_price,
        None => existing.sale_price,
    };
    validate_sale_price(price, sale_price)?;
    if let Some(category_id) = form.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let mut images = form
        .existing_images
        .unwrap_or_else(|| decode_images(&existing.images));

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
    active.price = Set(price);
    active.sale_price = Set(sale_price);
    if let Some(inventory) = form.inventory {
        active.inventory = Set(inventory);
    }
    if let Some(category_id) = form.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(featured) = form.is_featured {
        active.is_featured = Set(featured);
    }
    if let Some(published) = form.is_published {
        active.is_published = Set(published);
    }
    let saved = save_uploads(&state.config.upload_dir, UploadKind::Products, &form.new_images).await?;
    images.extend(saved.iter().cloned());
    active.images = Set(encode_images(&images));
    active.updated_at = Set(Utc::now().into());

    let product = match active.update(&state.orm).await {
        Ok(product) => product,
        Err(err) => {
            discard_uploads(&state.config.upload_dir, &saved).await;
            return Err(slug_conflict(err));
        }
    };

    record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(state, user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_sale_price(price: i64, sale_price: Option<i64>) -> AppResult<()> {
    if sale_price.is_some_and(|sale| sale > price) {
        return Err(AppError::BadRequest(
            "salePrice must not exceed price".into(),
        ));
    }
    Ok(())
}

async fn ensure_category_exists(state: &AppState, category_id: Option<i64>) -> AppResult<()> {
    if let Some(category_id) = category_id {
        let found = Categories::find_by_id(category_id).one(&state.orm).await?;
        if found.is_none() {
            return Err(AppError::BadRequest(format!(
                "category {category_id} does not exist"
            )));
        }
    }
    Ok(())
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        description: model.description,
        price: model.price,
        sale_price: model.sale_price,
        inventory: model.inventory,
        category_id: model.category_id,
        images: decode_images(&model.images),
        is_featured: model.is_featured,
        is_published: model.is_published,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
