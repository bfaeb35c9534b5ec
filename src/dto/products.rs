use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    forms::{parse_bool, parse_int, parse_money},
    models::{Category, Product},
    uploads::{MultipartForm, UploadedFile, decode_images},
};

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub category: Option<Category>,
}

/// Product fields from a multipart admin form. `None` means the field was not sent.
///
/// Money fields are decimal currency units (`"19.99"`) and stored as minor units.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    /// `Some(None)` clears the sale price.
    pub sale_price: Option<Option<i64>>,
    pub inventory: Option<i32>,
    /// `Some(None)` detaches the product from its category.
    pub category_id: Option<Option<i64>>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
    /// Previously stored image paths to keep (update only).
    pub existing_images: Option<Vec<String>>,
    pub new_images: Vec<UploadedFile>,
}

impl ProductForm {
    pub fn from_multipart(form: &MultipartForm) -> AppResult<Self> {
        let price = form
            .text("price")
            .map(|raw| parse_money("price", &raw))
            .transpose()?;
        let sale_price = match form.fields.get("salePrice") {
            None => None,
            Some(raw) if raw.trim().is_empty() => Some(None),
            Some(raw) => Some(Some(parse_money("salePrice", raw)?)),
        };
        let inventory = form
            .text("inventory")
            .map(|raw| parse_int::<i32>("inventory", &raw))
            .transpose()?;
        if inventory.is_some_and(|n| n < 0) {
            return Err(AppError::BadRequest("inventory must not be negative".into()));
        }
        let category_id = match form.fields.get("categoryId") {
            None => None,
            Some(raw) if raw.trim().is_empty() => Some(None),
            Some(raw) => Some(Some(parse_int::<i64>("categoryId", raw)?)),
        };

        Ok(Self {
            name: form.text("name"),
            slug: form.text("slug"),
            description: form.fields.get("description").map(|d| d.trim().to_string()),
            price,
            sale_price,
            inventory,
            category_id,
            is_featured: form.fields.get("isFeatured").map(|v| parse_bool(v)),
            is_published: form.fields.get("isPublished").map(|v| parse_bool(v)),
            existing_images: form.fields.get("existingImages").map(|v| decode_images(v)),
            new_images: form.files_named("images").cloned().collect(),
        })
    }
}
