use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{Category, Product},
    uploads::{MultipartForm, UploadedFile},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<CategoryWithCount>)]
    pub items: Vec<CategoryWithCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetail {
    pub category: Category,
    pub products: Vec<Product>,
}

/// Category fields from a multipart admin form.
#[derive(Debug, Default)]
pub struct CategoryForm {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<UploadedFile>,
}

impl CategoryForm {
    pub fn from_multipart(form: &MultipartForm) -> Self {
        Self {
            name: form.text("name"),
            slug: form.text("slug"),
            description: form.fields.get("description").map(|d| d.trim().to_string()),
            image: form.files_named("image").next().cloned(),
        }
    }
}
