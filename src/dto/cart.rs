use std::fmt;

use serde::Deserialize;
use utoipa::ToSchema;

/// Product reference as sent by clients: a numeric id, numeric text, or a slug.
#[derive(Debug, Clone, Deserialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum ProductRef {
    Id(i64),
    Text(String),
}

impl ProductRef {
    /// Integer id, parsing text when needed.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            ProductRef::Id(id) => Some(*id),
            ProductRef::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ProductRef::Id(_) => None,
            ProductRef::Text(text) => Some(text.trim()),
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductRef::Id(id) => write!(f, "{id}"),
            ProductRef::Text(text) => f.write_str(text.trim()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductRef,
    #[serde(default)]
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub item_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectUpdateRequest {
    pub item_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub product_id: Option<ProductRef>,
}
