use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub address: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub inventory: i32,
    pub category_id: Option<i64>,
    pub images: Vec<String>,
    pub is_featured: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Row id, or a `temp_<productId>_<millis>` placeholder when the row has none.
    pub id: String,
    pub product_id: i64,
    pub quantity: i32,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub inventory: Option<i32>,
    pub image: Option<String>,
    pub is_temporary: bool,
}

impl CartItem {
    pub fn line_total(&self) -> i64 {
        self.sale_price.unwrap_or(self.price) * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_id: Option<String>,
    pub items: Vec<CartItem>,
    pub item_count: i64,
    pub subtotal: i64,
}

impl Cart {
    pub fn new(
        id: Uuid,
        user_id: Option<Uuid>,
        guest_id: Option<String>,
        items: Vec<CartItem>,
    ) -> Self {
        let item_count = items.iter().map(|i| i64::from(i.quantity)).sum();
        let subtotal = items.iter().map(CartItem::line_total).sum();
        Self {
            id,
            user_id,
            guest_id,
            items,
            item_count,
            subtotal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Unpaid,
        PaymentStatus::Paid,
        PaymentStatus::Refunded,
        PaymentStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid payment status `{s}`"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub total: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    #[schema(value_type = Object)]
    pub shipping_address: Value,
    #[schema(value_type = Option<Object>)]
    pub billing_address: Option<Value>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<i64>,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Store-wide configuration document, persisted as one JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSettings {
    pub general: GeneralSettings,
    pub shipping: ShippingSettings,
    pub currencies: CurrencySettings,
    pub languages: LanguageSettings,
    pub layout: LayoutSettings,
    pub notifications: NotificationSettings,
    pub security: SecuritySettings,
    pub products: ProductSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralSettings {
    pub store_name: String,
    pub store_email: String,
    pub store_phone: Option<String>,
    pub store_address: Option<String>,
    pub logo: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            store_name: "Storefront".to_string(),
            store_email: "store@example.com".to_string(),
            store_phone: None,
            store_address: None,
            logo: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingSettings {
    pub flat_rate: i64,
    pub enable_free_shipping: bool,
    pub free_shipping_threshold: i64,
    pub international_shipping: bool,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            flat_rate: 500,
            enable_free_shipping: true,
            free_shipping_threshold: 5000,
            international_shipping: false,
        }
    }
}

impl ShippingSettings {
    pub fn cost_for(&self, subtotal: i64) -> i64 {
        if self.enable_free_shipping && subtotal >= self.free_shipping_threshold {
            0
        } else {
            self.flat_rate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrencySettings {
    pub default_currency: String,
    pub enabled: Vec<Currency>,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            enabled: vec![Currency {
                code: "USD".to_string(),
                symbol: "$".to_string(),
                rate: 1.0,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LanguageSettings {
    pub default_language: String,
    pub enabled: Vec<String>,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            enabled: vec!["en".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutSettings {
    pub theme: String,
    pub show_featured: bool,
    pub products_per_page: i64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            show_featured: true,
            products_per_page: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub order_confirmation: bool,
    pub low_stock_alert: bool,
    pub low_stock_threshold: i32,
    pub admin_email: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            order_confirmation: true,
            low_stock_alert: true,
            low_stock_threshold: 5,
            admin_email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SecuritySettings {
    pub allow_guest_checkout: bool,
    pub session_timeout_minutes: i64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            allow_guest_checkout: true,
            session_timeout_minutes: 1440,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductSettings {
    pub show_out_of_stock: bool,
    /// Percentage applied to the subtotal, e.g. `8.5`.
    pub tax_rate: f64,
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            show_out_of_stock: true,
            tax_rate: 0.0,
        }
    }
}

impl ProductSettings {
    pub fn tax_for(&self, subtotal: i64) -> i64 {
        (subtotal as f64 * self.tax_rate / 100.0).round() as i64
    }
}
