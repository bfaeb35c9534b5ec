use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    dto::cart::ProductRef,
    models::{Order, OrderItem, OrderStatus, PaymentStatus},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: ProductRef,
    #[serde(default)]
    pub name: Option<String>,
    /// Unit price in minor units as shown to the shopper.
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub customer: CustomerInfo,
    #[schema(value_type = Object)]
    pub shipping_address: Value,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub billing_address: Option<Value>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub subtotal: Option<i64>,
    #[serde(default)]
    pub shipping: Option<i64>,
    #[serde(default)]
    pub tax: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

fn default_payment_method() -> String {
    "cash_on_delivery".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}
