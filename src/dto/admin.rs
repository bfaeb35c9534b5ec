use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Order;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: Option<i64>,
    pub name: String,
    pub units_sold: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Sum of order totals, cancelled orders excluded.
    pub revenue: i64,
    pub order_count: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub customer_count: i64,
    pub product_count: i64,
    pub low_stock_count: i64,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<Order>,
}

