use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreviewItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub company_id: i64,
    pub notes: Option<String>,
    pub items: Vec<PreviewItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub preview_token: String,
}

/// Persisted order as returned to the customer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub id: i64,
    pub order_no: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub final_total: Decimal,
}

impl OrderDetail {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            order_no: order.order_no,
            status: order.status,
            submitted_at: order.submitted_at,
            notes: order.notes,
            items,
            subtotal: order.subtotal,
            total_discount: order.total_discount,
            final_total: order.final_total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
