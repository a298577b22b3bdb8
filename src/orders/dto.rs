use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::{Order, OrderItem};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatedOrderResponse {
    pub message: String,
    pub order_id: i64,
}

/// An order together with its line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub id: i64,
    pub user_id: i64,
    pub total_price: Option<f64>,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub items: Vec<OrderItem>,
}

impl OrderDetails {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
            status: order.status,
            created_at: order.created_at,
            items,
        }
    }
}
