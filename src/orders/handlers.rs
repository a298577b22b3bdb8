use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateOrderRequest, CreatedOrderResponse, OrderDetails};
use super::services;
use crate::{error::ApiError, state::AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order))
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<CreatedOrderResponse>, ApiError> {
    let order = services::create_order(&state, payload).await?;
    Ok(Json(CreatedOrderResponse {
        message: "Order created".into(),
        order_id: order.id,
    }))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetails>, ApiError> {
    Ok(Json(services::get_order(&state, order_id).await?))
}
