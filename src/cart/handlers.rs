use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::dto::AddToCartRequest;
use super::services;
use crate::{error::ApiError, state::AppState, users::dto::MessageResponse};

pub fn cart_routes() -> Router<AppState> {
    Router::new().route("/cart/add", post(add_to_cart))
}

#[instrument(skip(state, payload))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<AddToCartRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::add_to_cart(&state, payload).await?;
    Ok(Json(MessageResponse::new("Added to cart")))
}
