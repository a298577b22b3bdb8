use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::CreateFoodRequest;
use super::services;
use crate::{error::ApiError, state::AppState, store::Food};

pub fn food_routes() -> Router<AppState> {
    Router::new().route("/foods", get(list_foods).post(add_food))
}

#[instrument(skip(state, payload))]
pub async fn add_food(
    State(state): State<AppState>,
    Json(payload): Json<CreateFoodRequest>,
) -> Result<Json<Food>, ApiError> {
    let food = services::add_food(&state, payload).await?;
    Ok(Json(food))
}

#[instrument(skip(state))]
pub async fn list_foods(State(state): State<AppState>) -> Result<Json<Vec<Food>>, ApiError> {
    Ok(Json(services::list_available(&state).await?))
}
