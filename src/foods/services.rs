use tracing::{info, warn};

use super::dto::CreateFoodRequest;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Food, NewFood};

pub async fn add_food(st: &AppState, req: CreateFoodRequest) -> Result<Food, ApiError> {
    if !req.price.is_finite() || req.price < 0.0 {
        warn!(price = req.price, "rejected food price");
        return Err(ApiError::validation("Price must be a non-negative number"));
    }

    let mut uow = st.store.begin().await?;
    let food = uow
        .insert_food(&NewFood {
            name: req.name,
            description: req.description,
            price: req.price,
            is_available: req.is_available,
        })
        .await?;
    uow.commit().await?;

    info!(food_id = food.id, name = %food.name, "food added");
    Ok(food)
}

/// Foods that can currently be ordered, in catalog order.
pub async fn list_available(st: &AppState) -> Result<Vec<Food>, ApiError> {
    let mut uow = st.store.begin().await?;
    let foods = uow.list_available_foods().await?;
    uow.commit().await?;
    Ok(foods)
}
