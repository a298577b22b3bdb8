use tracing::info;

use super::dto::AddToCartRequest;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::CartItem;

/// Appends a line to the user's cart, creating the cart on first use.
///
/// Neither the user nor the food is looked up, and repeated adds of the same food produce
/// separate lines. Checkout is where unknown or unavailable foods are rejected.
pub async fn add_to_cart(st: &AppState, req: AddToCartRequest) -> Result<CartItem, ApiError> {
    let mut uow = st.store.begin().await?;
    let cart = uow.get_or_create_cart(req.user_id).await?;
    let item = uow
        .insert_cart_item(cart.id, req.food_id, req.quantity)
        .await?;
    uow.commit().await?;

    info!(
        user_id = req.user_id,
        cart_id = cart.id,
        food_id = req.food_id,
        quantity = req.quantity,
        "cart item added"
    );
    Ok(item)
}
