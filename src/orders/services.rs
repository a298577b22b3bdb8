use tracing::{info, warn};

use super::dto::{CreateOrderRequest, OrderDetails};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Order;

/// Turns the user's cart into an order.
///
/// Runs as one unit of work: every line is priced from the current catalog and copied into an
/// order item, the order total is set, and the cart is emptied. Any failure drops the unit of
/// work, so neither the order nor its items nor the cart change are kept.
pub async fn create_order(st: &AppState, req: CreateOrderRequest) -> Result<Order, ApiError> {
    let mut uow = st.store.begin().await?;

    let Some(cart) = uow.lock_cart(req.user_id).await? else {
        warn!(user_id = req.user_id, "checkout without cart");
        return Err(ApiError::validation("Cart is empty"));
    };
    let lines = uow.list_cart_items(cart.id).await?;
    if lines.is_empty() {
        warn!(user_id = req.user_id, cart_id = cart.id, "checkout of empty cart");
        return Err(ApiError::validation("Cart is empty"));
    }

    let mut order = uow.insert_order(req.user_id).await?;
    let mut total = 0.0;
    for line in &lines {
        let food = match uow.find_food(line.food_id).await? {
            Some(food) if food.is_available => food,
            _ => {
                warn!(user_id = req.user_id, food_id = line.food_id, "food unavailable");
                return Err(ApiError::validation("Food unavailable"));
            }
        };
        total += food.price * f64::from(line.quantity);
        uow.insert_order_item(order.id, food.id, line.quantity, food.price)
            .await?;
    }

    uow.set_order_total(order.id, total).await?;
    uow.clear_cart(cart.id).await?;
    uow.commit().await?;

    order.total_price = Some(total);
    info!(
        user_id = req.user_id,
        order_id = order.id,
        lines = lines.len(),
        total,
        "order created"
    );
    Ok(order)
}

pub async fn get_order(st: &AppState, order_id: i64) -> Result<OrderDetails, ApiError> {
    let mut uow = st.store.begin().await?;
    let order = uow
        .find_order(order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    let items = uow.list_order_items(order.id).await?;
    uow.commit().await?;
    Ok(OrderDetails::new(order, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{dto::AddToCartRequest, services::add_to_cart};
    use crate::foods::{dto::CreateFoodRequest, services::add_food};
    use crate::store::Food;

    async fn food(st: &AppState, price: f64, is_available: bool) -> Food {
        add_food(
            st,
            CreateFoodRequest {
                name: "Jollof Rice".into(),
                description: String::new(),
                price,
                is_available,
            },
        )
        .await
        .unwrap()
    }

    async fn add(st: &AppState, user_id: i64, food_id: i64, quantity: i32) {
        add_to_cart(
            st,
            AddToCartRequest {
                user_id,
                food_id,
                quantity,
            },
        )
        .await
        .unwrap();
    }

    async fn order_exists(st: &AppState, id: i64) -> bool {
        let mut uow = st.store.begin().await.unwrap();
        uow.find_order(id).await.unwrap().is_some()
    }

    #[tokio::test]
    async fn checkout_without_cart_or_items_fails() {
        let st = AppState::fake();
        let err = create_order(&st, CreateOrderRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Cart is empty"));

        // a cart emptied by an earlier checkout counts as empty too
        let rice = food(&st, 10.0, true).await;
        add(&st, 1, rice.id, 1).await;
        let first = create_order(&st, CreateOrderRequest { user_id: 1 }).await.unwrap();
        let err = create_order(&st, CreateOrderRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Cart is empty"));
        assert!(!order_exists(&st, first.id + 1).await);
    }

    #[tokio::test]
    async fn checkout_snapshots_prices_and_empties_cart() {
        let st = AppState::fake();
        let rice = food(&st, 10.0, true).await;
        add(&st, 1, rice.id, 2).await;

        let order = create_order(&st, CreateOrderRequest { user_id: 1 }).await.unwrap();
        assert_eq!(order.total_price, Some(20.0));
        assert_eq!(order.status, "Pending");

        let details = get_order(&st, order.id).await.unwrap();
        assert_eq!(details.total_price, Some(20.0));
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].price_at_order, 10.0);
        assert_eq!(details.items[0].quantity, 2);
        assert_eq!(details.items[0].food_id, rice.id);

        let mut uow = st.store.begin().await.unwrap();
        let cart = uow.lock_cart(1).await.unwrap().expect("cart row is kept");
        assert!(uow.list_cart_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_sums_every_line() {
        let st = AppState::fake();
        let rice = food(&st, 10.0, true).await;
        let soup = food(&st, 2.5, true).await;
        add(&st, 4, rice.id, 1).await;
        add(&st, 4, soup.id, 3).await;
        add(&st, 4, rice.id, 2).await;

        let order = create_order(&st, CreateOrderRequest { user_id: 4 }).await.unwrap();
        assert_eq!(order.total_price, Some(37.5));
        let details = get_order(&st, order.id).await.unwrap();
        assert_eq!(
            details.items.iter().map(|i| i.food_id).collect::<Vec<_>>(),
            vec![rice.id, soup.id, rice.id]
        );
    }

    #[tokio::test]
    async fn unavailable_food_leaves_no_order_behind() {
        let st = AppState::fake();
        let rice = food(&st, 10.0, true).await;
        let gone = food(&st, 4.0, false).await;
        add(&st, 1, rice.id, 1).await;
        add(&st, 1, gone.id, 1).await;

        let err = create_order(&st, CreateOrderRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Food unavailable"));
        assert!(!order_exists(&st, 1).await);

        let mut uow = st.store.begin().await.unwrap();
        assert!(uow.list_order_items(1).await.unwrap().is_empty());
        let cart = uow.lock_cart(1).await.unwrap().unwrap();
        assert_eq!(uow.list_cart_items(cart.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_food_fails_checkout() {
        let st = AppState::fake();
        add(&st, 1, 404, 1).await;
        let err = create_order(&st, CreateOrderRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Food unavailable"));
        assert!(!order_exists(&st, 1).await);
    }

    #[tokio::test]
    async fn get_order_is_repeatable_and_reports_missing() {
        let st = AppState::fake();
        let rice = food(&st, 10.0, true).await;
        add(&st, 1, rice.id, 1).await;
        let order = create_order(&st, CreateOrderRequest { user_id: 1 }).await.unwrap();

        let first = get_order(&st, order.id).await.unwrap();
        let second = get_order(&st, order.id).await.unwrap();
        assert_eq!(first, second);

        let err = get_order(&st, order.id + 100).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn checkout_does_not_require_a_known_user() {
        let st = AppState::fake();
        let rice = food(&st, 10.0, true).await;
        add(&st, 999, rice.id, 1).await;

        let order = create_order(&st, CreateOrderRequest { user_id: 999 }).await.unwrap();
        assert_eq!(order.user_id, 999);
        assert_eq!(order.total_price, Some(10.0));
    }
}
