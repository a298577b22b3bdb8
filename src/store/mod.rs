//! Persistence layer.
//!
//! Every domain operation opens one [`UnitOfWork`] through [`Store::begin`], performs its reads
//! and writes on it, and calls [`UnitOfWork::commit`]. A unit of work that is dropped without
//! being committed leaves no trace.

use async_trait::async_trait;
use time::OffsetDateTime;

mod memory;
mod postgres;
pub mod repo_types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repo_types::{Cart, CartItem, Food, NewFood, NewUser, Order, OrderItem, OtpCode, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    fn backend_tag(&self) -> &'static str;
}

#[async_trait]
pub trait UnitOfWork: Send {
    // users
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>>;
    /// First user whose email equals `email` or whose phone equals `phone`.
    async fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> StoreResult<Option<User>>;
    async fn insert_user(&mut self, new: &NewUser) -> StoreResult<User>;
    async fn set_user_status(&mut self, id: i64, status: &str) -> StoreResult<()>;

    // otp credentials
    async fn put_otp(&mut self, user_id: i64, code: &str, issued_at: OffsetDateTime) -> StoreResult<()>;
    async fn find_otp(&mut self, user_id: i64) -> StoreResult<Option<OtpCode>>;
    async fn consume_otp(&mut self, user_id: i64, at: OffsetDateTime) -> StoreResult<()>;

    // catalog
    async fn insert_food(&mut self, new: &NewFood) -> StoreResult<Food>;
    async fn find_food(&mut self, id: i64) -> StoreResult<Option<Food>>;
    async fn list_available_foods(&mut self) -> StoreResult<Vec<Food>>;

    // carts
    /// Looks up the user's cart and holds it for the rest of the unit of work.
    async fn lock_cart(&mut self, user_id: i64) -> StoreResult<Option<Cart>>;
    /// Returns the user's cart, creating it in the same step when missing.
    async fn get_or_create_cart(&mut self, user_id: i64) -> StoreResult<Cart>;
    async fn insert_cart_item(&mut self, cart_id: i64, food_id: i64, quantity: i32) -> StoreResult<CartItem>;
    async fn list_cart_items(&mut self, cart_id: i64) -> StoreResult<Vec<CartItem>>;
    async fn clear_cart(&mut self, cart_id: i64) -> StoreResult<u64>;

    // orders
    async fn insert_order(&mut self, user_id: i64) -> StoreResult<Order>;
    async fn insert_order_item(
        &mut self,
        order_id: i64,
        food_id: i64,
        quantity: i32,
        price_at_order: f64,
    ) -> StoreResult<OrderItem>;
    async fn set_order_total(&mut self, order_id: i64, total: f64) -> StoreResult<()>;
    async fn find_order(&mut self, id: i64) -> StoreResult<Option<Order>>;
    async fn list_order_items(&mut self, order_id: i64) -> StoreResult<Vec<OrderItem>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
