use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    repo_types::{ORDER_PENDING, STATUS_UNVERIFIED},
    Cart, CartItem, Food, NewFood, NewUser, Order, OrderItem, OtpCode, Store, StoreError,
    StoreResult, UnitOfWork, User,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    otp_codes: Vec<OtpCode>,
    foods: Vec<Food>,
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    seq: Sequences,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    user: i64,
    food: i64,
    cart: i64,
    cart_item: i64,
    order: i64,
    order_item: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-process store. A unit of work holds the table lock for its whole lifetime, so units of
/// work run one at a time.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, work }))
    }

    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}

/// Edits a private copy of the tables; `commit` publishes it.
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let hit = self.work.users.iter().find(|u| {
            (email.is_some() && u.email.as_deref() == email)
                || (phone.is_some() && u.phone.as_deref() == phone)
        });
        Ok(hit.cloned())
    }

    async fn insert_user(&mut self, new: &NewUser) -> StoreResult<User> {
        for u in &self.work.users {
            if new.email.is_some() && u.email == new.email {
                return Err(StoreError::Conflict("users_email_key".into()));
            }
            if new.phone.is_some() && u.phone == new.phone {
                return Err(StoreError::Conflict("users_phone_key".into()));
            }
        }
        let user = User {
            id: next(&mut self.work.seq.user),
            email: new.email.clone(),
            phone: new.phone.clone(),
            referral_code: new.referral_code.clone(),
            status: STATUS_UNVERIFIED.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.work.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_status(&mut self, id: i64, status: &str) -> StoreResult<()> {
        if let Some(u) = self.work.users.iter_mut().find(|u| u.id == id) {
            u.status = status.to_string();
        }
        Ok(())
    }

    async fn put_otp(&mut self, user_id: i64, code: &str, issued_at: OffsetDateTime) -> StoreResult<()> {
        let otp = OtpCode {
            user_id,
            code: code.to_string(),
            issued_at,
            consumed_at: None,
        };
        match self.work.otp_codes.iter_mut().find(|o| o.user_id == user_id) {
            Some(existing) => *existing = otp,
            None => self.work.otp_codes.push(otp),
        }
        Ok(())
    }

    async fn find_otp(&mut self, user_id: i64) -> StoreResult<Option<OtpCode>> {
        Ok(self.work.otp_codes.iter().find(|o| o.user_id == user_id).cloned())
    }

    async fn consume_otp(&mut self, user_id: i64, at: OffsetDateTime) -> StoreResult<()> {
        if let Some(o) = self.work.otp_codes.iter_mut().find(|o| o.user_id == user_id) {
            o.consumed_at = Some(at);
        }
        Ok(())
    }

    async fn insert_food(&mut self, new: &NewFood) -> StoreResult<Food> {
        let food = Food {
            id: next(&mut self.work.seq.food),
            name: new.name.clone(),
            description: new.description.clone(),
            price: new.price,
            is_available: new.is_available,
        };
        self.work.foods.push(food.clone());
        Ok(food)
    }

    async fn find_food(&mut self, id: i64) -> StoreResult<Option<Food>> {
        Ok(self.work.foods.iter().find(|f| f.id == id).cloned())
    }

    async fn list_available_foods(&mut self) -> StoreResult<Vec<Food>> {
        Ok(self
            .work
            .foods
            .iter()
            .filter(|f| f.is_available)
            .cloned()
            .collect())
    }

    async fn lock_cart(&mut self, user_id: i64) -> StoreResult<Option<Cart>> {
        Ok(self.work.carts.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn get_or_create_cart(&mut self, user_id: i64) -> StoreResult<Cart> {
        if let Some(cart) = self.work.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart {
            id: next(&mut self.work.seq.cart),
            user_id,
        };
        self.work.carts.push(cart.clone());
        Ok(cart)
    }

    async fn insert_cart_item(&mut self, cart_id: i64, food_id: i64, quantity: i32) -> StoreResult<CartItem> {
        let item = CartItem {
            id: next(&mut self.work.seq.cart_item),
            cart_id,
            food_id,
            quantity,
        };
        self.work.cart_items.push(item.clone());
        Ok(item)
    }

    async fn list_cart_items(&mut self, cart_id: i64) -> StoreResult<Vec<CartItem>> {
        Ok(self
            .work
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn clear_cart(&mut self, cart_id: i64) -> StoreResult<u64> {
        let before = self.work.cart_items.len();
        self.work.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - self.work.cart_items.len()) as u64)
    }

    async fn insert_order(&mut self, user_id: i64) -> StoreResult<Order> {
        let order = Order {
            id: next(&mut self.work.seq.order),
            user_id,
            total_price: None,
            status: ORDER_PENDING.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.work.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_item(
        &mut self,
        order_id: i64,
        food_id: i64,
        quantity: i32,
        price_at_order: f64,
    ) -> StoreResult<OrderItem> {
        let item = OrderItem {
            id: next(&mut self.work.seq.order_item),
            order_id,
            food_id,
            quantity,
            price_at_order,
        };
        self.work.order_items.push(item.clone());
        Ok(item)
    }

    async fn set_order_total(&mut self, order_id: i64, total: f64) -> StoreResult<()> {
        if let Some(o) = self.work.orders.iter_mut().find(|o| o.id == order_id) {
            o.total_price = Some(total);
        }
        Ok(())
    }

    async fn find_order(&mut self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.work.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_order_items(&mut self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .work
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
