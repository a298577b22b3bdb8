use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::{
    Cart, CartItem, Food, NewFood, NewUser, Order, OrderItem, OtpCode, Store, StoreError,
    StoreResult, UnitOfWork, User,
};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                let what = db.constraint().unwrap_or("unique").to_string();
                return StoreError::Conflict(what);
            }
        }
        StoreError::Backend(e.into())
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}

/// A unit of work backed by one Postgres transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, referral_code, status, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, referral_code, status, created_at
            FROM users
            WHERE ($1::text IS NOT NULL AND email = $1)
               OR ($2::text IS NOT NULL AND phone = $2)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(phone)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn insert_user(&mut self, new: &NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, phone, referral_code)
            VALUES ($1, $2, $3)
            RETURNING id, email, phone, referral_code, status, created_at
            "#,
        )
        .bind(new.email.as_deref())
        .bind(new.phone.as_deref())
        .bind(new.referral_code.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn set_user_status(&mut self, id: i64, status: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn put_otp(&mut self, user_id: i64, code: &str, issued_at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (user_id, code, issued_at, consumed_at)
            VALUES ($1, $2, $3, NULL)
            ON CONFLICT (user_id)
            DO UPDATE SET code = EXCLUDED.code, issued_at = EXCLUDED.issued_at, consumed_at = NULL
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(issued_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_otp(&mut self, user_id: i64) -> StoreResult<Option<OtpCode>> {
        let otp = sqlx::query_as::<_, OtpCode>(
            "SELECT user_id, code, issued_at, consumed_at FROM otp_codes WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(otp)
    }

    async fn consume_otp(&mut self, user_id: i64, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE otp_codes SET consumed_at = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_food(&mut self, new: &NewFood) -> StoreResult<Food> {
        let food = sqlx::query_as::<_, Food>(
            r#"
            INSERT INTO foods (name, description, price, is_available)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price, is_available
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.is_available)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(food)
    }

    async fn find_food(&mut self, id: i64) -> StoreResult<Option<Food>> {
        let food = sqlx::query_as::<_, Food>(
            "SELECT id, name, description, price, is_available FROM foods WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(food)
    }

    async fn list_available_foods(&mut self) -> StoreResult<Vec<Food>> {
        let rows = sqlx::query_as::<_, Food>(
            r#"
            SELECT id, name, description, price, is_available
            FROM foods
            WHERE is_available
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn lock_cart(&mut self, user_id: i64) -> StoreResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(cart)
    }

    async fn get_or_create_cart(&mut self, user_id: i64) -> StoreResult<Cart> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(cart)
    }

    async fn insert_cart_item(&mut self, cart_id: i64, food_id: i64, quantity: i32) -> StoreResult<CartItem> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (cart_id, food_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, cart_id, food_id, quantity
            "#,
        )
        .bind(cart_id)
        .bind(food_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn list_cart_items(&mut self, cart_id: i64) -> StoreResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartItem>(
            "SELECT id, cart_id, food_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn clear_cart(&mut self, cart_id: i64) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected())
    }

    async fn insert_order(&mut self, user_id: i64) -> StoreResult<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id)
            VALUES ($1)
            RETURNING id, user_id, total_price, status, created_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn insert_order_item(
        &mut self,
        order_id: i64,
        food_id: i64,
        quantity: i32,
        price_at_order: f64,
    ) -> StoreResult<OrderItem> {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, food_id, quantity, price_at_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, food_id, quantity, price_at_order
            "#,
        )
        .bind(order_id)
        .bind(food_id)
        .bind(quantity)
        .bind(price_at_order)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn set_order_total(&mut self, order_id: i64, total: f64) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET total_price = $2 WHERE id = $1")
            .bind(order_id)
            .bind(total)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_order(&mut self, id: i64) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, total_price, status, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn list_order_items(&mut self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, food_id, quantity, price_at_order
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
