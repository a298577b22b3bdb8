use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

pub const STATUS_UNVERIFIED: &str = "unverified";
pub const STATUS_VERIFIED: &str = "verified";
pub const ORDER_PENDING: &str = "Pending";

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
    pub status: String, // "unverified" | "verified"
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.status == STATUS_VERIFIED
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

/// One-time code issued to a user at signup.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OtpCode {
    pub user_id: i64,
    pub code: String,
    pub issued_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub is_available: bool,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub food_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_price: Option<f64>, // unset until every line is priced
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub food_id: i64,
    pub quantity: i32,
    pub price_at_order: f64,
}
