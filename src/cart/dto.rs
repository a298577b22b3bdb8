use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub user_id: i64,
    pub food_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}
