use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateFoodRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}
