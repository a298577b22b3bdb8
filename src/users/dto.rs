use serde::{Deserialize, Serialize};

/// Request body for signup. At least one of email/phone is required.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: i64,
    pub otp: String, // returned directly, no delivery channel
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub user_id: i64,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub message: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
