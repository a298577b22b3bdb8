use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::dto::{
    MessageResponse, OtpResponse, ResendOtpRequest, SignupRequest, SignupResponse, VerifyRequest,
};
use super::services;
use crate::{error::ApiError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify", post(verify))
        .route("/otp/resend", post(resend_otp))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    let out = services::signup(&state, payload).await?;
    Ok(Json(SignupResponse {
        message: "User created".into(),
        user_id: out.user.id,
        otp: out.otp,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::verify(&state, payload).await?;
    Ok(Json(MessageResponse::new("Account verified")))
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> Result<Json<OtpResponse>, ApiError> {
    let otp = services::resend_otp(&state, payload).await?;
    Ok(Json(OtpResponse {
        message: "OTP reissued".into(),
        otp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_response_serialization() {
        let response = SignupResponse {
            message: "User created".into(),
            user_id: 3,
            otp: "4821".into(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["otp"], "4821");
        assert_eq!(json["user_id"], 3);
    }
}
