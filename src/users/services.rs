use time::OffsetDateTime;
use tracing::{info, warn};

use super::dto::{ResendOtpRequest, SignupRequest, VerifyRequest};
use super::otp::{generate_code, OtpCheck};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{repo_types::STATUS_VERIFIED, NewUser, User};

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Signup result: the stored user and the code issued to them.
#[derive(Debug)]
pub struct Signup {
    pub user: User,
    pub otp: String,
}

pub async fn signup(st: &AppState, req: SignupRequest) -> Result<Signup, ApiError> {
    let email = non_empty(req.email);
    let phone = non_empty(req.phone);
    let referral_code = non_empty(req.referral_code);

    if email.is_none() && phone.is_none() {
        warn!("signup without email or phone");
        return Err(ApiError::validation("Email or phone required"));
    }

    let mut uow = st.store.begin().await?;
    if let Some(existing) = uow
        .find_user_by_contact(email.as_deref(), phone.as_deref())
        .await?
    {
        warn!(user_id = existing.id, "user already exists");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let user = uow
        .insert_user(&NewUser {
            email,
            phone,
            referral_code,
        })
        .await?;
    let otp = generate_code();
    uow.put_otp(user.id, &otp, OffsetDateTime::now_utc()).await?;
    uow.commit().await?;

    info!(user_id = user.id, "user created");
    Ok(Signup { user, otp })
}

pub async fn verify(st: &AppState, req: VerifyRequest) -> Result<(), ApiError> {
    let mut uow = st.store.begin().await?;
    let user = uow
        .find_user(req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let Some(otp) = uow.find_otp(user.id).await? else {
        warn!(user_id = user.id, "no otp issued");
        return Err(ApiError::validation("Invalid OTP"));
    };

    let now = OffsetDateTime::now_utc();
    match otp.check(&req.otp, now, st.config.otp_ttl()) {
        OtpCheck::Mismatch => {
            warn!(user_id = user.id, "otp mismatch");
            Err(ApiError::validation("Invalid OTP"))
        }
        OtpCheck::Expired => {
            warn!(user_id = user.id, "otp expired");
            Err(ApiError::validation("OTP expired"))
        }
        // Repeating a successful verification is accepted and changes nothing.
        OtpCheck::AlreadyConsumed if user.is_verified() => {
            info!(user_id = user.id, "user already verified");
            Ok(())
        }
        OtpCheck::AlreadyConsumed | OtpCheck::Valid => {
            uow.consume_otp(user.id, now).await?;
            uow.set_user_status(user.id, STATUS_VERIFIED).await?;
            uow.commit().await?;
            info!(user_id = user.id, "user verified");
            Ok(())
        }
    }
}

/// Replaces the user's code with a fresh one. Verified users get no new code.
pub async fn resend_otp(st: &AppState, req: ResendOtpRequest) -> Result<String, ApiError> {
    let mut uow = st.store.begin().await?;
    let user = uow
        .find_user(req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if user.is_verified() {
        warn!(user_id = user.id, "otp resend for verified user");
        return Err(ApiError::validation("Account already verified"));
    }

    let otp = generate_code();
    uow.put_otp(user.id, &otp, OffsetDateTime::now_utc()).await?;
    uow.commit().await?;

    info!(user_id = user.id, "otp reissued");
    Ok(otp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(e: &str) -> SignupRequest {
        SignupRequest {
            email: Some(e.into()),
            ..Default::default()
        }
    }

    async fn stored_user(st: &AppState, id: i64) -> Option<User> {
        let mut uow = st.store.begin().await.unwrap();
        uow.find_user(id).await.unwrap()
    }

    #[tokio::test]
    async fn signup_requires_email_or_phone() {
        let st = AppState::fake();
        let err = signup(&st, SignupRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Email or phone required"));

        let blank = SignupRequest {
            email: Some("  ".into()),
            phone: Some("".into()),
            referral_code: Some("REF".into()),
        };
        assert!(matches!(signup(&st, blank).await, Err(ApiError::Validation(_))));
        assert!(stored_user(&st, 1).await.is_none());
    }

    #[tokio::test]
    async fn signup_creates_unverified_user_with_code() {
        let st = AppState::fake();
        let out = signup(
            &st,
            SignupRequest {
                email: Some(" Ada@Example.com ".into()),
                phone: None,
                referral_code: Some("CHUKS10".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(out.otp.len(), 4);
        let user = stored_user(&st, out.user.id).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("Ada@Example.com"));
        assert_eq!(user.referral_code.as_deref(), Some("CHUKS10"));
        assert!(!user.is_verified());
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email_or_phone() {
        let st = AppState::fake();
        signup(&st, email("ada@example.com")).await.unwrap();
        let err = signup(&st, email("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        // emails are compared exactly
        signup(&st, email("ADA@example.com")).await.unwrap();

        let with_phone = SignupRequest {
            phone: Some("+2348012345678".into()),
            ..Default::default()
        };
        signup(&st, with_phone).await.unwrap();
        let same_phone = SignupRequest {
            email: Some("other@example.com".into()),
            phone: Some("+2348012345678".into()),
            referral_code: None,
        };
        let err = signup(&st, same_phone).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn verify_with_correct_code_and_repeat() {
        let st = AppState::fake();
        let out = signup(&st, email("ada@example.com")).await.unwrap();
        let req = || VerifyRequest {
            user_id: out.user.id,
            otp: out.otp.clone(),
        };

        verify(&st, req()).await.unwrap();
        assert!(stored_user(&st, out.user.id).await.unwrap().is_verified());

        // the same code is accepted again
        verify(&st, req()).await.unwrap();
        assert!(stored_user(&st, out.user.id).await.unwrap().is_verified());
    }

    #[tokio::test]
    async fn verify_with_wrong_code_leaves_status() {
        let st = AppState::fake();
        let out = signup(&st, email("ada@example.com")).await.unwrap();
        let wrong = if out.otp == "1000" { "1001" } else { "1000" };

        let err = verify(
            &st,
            VerifyRequest {
                user_id: out.user.id,
                otp: wrong.into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Invalid OTP"));
        assert!(!stored_user(&st, out.user.id).await.unwrap().is_verified());
    }

    #[tokio::test]
    async fn verify_unknown_user_is_not_found() {
        let st = AppState::fake();
        let err = verify(
            &st,
            VerifyRequest {
                user_id: 42,
                otp: "1234".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn verify_rejects_expired_code() {
        let st = AppState::fake();
        let out = signup(&st, email("ada@example.com")).await.unwrap();
        {
            let mut uow = st.store.begin().await.unwrap();
            let issued = OffsetDateTime::now_utc() - time::Duration::hours(1);
            uow.put_otp(out.user.id, &out.otp, issued).await.unwrap();
            uow.commit().await.unwrap();
        }

        let err = verify(
            &st,
            VerifyRequest {
                user_id: out.user.id,
                otp: out.otp.clone(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "OTP expired"));
    }

    #[tokio::test]
    async fn signup_accepts_any_contact_format() {
        let st = AppState::fake();
        signup(&st, email("chuks@localhost")).await.unwrap();
        let dashed = SignupRequest {
            phone: Some("0803-123-4567".into()),
            ..Default::default()
        };
        signup(&st, dashed).await.unwrap();
    }

    #[tokio::test]
    async fn resent_code_verifies_after_expiry() {
        let st = AppState::fake();
        let out = signup(&st, email("ada@example.com")).await.unwrap();
        {
            let mut uow = st.store.begin().await.unwrap();
            let issued = OffsetDateTime::now_utc() - time::Duration::hours(1);
            uow.put_otp(out.user.id, &out.otp, issued).await.unwrap();
            uow.commit().await.unwrap();
        }
        let again = signup(&st, email("ada@example.com")).await.unwrap_err();
        assert!(matches!(again, ApiError::Conflict(_)));

        let fresh = resend_otp(&st, ResendOtpRequest { user_id: out.user.id })
            .await
            .unwrap();
        verify(
            &st,
            VerifyRequest {
                user_id: out.user.id,
                otp: fresh,
            },
        )
        .await
        .unwrap();
        assert!(stored_user(&st, out.user.id).await.unwrap().is_verified());

        let err = resend_otp(&st, ResendOtpRequest { user_id: out.user.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Account already verified"));
    }

    #[tokio::test]
    async fn resend_for_unknown_user_is_not_found() {
        let st = AppState::fake();
        let err = resend_otp(&st, ResendOtpRequest { user_id: 5 }).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
