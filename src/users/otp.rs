use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::store::OtpCode;

/// Draws a 4-digit code in 1000..=9999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    /// Matches a code that already verified the account.
    AlreadyConsumed,
}

impl OtpCode {
    pub fn check(&self, supplied: &str, now: OffsetDateTime, ttl: Duration) -> OtpCheck {
        if self.code != supplied {
            return OtpCheck::Mismatch;
        }
        if self.consumed_at.is_some() {
            return OtpCheck::AlreadyConsumed;
        }
        if now - self.issued_at > ttl {
            return OtpCheck::Expired;
        }
        OtpCheck::Valid
    }
}
