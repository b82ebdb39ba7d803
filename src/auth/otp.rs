use rand::{rngs::OsRng, Rng};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::repo_types::{OtpChallenge, User};

pub const OTP_DIGITS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("no verification code is outstanding")]
    NoChallenge,
    #[error("verification code expired")]
    Expired,
    #[error("verification code does not match")]
    Mismatch,
}

/// Issues and checks the one-time codes stored on a user record.
#[derive(Debug, Clone, Copy)]
pub struct OtpManager {
    ttl: Duration,
}

impl OtpManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Put a fresh challenge on `user`, replacing any previous one.
    pub fn issue(&self, user: &mut User, now: OffsetDateTime) -> String {
        let code = generate_code();
        user.otp = Some(OtpChallenge {
            code: code.clone(),
            expires_at: now + self.ttl,
        });
        debug!(user_id = %user.id, "otp challenge issued");
        code
    }

    /// Check `submitted` against the outstanding challenge and clear it on a
    /// match. An expired challenge stays in place until re-issued.
    pub fn verify(
        &self,
        user: &mut User,
        submitted: &str,
        now: OffsetDateTime,
    ) -> Result<(), OtpError> {
        let challenge = user.otp.as_ref().ok_or(OtpError::NoChallenge)?;
        if now > challenge.expires_at {
            return Err(OtpError::Expired);
        }
        if !constant_time_eq(challenge.code.as_bytes(), submitted.as_bytes()) {
            return Err(OtpError::Mismatch);
        }
        user.otp = None;
        Ok(())
    }
}

/// Uniform 6-digit code, zero padded.
pub fn generate_code() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:0width$}", n, width = OTP_DIGITS)
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
