use anyhow::{bail, Context};
use serde::Deserialize;

use crate::auth::identifier::IdentifierKind;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Relay endpoint for OTP delivery. `None` runs in display-only mode.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub notify: NotifyConfig,
    pub identifier_kind: IdentifierKind,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if secret.len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 bytes");
        }
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "moviebuzz".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "moviebuzz-users".into()),
        };

        let otp = OtpConfig {
            ttl_minutes: std::env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(10),
        };

        let notify = NotifyConfig {
            webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_secs: std::env::var("NOTIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        };

        let identifier_kind = match std::env::var("IDENTIFIER_KIND") {
            Ok(v) => match v.parse::<IdentifierKind>() {
                Ok(kind) => kind,
                Err(e) => bail!("invalid IDENTIFIER_KIND: {e}"),
            },
            Err(_) => IdentifierKind::Email,
        };

        Ok(Self {
            database_url,
            jwt,
            otp,
            notify,
            identifier_kind,
        })
    }
}
