use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::identifier::Identifier;
use crate::config::NotifyConfig;

/// What happened to a code handed to the notifier. When `fallback_code` is
/// set the code could not be delivered and is returned for on-screen display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    pub fallback_code: Option<String>,
}

impl Delivery {
    pub fn sent() -> Self {
        Self {
            delivered: true,
            fallback_code: None,
        }
    }

    pub fn fallback(code: &str) -> Self {
        Self {
            delivered: false,
            fallback_code: Some(code.to_owned()),
        }
    }
}

/// Delivers OTP codes to a contact channel. Never fails the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, identifier: &Identifier, code: &str, display_name: &str) -> Delivery;
}

/// No transport configured: log the code and hand it back.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, identifier: &Identifier, code: &str, display_name: &str) -> Delivery {
        info!(
            to = %identifier,
            user = display_name,
            otp = code,
            "delivery not configured; returning otp for display"
        );
        Delivery::fallback(code)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookMessage<'a> {
    to: &'a str,
    channel: &'static str,
    code: &'a str,
    display_name: &'a str,
    subject: &'static str,
    text: String,
}

/// Posts the code to an HTTP relay (mail or SMS gateway).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    otp_ttl_minutes: i64,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration, otp_ttl_minutes: i64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build notifier http client")?;
        Ok(Self {
            client,
            url: url.to_owned(),
            timeout,
            otp_ttl_minutes,
        })
    }

    async fn post(&self, message: &WebhookMessage<'_>) -> anyhow::Result<()> {
        let send = self.client.post(&self.url).json(message).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .context("notifier timed out")?
            .context("notifier request failed")?;
        response
            .error_for_status()
            .context("notifier rejected message")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, identifier: &Identifier, code: &str, display_name: &str) -> Delivery {
        let name = if display_name.is_empty() { "there" } else { display_name };
        let message = WebhookMessage {
            to: identifier.value(),
            channel: identifier.kind().as_str(),
            code,
            display_name,
            subject: "MovieBuzz - Your Verification Code",
            text: format!(
                "Hi {name}, your MovieBuzz verification code is {code}. It expires in {} minutes.",
                self.otp_ttl_minutes
            ),
        };

        match self.post(&message).await {
            Ok(()) => {
                info!(to = %identifier, user = display_name, "otp delivered");
                Delivery::sent()
            }
            Err(e) => {
                let detail = format!("{e:#}");
                warn!(error = %detail, to = %identifier, "otp delivery failed; falling back to display");
                Delivery::fallback(code)
            }
        }
    }
}

pub fn from_config(cfg: &NotifyConfig, otp_ttl_minutes: i64) -> anyhow::Result<Arc<dyn Notifier>> {
    match cfg.webhook_url.as_deref() {
        Some(url) => {
            info!(url, "otp delivery via webhook");
            let notifier =
                WebhookNotifier::new(url, Duration::from_secs(cfg.timeout_secs), otp_ttl_minutes)?;
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("NOTIFY_WEBHOOK_URL not set; otp codes will be returned in responses");
            Ok(Arc::new(ConsoleNotifier))
        }
    }
}
