//! Outbound email notifications.
//!
//! Sends go through a mail relay function configured via MAIL_* variables.
//! Dispatch is fire-and-forget: the request that triggered a notification
//! never waits for, or fails because of, the relay. Payloads are signed
//! with HMAC-SHA256 when a webhook secret is configured.

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::config::MailConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    mail: Option<MailConfig>,
}

impl Notifier {
    pub fn new(mail: Option<MailConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            mail,
        }
    }

    pub fn enabled(&self) -> bool {
        self.mail.is_some()
    }

    /// Queues a templated notification without blocking the caller.
    pub fn spawn_send(&self, template: &'static str, data: serde_json::Value, to: String) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(template, data, &to).await {
                tracing::warn!(template, to, error = %e, "notification send failed");
            }
        });
    }

    /// Synchronous probe for the settings page: sends the `test` template
    /// and reports relay errors to the caller.
    pub async fn send_test(&self, to: &str) -> anyhow::Result<()> {
        if self.mail.is_none() {
            anyhow::bail!("mail relay is not configured (MAIL_ENDPOINT unset)");
        }
        self.send("test", json!({}), to).await
    }

    async fn send(&self, template: &str, data: serde_json::Value, to: &str) -> anyhow::Result<()> {
        let Some(mail) = &self.mail else {
            tracing::debug!(template, "mail relay not configured, skipping notification");
            return Ok(());
        };

        let payload = serde_json::to_vec(&json!({
            "template": template,
            "to": to,
            "from": mail.from,
            "data": data,
        }))?;

        let mut req = self
            .client
            .post(&mail.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &mail.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(secret) = &mail.webhook_secret {
            req = req.header("X-Signature", firma_payload(&payload, secret)?);
        }

        let response = req.body(payload).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mail relay returned {}: {}", status, body);
        }

        tracing::debug!(template, to, "notification dispatched");
        Ok(())
    }
}

fn firma_payload(payload: &[u8], secret: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("HMAC initialization error: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
