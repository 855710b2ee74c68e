//! Best-effort external announcements.
//!
//! DESIGN
//! ======
//! The notifier posts human-readable join/empty announcements to an external
//! webhook. Delivery is fire-and-forget on a spawned task: the caller never
//! waits, and failures are logged and swallowed — an unreachable webhook must
//! never affect canvas state or protocol handling. With no webhook URL
//! configured the notifier is a silent no-op.

use serde_json::json;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    #[must_use]
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url }
    }

    /// Read `NOTIFY_WEBHOOK_URL` from the environment; absent means disabled.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var("NOTIFY_WEBHOOK_URL").ok())
    }

    /// A notifier that drops every announcement.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Post an announcement without waiting for or checking the outcome.
    pub fn send(&self, text: &str) {
        let Some(url) = self.webhook_url.clone() else {
            debug!(text, "notifier disabled; dropping announcement");
            return;
        };

        let client = self.client.clone();
        let body = payload(text);
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    warn!(status = %resp.status(), "notifier webhook rejected announcement");
                }
                Err(e) => warn!(error = %e, "notifier webhook unreachable"),
            }
        });
    }
}

/// Webhook body: `{"content": text}`.
fn payload(text: &str) -> serde_json::Value {
    json!({ "content": text })
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
