//! Pushover-style HTTPS form POST, fired once per breach.
//!
//! Certificate verification stays on (rustls with bundled roots) and the
//! client is built `https_only`, so the token never travels in clear text.
//! Failures are returned to the caller; there is no retry here.

#![allow(missing_docs)]

use std::time::Duration;

use serde::Deserialize;

use crate::core::config::Config;
use crate::core::errors::{NoisedError, Result};

/// Delivery confirmation from the notification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub status: u16,
    /// Service-assigned request id, when the response body carries one.
    pub request_id: Option<String>,
}

/// Sends a single notification.
pub trait AlertDispatcher {
    fn dispatch(&self, message: &str, destination: &str) -> Result<Ack>;
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    #[serde(default)]
    request: Option<String>,
}

/// Form body with the three fixed field names.
#[must_use]
pub fn form_fields<'a>(
    token: &'a str,
    user: &'a str,
    message: &'a str,
) -> [(&'static str, &'a str); 3] {
    [("token", token), ("user", user), ("message", message)]
}

fn parse_ack(status: u16, body: &str) -> Ack {
    let request_id = serde_json::from_str::<PushoverResponse>(body)
        .ok()
        .and_then(|r| r.request);
    Ack { status, request_id }
}

/// Blocking HTTPS dispatcher.
#[derive(Debug, Clone)]
pub struct PushoverDispatcher {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl PushoverDispatcher {
    /// Build from the `[alert]` section. Rejects non-https endpoints.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate_alert()?;
        let client = reqwest::blocking::Client::builder()
            .https_only(true)
            .timeout(Duration::from_secs(config.alert.timeout_secs))
            .user_agent(concat!("noised/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NoisedError::Dispatch {
                details: format!("cannot build HTTPS client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: config.alert.endpoint.clone(),
            token: config.alert.token.clone(),
        })
    }
}

impl AlertDispatcher for PushoverDispatcher {
    fn dispatch(&self, message: &str, destination: &str) -> Result<Ack> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form_fields(&self.token, destination, message))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NoisedError::DispatchRejected {
                status: status.as_u16(),
            });
        }
        let body = response.text().unwrap_or_default();
        Ok(parse_ack(status.as_u16(), &body))
    }
}
