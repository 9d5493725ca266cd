//! Browser-automation bridge channel.
//!
//! The bridge is a local sidecar that owns the real browser session; this
//! channel talks to it over a small JSON API. Every call maps bridge
//! failures into `ProspectorError::Channel` with the bridge's own error
//! text preserved, since that text drives failure classification upstream.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prospector_core::config::ChannelConfig;
use prospector_core::error::{ProspectorError, Result};
use prospector_core::traits::OutreachChannel;
use prospector_core::types::ProfileDetails;

/// Channel backed by the automation sidecar.
pub struct BridgeChannel {
    config: ChannelConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    profile_url: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    profile_url: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectResult {
    /// "already_connected", "pending", or whatever the bridge reports.
    outcome: String,
}

impl BridgeChannel {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProspectorError::Channel(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.bridge_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ProspectorError::Channel(format!("bridge {path} failed: {e}")))?;

        let body: BridgeResponse<T> = response
            .json()
            .await
            .map_err(|e| ProspectorError::Channel(format!("invalid bridge response: {e}")))?;

        if !body.ok {
            return Err(ProspectorError::Channel(
                body.error.unwrap_or_else(|| format!("bridge {path} error")),
            ));
        }
        body.result
            .ok_or_else(|| ProspectorError::Channel(format!("bridge {path}: empty result")))
    }
}

#[async_trait]
impl OutreachChannel for BridgeChannel {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn open(&self) -> Result<()> {
        tracing::info!("🔌 Opening bridge session at {}", self.config.bridge_url);
        let _: serde_json::Value = self
            .post(
                "session/open",
                &SessionRequest {
                    email: &self.config.email,
                    password: &self.config.password,
                },
            )
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let _: serde_json::Value = self.post("session/close", &serde_json::json!({})).await?;
        tracing::info!("🔌 Bridge session closed");
        Ok(())
    }

    async fn send_connection_request(&self, profile_url: &str, message: &str) -> Result<String> {
        let result: ConnectResult = self
            .post("actions/connect", &ConnectRequest { profile_url, message })
            .await?;
        Ok(result.outcome)
    }

    async fn send_message(&self, profile_url: &str, message: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post("actions/message", &MessageRequest { profile_url, message })
            .await?;
        Ok(())
    }

    async fn scrape_profile_details(&self, profile_url: &str) -> Result<ProfileDetails> {
        self.post(
            "actions/scrape",
            &serde_json::json!({ "profile_url": profile_url }),
        )
        .await
    }
}
