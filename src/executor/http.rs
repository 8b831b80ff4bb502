//! HTTP ad platform client (Marketing REST API)

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use super::{AdPlatform, PlatformError};
use crate::config::PlatformConfig;

/// Restli protocol version required by the campaign endpoints.
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Authenticated client for creative and campaign updates.
#[derive(Clone)]
pub struct HttpAdPlatform {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    api_version: String,
    currency: String,
}

impl std::fmt::Debug for HttpAdPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdPlatform")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl HttpAdPlatform {
    /// Create a client. The per-call timeout is enforced by the executor.
    pub fn new(config: &PlatformConfig, access_token: &str) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            api_version: config.api_version.clone(),
            currency: config.currency.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn patch(&self, url: String, body: serde_json::Value) -> Result<(), PlatformError> {
        let resp = self
            .http
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .header("LinkedIn-Version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        status_to_result(status, body)
    }
}

/// Map a response status onto the platform error taxonomy.
pub(crate) fn status_to_result(status: StatusCode, body: String) -> Result<(), PlatformError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(PlatformError::RateLimited)
    } else {
        Err(PlatformError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Bid amounts go over the wire as a two-decimal string.
pub(crate) fn bid_body(bid: f64, currency: &str) -> serde_json::Value {
    json!({
        "unitCost": {
            "amount": format!("{bid:.2}"),
            "currencyCode": currency,
        }
    })
}

#[async_trait]
impl AdPlatform for HttpAdPlatform {
    async fn pause_creative(&self, creative_id: &str) -> Result<(), PlatformError> {
        self.patch(
            format!("{}/creatives/{}", self.base_url, creative_id),
            json!({ "status": "PAUSED" }),
        )
        .await
    }

    async fn update_campaign_bid(&self, campaign_id: &str, bid: f64) -> Result<(), PlatformError> {
        self.patch(
            format!("{}/adCampaigns/{}", self.base_url, campaign_id),
            bid_body(bid, &self.currency),
        )
        .await
    }

    fn name(&self) -> &str {
        "http"
    }
}
