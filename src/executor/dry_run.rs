use async_trait::async_trait;
use tracing::info;

use super::{AdPlatform, PlatformError};

/// Logs each operation and reports success without contacting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPlatform;

#[async_trait]
impl AdPlatform for DryRunPlatform {
    async fn pause_creative(&self, creative_id: &str) -> Result<(), PlatformError> {
        info!(creative = creative_id, "[dry-run] would pause creative");
        Ok(())
    }

    async fn update_campaign_bid(&self, campaign_id: &str, bid: f64) -> Result<(), PlatformError> {
        info!(campaign = campaign_id, bid = format!("{bid:.2}"), "[dry-run] would update bid");
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
