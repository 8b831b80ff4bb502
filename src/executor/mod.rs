//! Action Executor
//!
//! Applies decided actions against the ad platform, one at a time. Every
//! call carries its own timeout, and a failure becomes that action's
//! `failed{cause}` outcome without touching the rest of the batch. There is
//! no retry inside a run; the next scheduled run re-evaluates fresh metrics.

mod dry_run;
mod http;

pub use dry_run::DryRunPlatform;
pub use http::HttpAdPlatform;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{Action, ActionOutcome, ExecutedAction};

/// Typed failures from the ad platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("platform rate limit hit")]
    RateLimited,
    #[error("platform call timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError::Transport(e.to_string())
    }
}

/// External capability that applies pause and bid commands.
#[async_trait]
pub trait AdPlatform: Send + Sync {
    async fn pause_creative(&self, creative_id: &str) -> Result<(), PlatformError>;

    async fn update_campaign_bid(&self, campaign_id: &str, bid: f64) -> Result<(), PlatformError>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Runs actions against a platform with a per-call timeout.
#[derive(Clone)]
pub struct ActionExecutor {
    platform: Arc<dyn AdPlatform>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn AdPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    pub fn platform_name(&self) -> &str {
        self.platform.name()
    }

    /// Apply one action and attach its outcome. Never fails.
    pub async fn execute(&self, action: Action) -> ExecutedAction {
        let outcome = match self.apply(&action).await {
            Ok(()) => {
                info!(
                    action = %action.kind(),
                    resource = action.resource_id(),
                    platform = self.platform.name(),
                    "Action applied"
                );
                ActionOutcome::Applied
            }
            Err(e) => {
                warn!(
                    action = %action.kind(),
                    resource = action.resource_id(),
                    platform = self.platform.name(),
                    error = %e,
                    "Action failed"
                );
                ActionOutcome::Failed { cause: e.to_string() }
            }
        };
        ExecutedAction {
            action,
            outcome,
            executed_at: Utc::now(),
        }
    }

    async fn apply(&self, action: &Action) -> Result<(), PlatformError> {
        match action {
            Action::PauseCreative { creative_id, .. } => {
                self.with_timeout(self.platform.pause_creative(creative_id)).await
            }
            Action::AdjustBid { campaign_id, new_bid, .. } => {
                self.with_timeout(self.platform.update_campaign_bid(campaign_id, *new_bid))
                    .await
            }
            // Recorded for the ledger and summary only
            Action::FlagWinner { .. } => Ok(()),
        }
    }

    async fn with_timeout<F>(&self, call: F) -> Result<(), PlatformError>
    where
        F: std::future::Future<Output = Result<(), PlatformError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionMetrics, BidSource};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AdPlatform for Recording {
        async fn pause_creative(&self, creative_id: &str) -> Result<(), PlatformError> {
            self.calls.lock().unwrap().push(format!("pause:{creative_id}"));
            if creative_id == "bad" {
                return Err(PlatformError::Rejected { status: 400, body: "nope".into() });
            }
            Ok(())
        }

        async fn update_campaign_bid(&self, campaign_id: &str, bid: f64) -> Result<(), PlatformError> {
            self.calls.lock().unwrap().push(format!("bid:{campaign_id}:{bid:.2}"));
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Hanging;

    #[async_trait]
    impl AdPlatform for Hanging {
        async fn pause_creative(&self, _creative_id: &str) -> Result<(), PlatformError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn update_campaign_bid(&self, _campaign_id: &str, _bid: f64) -> Result<(), PlatformError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn pause(id: &str) -> Action {
        Action::PauseCreative {
            creative_id: id.into(),
            campaign_id: "K1".into(),
            reason: "low CTR (0.50%) below threshold".into(),
            metrics: ActionMetrics { ctr: 0.5, cpc: 2.0, clicks: 150, impressions: 30_000, cost: 300.0 },
        }
    }

    #[tokio::test]
    async fn rejection_becomes_failed_outcome() {
        let platform = Arc::new(Recording::default());
        let exec = ActionExecutor::new(platform.clone(), Duration::from_secs(1));

        let failed = exec.execute(pause("bad")).await;
        let ok = exec.execute(pause("good")).await;

        assert!(matches!(failed.outcome, ActionOutcome::Failed { ref cause } if cause.contains("400")));
        assert!(ok.outcome.is_applied());
        assert_eq!(platform.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bid_update_uses_new_bid() {
        let platform = Arc::new(Recording::default());
        let exec = ActionExecutor::new(platform.clone(), Duration::from_secs(1));
        let action = Action::AdjustBid {
            campaign_id: "K9".into(),
            old_bid: 4.0,
            new_bid: 8.0,
            source: BidSource::Heuristic,
            reason: String::new(),
        };
        assert!(exec.execute(action).await.outcome.is_applied());
        assert_eq!(platform.calls.lock().unwrap()[0], "bid:K9:8.00");
    }

    #[tokio::test]
    async fn winner_makes_no_platform_call() {
        let platform = Arc::new(Recording::default());
        let exec = ActionExecutor::new(platform.clone(), Duration::from_secs(1));
        let action = Action::FlagWinner {
            creative_id: "C2".into(),
            campaign_id: "K1".into(),
            reason: String::new(),
            metrics: ActionMetrics { ctr: 4.5, cpc: 3.0, clicks: 200, impressions: 4_000, cost: 600.0 },
        };
        assert!(exec.execute(action).await.outcome.is_applied());
        assert!(platform.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let exec = ActionExecutor::new(Arc::new(Hanging), Duration::from_millis(50));
        let executed = exec.execute(pause("C1")).await;
        assert!(matches!(executed.outcome, ActionOutcome::Failed { ref cause } if cause.contains("timed out")));
    }
}
