use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::rate_limits::{RateLimitDecision, RateLimitPolicy};

/// Counter store keyed by caller identity. Entries expire after the policy window.
#[automock]
#[async_trait]
pub trait RateLimitStore {
    async fn hit(&self, key: &str, policy: RateLimitPolicy) -> Result<RateLimitDecision>;
}
