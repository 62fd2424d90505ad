use anyhow::Result;
use async_trait::async_trait;
use std::{collections::HashMap, time::Instant};
use tokio::sync::Mutex;

use crate::domain::{
    repositories::rate_limits::RateLimitStore,
    value_objects::rate_limits::{RateLimitDecision, RateLimitPolicy},
};

#[derive(Debug, Clone, Copy)]
struct Window {
    hits: u32,
    expires_at: Instant,
}

/// Fixed-window counters held in process memory.
///
/// Each key's window starts at its first hit and expires after `policy.window`.
/// Expired entries are swept on every call so the map only holds live windows.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn hit_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().await;
        windows.retain(|_, window| window.expires_at > now);

        let window = windows.entry(key.to_string()).or_insert(Window {
            hits: 0,
            expires_at: now + policy.window,
        });

        if window.hits >= policy.max_hits {
            return RateLimitDecision::Limited {
                retry_after: window.expires_at.saturating_duration_since(now),
            };
        }

        window.hits += 1;
        RateLimitDecision::Allowed {
            remaining: policy.max_hits - window.hits,
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, policy: RateLimitPolicy) -> Result<RateLimitDecision> {
        Ok(self.hit_at(key, policy, Instant::now()).await)
    }
}
