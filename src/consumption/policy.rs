// Allowance policy cache
//
// The policy is read on every purchase but changes rarely. Reads are served
// from memory for a short TTL; updates write through and replace the cached
// value so the next decision sees the new limit.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::consumption::error::LedgerResult;
use crate::consumption::metrics::LedgerMetrics;
use crate::consumption::models::AllowancePolicy;
use crate::consumption::repository::PolicyStore;

/// Default time-to-live for the cached policy (60 seconds)
pub const DEFAULT_POLICY_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedPolicy {
    policy: AllowancePolicy,
    loaded_at: Instant,
}

/// Read-through cache in front of another `PolicyStore`
pub struct CachedPolicyStore {
    inner: Arc<dyn PolicyStore>,
    cache: RwLock<Option<CachedPolicy>>,
    ttl: Duration,
    metrics: Option<LedgerMetrics>,
}

impl CachedPolicyStore {
    pub fn new(inner: Arc<dyn PolicyStore>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
            ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(inner: Arc<dyn PolicyStore>, ttl: Duration, metrics: LedgerMetrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(inner, ttl)
        }
    }

    fn fresh(&self, cached: &Option<CachedPolicy>) -> Option<AllowancePolicy> {
        cached
            .as_ref()
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| entry.policy.clone())
    }
}

#[async_trait]
impl PolicyStore for CachedPolicyStore {
    async fn get_allowance_policy(&self) -> LedgerResult<AllowancePolicy> {
        if let Some(policy) = self.fresh(&*self.cache.read().await) {
            if let Some(ref metrics) = self.metrics {
                metrics.record_cache_hit();
            }
            return Ok(policy);
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(policy) = self.fresh(&cache) {
            return Ok(policy);
        }

        if let Some(ref metrics) = self.metrics {
            metrics.record_cache_miss();
        }
        tracing::debug!("Allowance policy cache stale, reloading");

        let policy = self.inner.get_allowance_policy().await?;
        *cache = Some(CachedPolicy {
            policy: policy.clone(),
            loaded_at: Instant::now(),
        });
        Ok(policy)
    }

    async fn update_allowance_policy(&self, policy: &AllowancePolicy) -> LedgerResult<AllowancePolicy> {
        let mut cache = self.cache.write().await;
        match self.inner.update_allowance_policy(policy).await {
            Ok(updated) => {
                *cache = Some(CachedPolicy {
                    policy: updated.clone(),
                    loaded_at: Instant::now(),
                });
                Ok(updated)
            }
            Err(e) => {
                *cache = None;
                Err(e)
            }
        }
    }
}
