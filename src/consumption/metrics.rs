// Ledger metrics
//
// Counts purchase outcomes and window resets, and times each
// check-and-record cycle so slow decisions show up in the logs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Decisions slower than this are logged and counted (100ms)
const SLOW_DECISION_THRESHOLD_MS: u64 = 100;

/// Shared counters for the consumption ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    // Outcomes
    approved: AtomicU64,
    rejected: AtomicU64,

    // Resets
    window_resets: AtomicU64,
    sweep_resets: AtomicU64,
    sweep_failures: AtomicU64,

    inconsistencies: AtomicU64,

    // Policy cache
    policy_cache_hits: AtomicU64,
    policy_cache_misses: AtomicU64,

    // Decision timing (in microseconds)
    decisions: AtomicU64,
    total_decision_time_us: AtomicU64,
    slow_decisions: AtomicU64,
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_approved(&self) {
        self.inner.approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// A stale window reset lazily on the purchase path
    pub fn record_window_reset(&self) {
        self.inner.window_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Accounts reset by one sweep pass
    pub fn record_sweep_resets(&self, count: usize) {
        self.inner
            .sweep_resets
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sweep_failure(&self) {
        self.inner.sweep_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Purchase stored but account update lost
    pub fn record_inconsistency(&self) {
        self.inner.inconsistencies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.policy_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.policy_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Policy cache hit rate (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.policy_cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.policy_cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing a decision; the duration is recorded when the timer drops
    pub fn start_decision(&self) -> DecisionTimer {
        DecisionTimer {
            start: Instant::now(),
            metrics: self.clone(),
        }
    }

    fn record_decision(&self, duration: Duration) {
        self.inner.decisions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_decision_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_DECISION_THRESHOLD_MS {
            self.inner.slow_decisions.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow purchase decision: {}ms", duration.as_millis());
        }
    }

    /// Average decision time in milliseconds
    pub fn avg_decision_time_ms(&self) -> f64 {
        let count = self.inner.decisions.load(Ordering::Relaxed);
        let total_us = self.inner.total_decision_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            approved: load(&self.inner.approved),
            rejected: load(&self.inner.rejected),
            window_resets: load(&self.inner.window_resets),
            sweep_resets: load(&self.inner.sweep_resets),
            sweep_failures: load(&self.inner.sweep_failures),
            inconsistencies: load(&self.inner.inconsistencies),
            policy_cache_hit_rate: self.cache_hit_rate(),
            decisions: load(&self.inner.decisions),
            avg_decision_time_ms: self.avg_decision_time_ms(),
            slow_decisions: load(&self.inner.slow_decisions),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            "Ledger metrics: {} approved, {} rejected, {} lazy resets, {} swept, \
             {} sweep failures, {} inconsistencies, policy cache {:.1}% hit, \
             avg decision {:.2}ms ({} slow)",
            s.approved,
            s.rejected,
            s.window_resets,
            s.sweep_resets,
            s.sweep_failures,
            s.inconsistencies,
            s.policy_cache_hit_rate * 100.0,
            s.avg_decision_time_ms,
            s.slow_decisions,
        );
    }
}

/// Measures one purchase decision
pub struct DecisionTimer {
    start: Instant,
    metrics: LedgerMetrics,
}

impl Drop for DecisionTimer {
    fn drop(&mut self) {
        self.metrics.record_decision(self.start.elapsed());
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub approved: u64,
    pub rejected: u64,
    pub window_resets: u64,
    pub sweep_resets: u64,
    pub sweep_failures: u64,
    pub inconsistencies: u64,
    pub policy_cache_hit_rate: f64,
    pub decisions: u64,
    pub avg_decision_time_ms: f64,
    pub slow_decisions: u64,
}
