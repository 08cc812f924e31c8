use chrono::{DateTime, Duration, Utc};

/// Staleness rule for the rolling consumption window
///
/// Shared by reset-on-scan in the ledger and by the periodic sweep so the
/// two paths cannot disagree about when a window has elapsed.
pub struct ConsumptionWindowPolicy;

impl ConsumptionWindowPolicy {
    /// True iff at least `window_hours` have elapsed since `window_start`.
    ///
    /// A `window_start` in the future (clock skew) is never stale.
    pub fn is_stale(window_start: DateTime<Utc>, window_hours: i32, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(window_start) >= Duration::hours(i64::from(window_hours))
    }
}
