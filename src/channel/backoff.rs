//! Exponential reconnect backoff.

use std::time::Duration;

/// `min(base * 2^attempt, cap)`, saturating so large attempt counts cannot
/// overflow. Non-decreasing in `attempt` and bounded by `cap`.
pub fn reconnect_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = base_ms.saturating_mul(factor).min(cap_ms);
    Duration::from_millis(delay)
}
