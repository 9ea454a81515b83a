//! Hard limits and budgets. Everything user-supplied is bounded.

use crate::model::Ms;

/// Reject timestamps before the epoch.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// Reject timestamps after 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single walk may not exceed 24 hours.
pub const MAX_SPAN_DURATION_MS: Ms = 24 * 3_600_000;

/// Availability queries are clamped to 90 days.
pub const MAX_QUERY_WINDOW_MS: Ms = 90 * 24 * 3_600_000;

/// A booking may start slightly in the past to absorb client clock skew.
pub const CLOCK_SKEW_TOLERANCE_MS: Ms = 5 * 60_000;

/// Transient store failures are retried this many times before giving up.
pub const STORE_RETRY_BUDGET: u32 = 3;

/// Base delay for store retry backoff; doubles per attempt.
pub const STORE_RETRY_BASE_DELAY_MS: u64 = 25;

/// Optimistic-concurrency conflicts restart the read-check-write loop
/// at most this many times.
pub const OCC_RETRY_BUDGET: u32 = 3;
