use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::free_windows;
use super::{BookingEngine, EngineError, with_store_retry};

fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    if end <= start {
        return Err(EngineError::Validation("end_time must be after start_time"));
    }
    if end - start > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::Validation("query window too wide"));
    }
    Ok(Span::new(start, end))
}

impl BookingEngine {
    /// True iff no committed (`Confirmed`/`InProgress`) booking for the
    /// walker overlaps `[start, end)`. Read-only; used internally before
    /// commitment and exposed as a public query.
    pub async fn check_walker_availability(
        &self,
        walker_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<bool, EngineError> {
        let span = validate_window(start, end)?;
        let hits = with_store_retry("find_overlapping", || {
            self.store
                .find_overlapping(walker_id, span, COMMITTED_STATUSES, None)
        })
        .await?;
        Ok(hits.is_empty())
    }

    /// The walker's free sub-windows of `[start, end)` once committed
    /// bookings are subtracted.
    pub async fn walker_free_windows(
        &self,
        walker_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Vec<Span>, EngineError> {
        let window = validate_window(start, end)?;
        let committed = with_store_retry("find_overlapping", || {
            self.store
                .find_overlapping(walker_id, window, COMMITTED_STATUSES, None)
        })
        .await?;
        let busy: Vec<Span> = committed.iter().map(|b| b.span).collect();
        Ok(free_windows(&window, &busy))
    }

    /// All bookings ever made with this walker, in arbitrary order.
    pub async fn get_bookings_by_walker(
        &self,
        walker_id: Ulid,
    ) -> Result<Vec<Booking>, EngineError> {
        Ok(with_store_retry("find_by_walker", || self.store.find_by_walker(walker_id)).await?)
    }

    /// All bookings ever made by this owner, in arbitrary order.
    pub async fn get_bookings_by_owner(
        &self,
        owner_id: Ulid,
    ) -> Result<Vec<Booking>, EngineError> {
        Ok(with_store_retry("find_by_owner", || self.store.find_by_owner(owner_id)).await?)
    }
}
