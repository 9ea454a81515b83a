use std::time::Instant;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NotificationKind;
use crate::observability;

use super::{BookingEngine, EngineError, first_conflict, now_ms, with_store_retry};

/// Input for `create_booking`. Validated before anything is persisted.
#[derive(Debug, Clone, Copy)]
pub struct BookingRequest {
    pub owner_id: Ulid,
    pub dog_id: Ulid,
    pub walker_id: Ulid,
    pub start: Ms,
    pub end: Ms,
}

fn validate_request(req: &BookingRequest, now: Ms) -> Result<(), EngineError> {
    if req.owner_id.is_nil() {
        return Err(EngineError::Validation("owner_id is required"));
    }
    if req.dog_id.is_nil() {
        return Err(EngineError::Validation("dog_id is required"));
    }
    if req.walker_id.is_nil() {
        return Err(EngineError::Validation("walker_id is required"));
    }
    if req.start < MIN_VALID_TIMESTAMP_MS || req.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    if req.end <= req.start {
        return Err(EngineError::Validation("end_time must be after start_time"));
    }
    if req.end - req.start > MAX_SPAN_DURATION_MS {
        return Err(EngineError::Validation("walk duration too long"));
    }
    if req.start < now - CLOCK_SKEW_TOLERANCE_MS {
        return Err(EngineError::Validation("start_time is in the past"));
    }
    Ok(())
}

impl BookingEngine {
    /// Create a booking for a walker.
    ///
    /// The booking is persisted at `Requested` under the walker's exclusion
    /// lock; that write is the atomic commit point. A committed
    /// (`Confirmed`/`InProgress`) overlap fails with `Conflict` before
    /// anything is persisted; overlapping `Requested` bookings are tolerated
    /// and arbitrated at confirmation time. Pricing runs after the commit
    /// point: on success the booking is confirmed with its price, on failure
    /// the booking stays `Requested` and `Downstream` is surfaced without
    /// rollback. Losing the confirmation race to a competing request surfaces
    /// `Conflict`, likewise leaving the booking at `Requested`. On every path
    /// where the booking was persisted, its creation is announced to owner
    /// and walker best-effort.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let now = now_ms();
        validate_request(&req, now)?;
        let span = Span::new(req.start, req.end);

        let booking = {
            let _guard = self.walker_lock(req.walker_id).lock_owned().await;

            let conflicts = with_store_retry("find_overlapping", || {
                self.store
                    .find_overlapping(req.walker_id, span, COMMITTED_STATUSES, None)
            })
            .await?;
            if let Some(hit) = first_conflict(&span, &conflicts) {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(hit.id));
            }

            let booking = Booking {
                id: Ulid::new(),
                owner_id: req.owner_id,
                dog_id: req.dog_id,
                walker_id: req.walker_id,
                span,
                status: BookingStatus::Requested,
                price: None,
                created_at: now,
                updated_at: now,
                version: 1,
            };
            with_store_retry("save", || self.store.save(booking.clone())).await?
        };

        tracing::info!(
            booking = %booking.id,
            walker = %booking.walker_id,
            owner = %booking.owner_id,
            "booking requested"
        );

        let confirmed = match self.pricing.calculate_price(&booking).await {
            Ok(price) => {
                match self
                    .apply_transition(booking.id, BookingStatus::Confirmed, Some(price), false)
                    .await
                {
                    Ok(confirmed) => confirmed,
                    Err(e @ EngineError::Conflict(_)) => {
                        // Lost the confirmation race. The booking stays
                        // persisted at Requested, so its creation is still
                        // announced to both parties.
                        let message = format!(
                            "booking {} requested for walker {}",
                            booking.id, booking.walker_id
                        );
                        self.notify_parties(&booking, NotificationKind::BookingCreated, &message)
                            .await;
                        return Err(e);
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => {
                metrics::counter!(observability::PRICING_FAILURES_TOTAL).increment(1);
                tracing::warn!(booking = %booking.id, "pricing failed, booking stays requested: {e}");
                let message = format!(
                    "booking {} requested for walker {}",
                    booking.id, booking.walker_id
                );
                self.notify_parties(&booking, NotificationKind::BookingCreated, &message)
                    .await;
                return Err(EngineError::Downstream(format!("pricing: {e}")));
            }
        };

        metrics::counter!(
            observability::BOOKINGS_CREATED_TOTAL,
            "status" => confirmed.status.as_str()
        )
        .increment(1);
        metrics::histogram!(observability::CREATE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let message = format!(
            "booking {} created for walker {}",
            confirmed.id, confirmed.walker_id
        );
        self.notify_parties(&confirmed, NotificationKind::BookingCreated, &message)
            .await;
        Ok(confirmed)
    }

    /// Apply a status transition. Fails with `NotFound` for unknown ids and
    /// `InvalidTransition` for edges outside the state machine; transitions
    /// to `Confirmed` re-validate walker availability. Dispatches a
    /// best-effort status-change notification to owner and walker.
    pub async fn update_status(
        &self,
        booking_id: Ulid,
        target: BookingStatus,
    ) -> Result<Booking, EngineError> {
        self.apply_transition(booking_id, target, None, true).await
    }

    /// Cancel a booking. Cancelling an already-cancelled booking is
    /// idempotent: the stored booking is returned unchanged and no duplicate
    /// notification is sent. `InProgress` and `Completed` bookings can never
    /// be cancelled.
    pub async fn cancel_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        let current = self.load(booking_id).await?;
        if current.status == BookingStatus::Cancelled {
            return Ok(current);
        }
        self.update_status(booking_id, BookingStatus::Cancelled).await
    }
}
