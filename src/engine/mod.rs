mod availability;
mod error;
mod mutations;
mod queries;

pub use availability::{first_conflict, free_windows, merge_overlapping, subtract_busy};
pub use error::EngineError;
pub use mutations::BookingRequest;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::{NotificationGateway, NotificationKind};
use crate::observability;
use crate::pricing::PricingGateway;
use crate::store::{BookingStore, StoreError};

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Run a store call, retrying transient failures with exponential backoff
/// up to the retry budget. Non-transient errors surface immediately.
async fn with_store_retry<T, F, Fut>(op: &'static str, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(StoreError::Unavailable(msg)) if attempt < STORE_RETRY_BUDGET => {
                attempt += 1;
                metrics::counter!(observability::STORE_RETRIES_TOTAL).increment(1);
                tracing::warn!(op, attempt, "transient store failure: {msg}");
                tokio::time::sleep(Duration::from_millis(
                    STORE_RETRY_BASE_DELAY_MS << attempt,
                ))
                .await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Orchestrates booking validation, availability checking, state transitions,
/// persistence, and collaborator dispatch. Collaborators are injected; the
/// store is the single source of truth.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    pricing: Arc<dyn PricingGateway>,
    notifier: Arc<dyn NotificationGateway>,
    /// Per-walker exclusion for the check-then-persist sequence. Operations
    /// on different walkers never contend.
    walker_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        pricing: Arc<dyn PricingGateway>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            store,
            pricing,
            notifier,
            walker_locks: DashMap::new(),
        }
    }

    fn walker_lock(&self, walker_id: Ulid) -> Arc<Mutex<()>> {
        self.walker_locks
            .entry(walker_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        Ok(with_store_retry("find_by_id", || self.store.find_by_id(booking_id)).await?)
    }

    /// Best-effort dispatch to owner and walker. Failures are logged and
    /// counted, never propagated.
    async fn notify_parties(&self, booking: &Booking, kind: NotificationKind, message: &str) {
        for recipient in [booking.owner_id, booking.walker_id] {
            if let Err(e) = self
                .notifier
                .send_notification(recipient, kind, message, booking.id)
                .await
            {
                metrics::counter!(observability::NOTIFICATION_FAILURES_TOTAL).increment(1);
                tracing::warn!(booking = %booking.id, recipient = %recipient, "notification dispatch failed: {e}");
            }
        }
    }

    /// Core transition path shared by `update_status`, `cancel_booking`, and
    /// the auto-confirmation inside `create_booking`.
    ///
    /// Confirmation re-validates availability under the walker lock: of two
    /// tentative requests for overlapping spans, the first successful
    /// confirmation wins and the other fails here with `Conflict`. A stale
    /// save (`VersionConflict`) restarts the read-check-write loop.
    async fn apply_transition(
        &self,
        booking_id: Ulid,
        target: BookingStatus,
        price: Option<Decimal>,
        notify: bool,
    ) -> Result<Booking, EngineError> {
        let mut occ_attempt = 0u32;
        loop {
            let current = self.load(booking_id).await?;
            if !current.status.can_transition_to(target) {
                return Err(EngineError::InvalidTransition {
                    from: current.status,
                    to: target,
                });
            }

            let _guard = if target == BookingStatus::Confirmed {
                let guard = self.walker_lock(current.walker_id).lock_owned().await;
                let conflicts = with_store_retry("find_overlapping", || {
                    self.store.find_overlapping(
                        current.walker_id,
                        current.span,
                        COMMITTED_STATUSES,
                        Some(current.id),
                    )
                })
                .await?;
                if let Some(hit) = first_conflict(&current.span, &conflicts) {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                    return Err(EngineError::Conflict(hit.id));
                }
                Some(guard)
            } else {
                None
            };

            let mut next = current.clone();
            next.status = target;
            if next.price.is_none() {
                next.price = price;
            }
            next.updated_at = now_ms();
            next.version = current.version + 1;

            match with_store_retry("save", || self.store.save(next.clone())).await {
                Ok(saved) => {
                    metrics::counter!(observability::TRANSITIONS_TOTAL, "target" => target.as_str())
                        .increment(1);
                    tracing::info!(
                        booking = %saved.id,
                        from = current.status.as_str(),
                        to = target.as_str(),
                        "status transition"
                    );
                    if notify {
                        let message =
                            format!("booking {} is now {}", saved.id, target.as_str());
                        self.notify_parties(&saved, NotificationKind::StatusChanged, &message)
                            .await;
                    }
                    return Ok(saved);
                }
                Err(StoreError::VersionConflict(_)) if occ_attempt < OCC_RETRY_BUDGET => {
                    occ_attempt += 1;
                    tracing::warn!(booking = %booking_id, occ_attempt, "stale save, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
