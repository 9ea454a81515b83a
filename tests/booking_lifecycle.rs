//! End-to-end booking lifecycle scenarios against the reference
//! collaborators (in-memory store, hourly pricing, broadcast notifier).

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ulid::Ulid;

use leash::engine::{BookingEngine, BookingRequest, EngineError};
use leash::model::{BookingStatus, Ms, Span};
use leash::notify::{BroadcastNotifier, NotificationKind};
use leash::pricing::{HourlyRatePricing, PricingError, PricingGateway};
use leash::store::{BookingStore, InMemoryStore};

const H: Ms = 3_600_000;
const M: Ms = 60_000;

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

struct FlatPricing(Decimal);

#[async_trait]
impl PricingGateway for FlatPricing {
    async fn calculate_price(
        &self,
        _booking: &leash::model::Booking,
    ) -> Result<Decimal, PricingError> {
        Ok(self.0)
    }
}

fn flat_engine() -> (BookingEngine, Arc<InMemoryStore>, Arc<BroadcastNotifier>) {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(BroadcastNotifier::new());
    let engine = BookingEngine::new(
        store.clone(),
        Arc::new(FlatPricing(dec!(29.99))),
        notifier.clone(),
    );
    (engine, store, notifier)
}

fn request(owner_id: Ulid, walker_id: Ulid, start: Ms, end: Ms) -> BookingRequest {
    BookingRequest {
        owner_id,
        dog_id: Ulid::new(),
        walker_id,
        start,
        end,
    }
}

#[tokio::test]
async fn scenario_create_confirms_and_prices() {
    let (engine, _, _) = flat_engine();
    let t = now_ms();

    let booking = engine
        .create_booking(request(Ulid::new(), Ulid::new(), t + 60 * M, t + 120 * M))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.price, Some(dec!(29.99)));
    assert!(!booking.id.is_nil());
}

#[tokio::test]
async fn scenario_validation_failure_touches_nothing() {
    let (engine, store, _) = flat_engine();
    let t = now_ms();

    let missing_owner = BookingRequest {
        owner_id: Ulid::nil(),
        dog_id: Ulid::new(),
        walker_id: Ulid::new(),
        start: t + H,
        end: t + 2 * H,
    };
    assert!(matches!(
        engine.create_booking(missing_owner).await,
        Err(EngineError::Validation(_))
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn scenario_double_booking_rejected() {
    let (engine, _, _) = flat_engine();
    let walker = Ulid::new();
    let t = now_ms();

    engine
        .create_booking(request(Ulid::new(), walker, t + 30 * M, t + 90 * M))
        .await
        .unwrap();

    let second = engine
        .create_booking(request(Ulid::new(), walker, t + 60 * M, t + 120 * M))
        .await;
    assert!(matches!(second, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn scenario_cancellation_notifies_once_per_party() {
    let (engine, _, notifier) = flat_engine();
    let owner = Ulid::new();
    let walker = Ulid::new();
    let t = now_ms();

    let booking = engine
        .create_booking(request(owner, walker, t + H, t + 2 * H))
        .await
        .unwrap();

    let mut owner_rx = notifier.subscribe(owner);
    let mut walker_rx = notifier.subscribe(walker);

    let cancelled = engine.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    for rx in [&mut owner_rx, &mut walker_rx] {
        let n = rx.recv().await.unwrap();
        assert_eq!(n.kind, NotificationKind::StatusChanged);
        assert_eq!(n.booking_id, booking.id);
    }

    // Second cancel is a no-op: same booking, no further notification.
    let again = engine.cancel_booking(booking.id).await.unwrap();
    assert_eq!(again, cancelled);
    assert!(owner_rx.try_recv().is_err());
    assert!(walker_rx.try_recv().is_err());
}

#[tokio::test]
async fn scenario_walker_history_after_creation() {
    let (engine, _, _) = flat_engine();
    let walker = Ulid::new();
    let t = now_ms();

    engine
        .create_booking(request(Ulid::new(), walker, t + 60 * M, t + 120 * M))
        .await
        .unwrap();

    let history = engine.get_bookings_by_walker(walker).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].walker_id, walker);
}

#[tokio::test]
async fn hourly_pricing_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let engine = BookingEngine::new(
        store,
        Arc::new(HourlyRatePricing),
        Arc::new(BroadcastNotifier::new()),
    );
    let t = now_ms();

    let booking = engine
        .create_booking(request(Ulid::new(), Ulid::new(), t + H, t + 2 * H))
        .await
        .unwrap();

    // One hour at 35.00/h, at most peak (1.25) and weekend (1.20) on top.
    let price = booking.price.unwrap();
    assert!(price >= dec!(35.00) && price <= dec!(52.50), "price = {price}");
    assert!(price.scale() <= 2);
}

#[tokio::test]
async fn contended_slot_confirms_exactly_once() {
    let (engine, store, _) = flat_engine();
    let engine = Arc::new(engine);
    let walker = Ulid::new();
    let t = now_ms();

    let mut handles = Vec::new();
    for i in 0..8i64 {
        let engine = engine.clone();
        // All spans overlap the busy hour [t+1h, t+2h).
        let start = t + H + (i % 4) * 10 * M;
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(request(Ulid::new(), walker, start, start + H))
                .await
        }));
    }

    let mut confirmed = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            confirmed += 1;
        }
    }
    assert!(confirmed >= 1);

    // However the race resolved, no two committed bookings overlap.
    let committed: Vec<Span> = store
        .find_by_walker(walker)
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.status.is_committed())
        .map(|b| b.span)
        .collect();
    for (i, a) in committed.iter().enumerate() {
        for b in &committed[i + 1..] {
            assert!(!a.overlaps(b), "committed bookings overlap: {a:?} vs {b:?}");
        }
    }
}

#[tokio::test]
async fn full_lifecycle_to_completion() {
    let (engine, _, _) = flat_engine();
    let t = now_ms();

    let booking = engine
        .create_booking(request(Ulid::new(), Ulid::new(), t + H, t + 2 * H))
        .await
        .unwrap();

    let walking = engine
        .update_status(booking.id, BookingStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(walking.status, BookingStatus::InProgress);

    let done = engine
        .update_status(booking.id, BookingStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, BookingStatus::Completed);
    assert!(done.status.is_terminal());
    assert_eq!(done.price, booking.price);
    assert_eq!(done.created_at, booking.created_at);
    assert!(done.updated_at >= booking.updated_at);
}
