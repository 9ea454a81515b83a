use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Span};

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    /// Incoming version is not `existing.version + 1` — a concurrent writer
    /// got there first.
    VersionConflict(Ulid),
    /// Transient failure; the engine retries these with backoff.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "booking not found: {id}"),
            StoreError::VersionConflict(id) => write!(f, "stale write for booking: {id}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence boundary. Durable implementations live outside this crate;
/// `InMemoryStore` is the reference implementation and the single source of
/// truth in tests.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking or replace an existing one. Updates must carry
    /// `existing.version + 1` or the save is rejected with `VersionConflict`.
    async fn save(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn find_by_id(&self, id: Ulid) -> Result<Booking, StoreError>;

    /// All of the walker's bookings in one of `statuses` whose span overlaps
    /// `span`, optionally excluding one booking id (used when re-validating
    /// a booking against everything but itself).
    async fn find_overlapping(
        &self,
        walker_id: Ulid,
        span: Span,
        statuses: &[BookingStatus],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn find_by_walker(&self, walker_id: Ulid) -> Result<Vec<Booking>, StoreError>;

    async fn find_by_owner(&self, owner_id: Ulid) -> Result<Vec<Booking>, StoreError>;
}

/// In-memory store over concurrent maps. Bookings are never deleted —
/// terminal states are retained for history.
pub struct InMemoryStore {
    bookings: DashMap<Ulid, Booking>,
    by_walker: DashMap<Ulid, Vec<Ulid>>,
    by_owner: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            by_walker: DashMap::new(),
            by_owner: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn collect(&self, ids: &[Ulid]) -> Vec<Booking> {
        ids.iter()
            .filter_map(|id| self.bookings.get(id).map(|e| e.value().clone()))
            .collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn save(&self, booking: Booking) -> Result<Booking, StoreError> {
        match self.bookings.entry(booking.id) {
            Entry::Occupied(mut e) => {
                if booking.version != e.get().version + 1 {
                    return Err(StoreError::VersionConflict(booking.id));
                }
                e.insert(booking.clone());
            }
            Entry::Vacant(e) => {
                e.insert(booking.clone());
                self.by_walker
                    .entry(booking.walker_id)
                    .or_default()
                    .push(booking.id);
                self.by_owner
                    .entry(booking.owner_id)
                    .or_default()
                    .push(booking.id);
            }
        }
        Ok(booking)
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Booking, StoreError> {
        self.bookings
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_overlapping(
        &self,
        walker_id: Ulid,
        span: Span,
        statuses: &[BookingStatus],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .by_walker
            .get(&walker_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(self
            .collect(&ids)
            .into_iter()
            .filter(|b| {
                exclude != Some(b.id)
                    && statuses.contains(&b.status)
                    && b.span.overlaps(&span)
            })
            .collect())
    }

    async fn find_by_walker(&self, walker_id: Ulid) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .by_walker
            .get(&walker_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(self.collect(&ids))
    }

    async fn find_by_owner(&self, owner_id: Ulid) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .by_owner
            .get(&owner_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(self.collect(&ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::COMMITTED_STATUSES;

    fn booking(walker_id: Ulid, start: i64, end: i64, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            dog_id: Ulid::new(),
            walker_id,
            span: Span::new(start, end),
            status,
            price: None,
            created_at: 0,
            updated_at: 0,
            version: 1,
        }
    }

    #[test]
    fn save_and_find() {
        tokio_test::block_on(async {
            let store = InMemoryStore::new();
            let b = booking(Ulid::new(), 100, 200, BookingStatus::Requested);
            store.save(b.clone()).await.unwrap();
            let found = store.find_by_id(b.id).await.unwrap();
            assert_eq!(found, b);
        });
    }

    #[tokio::test]
    async fn find_missing_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.find_by_id(Ulid::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_requires_next_version() {
        let store = InMemoryStore::new();
        let mut b = booking(Ulid::new(), 100, 200, BookingStatus::Requested);
        store.save(b.clone()).await.unwrap();

        // Stale write: same version again.
        let result = store.save(b.clone()).await;
        assert!(matches!(result, Err(StoreError::VersionConflict(_))));

        b.version = 2;
        b.status = BookingStatus::Confirmed;
        store.save(b.clone()).await.unwrap();
        assert_eq!(store.find_by_id(b.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn skipping_a_version_is_rejected() {
        let store = InMemoryStore::new();
        let mut b = booking(Ulid::new(), 100, 200, BookingStatus::Requested);
        store.save(b.clone()).await.unwrap();
        b.version = 3;
        assert!(matches!(
            store.save(b).await,
            Err(StoreError::VersionConflict(_))
        ));
    }

    #[tokio::test]
    async fn find_overlapping_filters_status_and_span() {
        let store = InMemoryStore::new();
        let walker = Ulid::new();
        let committed = booking(walker, 100, 200, BookingStatus::Confirmed);
        let tentative = booking(walker, 150, 250, BookingStatus::Requested);
        let elsewhere = booking(walker, 500, 600, BookingStatus::Confirmed);
        for b in [&committed, &tentative, &elsewhere] {
            store.save(b.clone()).await.unwrap();
        }

        let hits = store
            .find_overlapping(walker, Span::new(150, 300), COMMITTED_STATUSES, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, committed.id);
    }

    #[tokio::test]
    async fn find_overlapping_respects_exclude() {
        let store = InMemoryStore::new();
        let walker = Ulid::new();
        let b = booking(walker, 100, 200, BookingStatus::Confirmed);
        store.save(b.clone()).await.unwrap();

        let hits = store
            .find_overlapping(walker, Span::new(100, 200), COMMITTED_STATUSES, Some(b.id))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn touching_spans_do_not_overlap() {
        let store = InMemoryStore::new();
        let walker = Ulid::new();
        store
            .save(booking(walker, 100, 200, BookingStatus::Confirmed))
            .await
            .unwrap();

        let hits = store
            .find_overlapping(walker, Span::new(200, 300), COMMITTED_STATUSES, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn walker_and_owner_indexes() {
        let store = InMemoryStore::new();
        let walker = Ulid::new();
        let b1 = booking(walker, 100, 200, BookingStatus::Requested);
        let b2 = booking(walker, 300, 400, BookingStatus::Confirmed);
        let other = booking(Ulid::new(), 100, 200, BookingStatus::Requested);
        for b in [&b1, &b2, &other] {
            store.save(b.clone()).await.unwrap();
        }

        let by_walker = store.find_by_walker(walker).await.unwrap();
        assert_eq!(by_walker.len(), 2);

        let by_owner = store.find_by_owner(b1.owner_id).await.unwrap();
        assert_eq!(by_owner.len(), 1);
        assert_eq!(by_owner[0].id, b1.id);
    }
}
