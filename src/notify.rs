use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookingCreated,
    StatusChanged,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::BookingCreated => "booking_created",
            NotificationKind::StatusChanged => "status_changed",
        }
    }
}

/// A delivered notification as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient_id: Ulid,
    pub kind: NotificationKind,
    pub message: String,
    pub booking_id: Ulid,
}

/// External notification collaborator. Strictly best-effort: the engine logs
/// failures and never propagates them to its caller.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_notification(
        &self,
        recipient_id: Ulid,
        kind: NotificationKind,
        message: &str,
        booking_id: Ulid,
    ) -> Result<(), NotifyError>;
}

/// Reference gateway: per-recipient broadcast channels. Delivery mechanics
/// (push tokens, email) live behind a real gateway outside this crate.
pub struct BroadcastNotifier {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a recipient's notifications. Creates the channel if needed.
    pub fn subscribe(&self, recipient_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(recipient_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }
}

#[async_trait]
impl NotificationGateway for BroadcastNotifier {
    async fn send_notification(
        &self,
        recipient_id: Ulid,
        kind: NotificationKind,
        message: &str,
        booking_id: Ulid,
    ) -> Result<(), NotifyError> {
        // No-op if nobody is listening.
        if let Some(sender) = self.channels.get(&recipient_id) {
            let _ = sender.send(Notification {
                recipient_id,
                kind,
                message: message.to_string(),
                booking_id,
            });
        }
        Ok(())
    }
}
