// Change notifications: remote store changed, local identity created/removed/updated.
//
// The bus delivers an event only while its topic is subscribed. Events published
// while unsubscribed are dropped, never buffered: the feedback guard unsubscribes
// exactly while the engine itself is writing, so those events are self-caused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use containersync_common::types::Identity;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Capacity for the event channel between publishers and the engine loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification topics the engine listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    RemoteStoreChanged,
    IdentityCreated,
    IdentityRemoved,
    IdentityUpdated,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::RemoteStoreChanged,
        Topic::IdentityCreated,
        Topic::IdentityRemoved,
        Topic::IdentityUpdated,
    ];

    fn index(self) -> usize {
        match self {
            Self::RemoteStoreChanged => 0,
            Self::IdentityCreated => 1,
            Self::IdentityRemoved => 2,
            Self::IdentityUpdated => 3,
        }
    }
}

/// A delivered change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Any key in the remote store changed.
    RemoteStoreChanged,
    IdentityCreated(Identity),
    /// Carries the identity as it was before removal.
    IdentityRemoved(Identity),
    IdentityUpdated(Identity),
}

impl ChangeEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::RemoteStoreChanged => Topic::RemoteStoreChanged,
            Self::IdentityCreated(_) => Topic::IdentityCreated,
            Self::IdentityRemoved(_) => Topic::IdentityRemoved,
            Self::IdentityUpdated(_) => Topic::IdentityUpdated,
        }
    }
}

/// Subscription control over the notification source.
///
/// Calls are synchronous so a guard can release its subscription from `Drop`.
pub trait NotificationBus: Send + Sync {
    fn subscribe(&self, topic: Topic);

    fn unsubscribe(&self, topic: Topic);
}

/// In-process bus backed by a bounded channel. Starts with every topic unsubscribed;
/// the first completed backup subscribes it.
pub struct ChannelBus {
    subscribed: [AtomicBool; 4],
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChannelBus {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let bus = Self {
            subscribed: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
            tx,
        };
        (Arc::new(bus), rx)
    }

    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.subscribed[topic.index()].load(Ordering::SeqCst)
    }

    /// Deliver `event` if its topic is subscribed. Returns whether it was delivered.
    pub fn publish(&self, event: ChangeEvent) -> bool {
        let topic = event.topic();
        if !self.is_subscribed(topic) {
            trace!(?topic, "dropping event raised while unsubscribed");
            return false;
        }

        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(?topic, "event channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(?topic, "event channel closed, dropping event");
                false
            }
        }
    }
}

impl NotificationBus for ChannelBus {
    fn subscribe(&self, topic: Topic) {
        self.subscribed[topic.index()].store(true, Ordering::SeqCst);
    }

    fn unsubscribe(&self, topic: Topic) {
        self.subscribed[topic.index()].store(false, Ordering::SeqCst);
    }
}
