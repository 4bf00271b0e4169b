//! Process-wide channel for session changes.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, RwLock,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::SessionView;

const BUS_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    UserUpdated,
    TokenRefreshed,
}

impl AuthEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::UserUpdated => "USER_UPDATED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

/// A session change and who it concerns.
///
/// Events reach subscribers for the same user id or, before any user is known
/// to the client (signed out, fresh browser), for the same device id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<SessionView>,
    pub user_id: Option<Uuid>,
    pub device_id: Option<String>,
}

impl AuthEvent {
    #[must_use]
    pub fn signed_in(session: SessionView, device_id: Option<String>) -> Self {
        Self::with_session(AuthEventKind::SignedIn, session, device_id)
    }

    #[must_use]
    pub fn user_updated(session: SessionView, device_id: Option<String>) -> Self {
        Self::with_session(AuthEventKind::UserUpdated, session, device_id)
    }

    #[must_use]
    pub fn token_refreshed(session: SessionView, device_id: Option<String>) -> Self {
        Self::with_session(AuthEventKind::TokenRefreshed, session, device_id)
    }

    #[must_use]
    pub fn signed_out(user_id: Option<Uuid>, device_id: Option<String>) -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
            user_id,
            device_id,
        }
    }

    fn with_session(kind: AuthEventKind, session: SessionView, device_id: Option<String>) -> Self {
        Self {
            kind,
            user_id: Some(session.user_id),
            session: Some(session),
            device_id,
        }
    }

    /// Whether a listener identified by `user_id` and/or `device_id` should see this event.
    #[must_use]
    pub fn addressed_to(&self, user_id: Option<Uuid>, device_id: Option<&str>) -> bool {
        let same_user = matches!((self.user_id, user_id), (Some(a), Some(b)) if a == b);
        let same_device =
            matches!((self.device_id.as_deref(), device_id), (Some(a), Some(b)) if a == b);
        same_user || same_device
    }
}

/// Singleton bus created at startup and closed once at shutdown.
#[derive(Clone, Debug)]
pub struct AuthEventBus {
    sender: Arc<RwLock<Option<broadcast::Sender<AuthEvent>>>>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deliver an event to current subscribers. Returns how many received it.
    pub fn publish(&self, event: AuthEvent) -> usize {
        let Ok(guard) = self.sender.read() else {
            return 0;
        };
        let Some(sender) = guard.as_ref() else {
            debug!("Auth event dropped, bus is closed: {}", event.kind.as_str());
            return 0;
        };
        debug!("Publishing auth event: {}", event.kind.as_str());
        sender.send(event).unwrap_or(0)
    }

    /// Start listening. `None` once the bus has been shut down.
    #[must_use]
    pub fn subscribe(&self) -> Option<Subscription> {
        let guard = self.sender.read().ok()?;
        let receiver = guard.as_ref()?.subscribe();
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        Some(Subscription {
            receiver,
            subscribers: Arc::clone(&self.subscribers),
        })
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().map_or(true, |guard| guard.is_none())
    }

    /// Close the bus; pending subscriptions drain and then end.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.write() {
            if guard.take().is_some() {
                debug!("Auth event bus closed");
            }
        }
    }
}

/// A live registration on the bus, released on drop.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<AuthEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next event in publish order, `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Auth event subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}
