//! Session providers: who is signed in, and when that changes.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;
use tracker_core::model::{AuthEvent, AuthEventKind, Session};

mod rest;

pub use rest::{RestAuthClient, SESSION_KEY};

const EVENT_CAPACITY: usize = 32;

/// Source of the current identity and its transitions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The session that is active right now, if any.
    async fn current_session(&self) -> Option<Session>;

    /// Stream of transitions, starting from the moment of subscription.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Current session plus an event fan-out, shared by every provider.
#[derive(Clone)]
pub struct SessionHub {
    current: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionHub {
    #[must_use]
    pub fn new(initial: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: Arc::new(RwLock::new(initial)),
            events,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Replace the current session and announce the transition.
    pub fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session.clone();
        if self.events.send(AuthEvent { kind, session }).is_err() {
            debug!(?kind, "auth event had no subscribers");
        }
    }
}

/// In-process provider: sign-in and sign-out are plain method calls.
///
/// Used when no hosted backend is configured, and as a test double.
#[derive(Clone, Default)]
pub struct LocalSessionProvider {
    hub: SessionHub,
}

impl LocalSessionProvider {
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self {
            hub: SessionHub::new(Some(session)),
        }
    }

    pub fn sign_in(&self, session: Session) {
        self.hub.emit(AuthEventKind::SignedIn, Some(session));
    }

    pub fn sign_out(&self) {
        self.hub.emit(AuthEventKind::SignedOut, None);
    }

    /// Emit a transition that keeps the current session, e.g. a token refresh.
    pub fn notify(&self, kind: AuthEventKind) {
        self.hub.emit(kind, self.hub.current());
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.hub.subscribe()
    }
}
