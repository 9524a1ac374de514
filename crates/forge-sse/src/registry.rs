use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use uuid::Uuid;

/// Opaque handle naming one streaming session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Cooperative cancellation flag for one session.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            if self.is_requested() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// Active sessions and their stop signals.
///
/// Every access takes the lock for a single map operation and never holds it
/// across an await.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<StopSignal>>>,
}

impl SessionRegistry {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<StopSignal>>> {
        // Each operation leaves the map consistent, so a poisoned lock is safe to reuse.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self) -> (SessionId, Arc<StopSignal>) {
        let signal = Arc::new(StopSignal::default());
        let mut sessions = self.sessions();
        let mut id = SessionId::new();
        while sessions.contains_key(&id) {
            id = SessionId::new();
        }
        sessions.insert(id, Arc::clone(&signal));
        (id, signal)
    }

    /// Returns `false` when the session is unknown or already finished.
    pub(crate) fn request_stop(&self, id: &SessionId) -> bool {
        let signal = self.sessions().get(id).cloned();
        match signal {
            Some(signal) => {
                signal.request_stop();
                true
            }
            None => false,
        }
    }

    pub(crate) fn deregister(&self, id: &SessionId) -> bool {
        self.sessions().remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions().len()
    }

    pub(crate) fn contains(&self, id: &SessionId) -> bool {
        self.sessions().contains_key(id)
    }
}
