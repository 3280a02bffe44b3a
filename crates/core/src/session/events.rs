//! Session state-change publishing
//!
//! One publish/subscribe mechanism for login and logout transitions.
//! Listeners run synchronously, in registration order, on the publishing
//! task. Each registration returns a [`Subscription`]; dropping it (or
//! calling [`Subscription::unsubscribe`]) removes the listener.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use portal_sso_domain::SessionEvent;

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;
type Registry = Mutex<Vec<(u64, Listener)>>;

/// Registry of session state-change listeners
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct SessionEvents {
    listeners: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvents").field("listeners", &self.listener_count()).finish()
    }
}

impl SessionEvents {
    /// Publisher with no listeners
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every subsequent transition
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        debug!(subscription = id, "Session listener registered");
        Subscription { id, registry: Arc::downgrade(&self.listeners) }
    }

    /// Deliver `event` to every listener registered at the time of the call
    ///
    /// Returns the number of listeners notified. Listeners may subscribe or
    /// unsubscribe from within the callback; changes apply to the next event.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let snapshot: Vec<Listener> =
            self.listeners.lock().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for listener in &snapshot {
            listener(event);
        }
        debug!(logged_in = event.is_logged_in, listeners = snapshot.len(), "Session event published");
        snapshot.len()
    }

    /// Listeners currently registered
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// Handle to one registered listener
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Registration id
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener now
    ///
    /// Returns `false` when the registry is already gone.
    pub fn unsubscribe(self) -> bool {
        self.remove()
    }

    fn remove(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut listeners = registry.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        before != listeners.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for session::events.
    use portal_sso_domain::{LogoutReason, LogoutTrigger, UserProfile};

    use super::*;

    fn login_event() -> SessionEvent {
        SessionEvent::logged_in(UserProfile { name: Some("jdoe".into()), ..UserProfile::default() })
    }

    /// Validates delivery order and payload.
    ///
    /// Assertions:
    /// - Listeners run in registration order.
    /// - Each receives the published event.
    #[test]
    fn test_publish_in_registration_order() {
        let events = SessionEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = Arc::clone(&seen);
            events.subscribe(move |e| seen.lock().push(("first", e.is_logged_in)))
        };
        let second = {
            let seen = Arc::clone(&seen);
            events.subscribe(move |e| seen.lock().push(("second", e.is_logged_in)))
        };

        assert_eq!(events.publish(&login_event()), 2);
        events.publish(&SessionEvent::logged_out(Some(LogoutTrigger::new(
            LogoutReason::UserRequested,
            None,
        ))));

        assert_eq!(
            *seen.lock(),
            vec![("first", true), ("second", true), ("first", false), ("second", false)]
        );
        drop((first, second));
    }

    /// Validates unsubscribe and drop semantics.
    ///
    /// Assertions:
    /// - An unsubscribed listener is not called again.
    /// - Dropping the handle unregisters too.
    #[test]
    fn test_unsubscribe_and_drop() {
        let events = SessionEvents::new();
        let calls = Arc::new(AtomicU64::new(0));

        let explicit = {
            let calls = Arc::clone(&calls);
            events.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let dropped = events.subscribe(|_| {});
        assert_eq!(events.listener_count(), 2);

        assert!(explicit.unsubscribe());
        drop(dropped);
        assert_eq!(events.listener_count(), 0);

        assert_eq!(events.publish(&login_event()), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_publish() {
        let events = SessionEvents::new();
        let nested = Arc::new(Mutex::new(Vec::new()));

        let _outer = {
            let events = events.clone();
            let nested = Arc::clone(&nested);
            events.clone().subscribe(move |_| nested.lock().push(events.subscribe(|_| {})))
        };

        assert_eq!(events.publish(&login_event()), 1);
        assert_eq!(events.listener_count(), 2);
    }
}
