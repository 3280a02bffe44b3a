//! Inactivity timer
//!
//! Logs the user out after a period without activity. A login arms the
//! inactivity timer; when it fires the warning callback is shown and a
//! confirmation timer starts. If nobody resets the timer before the
//! confirmation elapses, the warning is closed and the session is logged out
//! with reason `inactivity`. Any logout deactivates both timers.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use portal_sso_domain::{IdleConfig, LogoutReason};

use crate::login::PortalAuthenticator;
use crate::session::Subscription;

/// A displayed logout warning
pub trait LogoutWarning: Send + Sync {
    /// Dismiss the warning
    fn close(&self);
}

type WarningCallback = dyn Fn(InactivityHandle) -> Box<dyn LogoutWarning> + Send + Sync;

#[derive(Default)]
struct Timers {
    inactivity: Option<JoinHandle<()>>,
    confirmation: Option<JoinHandle<()>>,
    warning: Option<Box<dyn LogoutWarning>>,
}

impl Timers {
    fn abort_all(&mut self) -> bool {
        let mut active = false;
        for handle in [self.inactivity.take(), self.confirmation.take()].into_iter().flatten() {
            handle.abort();
            active = true;
        }
        active
    }
}

struct IdleInner {
    config: IdleConfig,
    authenticator: Weak<dyn PortalAuthenticator>,
    on_warning: Box<WarningCallback>,
    runtime: Handle,
    timers: Mutex<Timers>,
}

/// Cloneable reset handle passed to the warning callback
#[derive(Clone)]
pub struct InactivityHandle {
    inner: Weak<IdleInner>,
}

impl InactivityHandle {
    /// Restart the inactivity period (e.g. on user activity)
    pub fn reset(&self) {
        if let Some(inner) = self.inner.upgrade() {
            IdleInner::reset(&inner);
        }
    }
}

impl fmt::Debug for InactivityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InactivityHandle").finish_non_exhaustive()
    }
}

/// Session-driven inactivity logout
///
/// Dropping the timer unregisters it from the session and stops both timers.
pub struct InactivityTimer {
    inner: Arc<IdleInner>,
    _subscription: Subscription,
}

impl fmt::Debug for InactivityTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InactivityTimer")
            .field("config", &self.inner.config)
            .field("active", &self.is_active())
            .finish()
    }
}

impl InactivityTimer {
    /// Watch `authenticator`'s session
    ///
    /// `on_warning` is called when the inactivity period elapses; it receives
    /// a reset handle and returns the warning to close if the user does not
    /// react. Must be called from within a tokio runtime.
    pub fn start<F>(
        config: IdleConfig,
        authenticator: &Arc<dyn PortalAuthenticator>,
        on_warning: F,
    ) -> Self
    where
        F: Fn(InactivityHandle) -> Box<dyn LogoutWarning> + Send + Sync + 'static,
    {
        let inner = Arc::new(IdleInner {
            config,
            authenticator: Arc::downgrade(authenticator),
            on_warning: Box::new(on_warning),
            runtime: Handle::current(),
            timers: Mutex::new(Timers::default()),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = authenticator.session().on_login_state_change(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if event.is_logged_in {
                IdleInner::reset(&inner);
            } else {
                inner.deactivate();
            }
        });

        debug!(
            inactivity_mins = config.inactivity_interval_mins,
            confirmation_mins = config.logout_confirmation_interval_mins,
            "Inactivity timer registered"
        );
        Self { inner, _subscription: subscription }
    }

    /// Restart the inactivity period
    pub fn reset(&self) {
        IdleInner::reset(&self.inner);
    }

    /// Reset handle that can outlive the borrow of the timer
    #[must_use]
    pub fn handle(&self) -> InactivityHandle {
        InactivityHandle { inner: Arc::downgrade(&self.inner) }
    }

    /// Whether either timer is armed
    #[must_use]
    pub fn is_active(&self) -> bool {
        let timers = self.inner.timers.lock();
        timers.inactivity.is_some() || timers.confirmation.is_some()
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.inner.deactivate();
    }
}

impl IdleInner {
    fn reset(this: &Arc<Self>) {
        if !this.config.enabled {
            return;
        }
        let weak = Arc::downgrade(this);
        let delay = this.config.inactivity_interval();

        let mut timers = this.timers.lock();
        timers.abort_all();
        timers.warning = None;
        timers.inactivity = Some(this.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                Self::warn_inactive(&inner);
            }
        }));
        debug!(delay_secs = delay.as_secs(), "Inactivity timer armed");
    }

    fn warn_inactive(this: &Arc<Self>) {
        let weak = Arc::downgrade(this);
        let delay = this.config.logout_confirmation_interval();
        {
            let mut timers = this.timers.lock();
            timers.inactivity = None;
            timers.confirmation = Some(this.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = weak.upgrade() {
                    inner.confirm_logout().await;
                }
            }));
        }

        info!("User inactive; showing logout warning");
        let warning = (this.on_warning)(InactivityHandle { inner: Arc::downgrade(this) });

        let mut timers = this.timers.lock();
        if timers.confirmation.is_some() {
            timers.warning = Some(warning);
        } else {
            // Reset from inside the callback.
            warning.close();
        }
    }

    async fn confirm_logout(&self) {
        let warning = {
            let mut timers = self.timers.lock();
            timers.confirmation = None;
            timers.warning.take()
        };
        if let Some(warning) = warning {
            warning.close();
        }

        let Some(authenticator) = self.authenticator.upgrade() else { return };
        info!("Logging out inactive user");
        if let Err(err) = authenticator.logout_with(LogoutReason::Inactivity).await {
            warn!(code = err.code(), error = %err, "Inactivity logout failed");
        }
    }

    fn deactivate(&self) {
        let mut timers = self.timers.lock();
        if timers.abort_all() {
            debug!("Inactivity timers deactivated");
        }
        timers.warning = None;
    }
}
