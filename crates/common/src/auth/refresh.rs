//! Refresh schedule
//!
//! At most one refresh timer is armed at a time. Arming replaces (aborts) the
//! previous timer; cancelling aborts it. A timer that fires first detaches
//! itself from the schedule, so the refresh it runs can arm the next timer
//! without aborting its own task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::TokenClaims;

/// Delay until the refresh for a token with `claims` should run
///
/// `(exp - iat)` seconds minus `offset`, saturating at zero. `None` when the
/// token lacks either claim.
#[must_use]
pub fn refresh_delay(claims: &TokenClaims, offset: Duration) -> Option<Duration> {
    let window_secs = claims.expiry_window_secs()?;
    let window = Duration::from_secs(u64::try_from(window_secs).unwrap_or(0));
    Some(window.saturating_sub(offset))
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Single-slot background refresh timer
#[derive(Default)]
pub struct RefreshSchedule {
    slot: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
}

impl RefreshSchedule {
    /// Empty schedule
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `on_fire` after `delay`, replacing any armed timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(self: &Arc<Self>, delay: Duration, on_fire: BoxFuture<'static, ()>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let schedule: Weak<Self> = Arc::downgrade(self);

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
            debug!(generation = previous.generation, "Replaced armed refresh timer");
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(schedule) = schedule.upgrade() else { return };
            if !schedule.detach(generation) {
                return;
            }
            drop(schedule);
            on_fire.await;
        });

        *slot = Some(ArmedTimer { generation, handle });
        debug!(generation, delay_ms = delay.as_millis(), "Armed refresh timer");
    }

    /// Abort the armed timer, if any
    ///
    /// Returns `true` when a timer was armed.
    pub fn cancel(&self) -> bool {
        match self.slot.lock().take() {
            Some(timer) => {
                timer.handle.abort();
                debug!(generation = timer.generation, "Cancelled refresh timer");
                true
            }
            None => false,
        }
    }

    /// Whether a timer is waiting to fire
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of timers armed over the schedule's lifetime
    #[must_use]
    pub fn armed_count(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn detach(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(timer) if timer.generation == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for RefreshSchedule {
    fn drop(&mut self) {
        if let Some(timer) = self.slot.get_mut().take() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::refresh.
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn claims(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims { iat: Some(iat), exp: Some(exp), ..TokenClaims::default() }
    }

    fn counter_future(counter: &Arc<AtomicUsize>) -> BoxFuture<'static, ()> {
        let counter = Arc::clone(counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Validates `refresh_delay` arithmetic.
    ///
    /// Assertions:
    /// - `iat=1000, exp=1100`, offset 100s yields zero.
    /// - A one-hour token yields 3500s.
    /// - Missing claims yield `None`; negative windows saturate to zero.
    #[test]
    fn test_refresh_delay() {
        let offset = Duration::from_secs(100);

        assert_eq!(refresh_delay(&claims(1000, 1100), offset), Some(Duration::ZERO));
        assert_eq!(refresh_delay(&claims(0, 3600), offset), Some(Duration::from_secs(3500)));
        assert_eq!(refresh_delay(&claims(1100, 1000), offset), Some(Duration::ZERO));
        assert_eq!(refresh_delay(&TokenClaims::default(), offset), None);
    }

    /// Validates `refresh_delay` with claims at the edges of `i64`.
    ///
    /// Assertions:
    /// - A window that overflows `exp - iat` schedules no refresh.
    /// - A huge but representable window is returned as-is.
    #[test]
    fn test_refresh_delay_extreme_claims() {
        let offset = Duration::from_secs(100);

        assert_eq!(refresh_delay(&claims(i64::MIN, i64::MAX), offset), None);
        assert_eq!(refresh_delay(&claims(i64::MAX, i64::MIN), offset), None);
        assert_eq!(
            refresh_delay(&claims(0, i64::MAX), offset),
            Some(Duration::from_secs(i64::MAX.unsigned_abs() - 100))
        );
    }

    /// Validates that re-arming replaces the previous timer.
    ///
    /// Assertions:
    /// - Only the second timer fires.
    /// - The schedule is disarmed after firing.
    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let schedule = RefreshSchedule::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        schedule.arm(Duration::from_secs(60), counter_future(&first));
        schedule.arm(Duration::from_secs(120), counter_future(&second));
        assert!(schedule.is_armed());

        tokio::time::sleep(Duration::from_secs(121)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(!schedule.is_armed());
        assert_eq!(schedule.armed_count(), 2);
    }

    /// Validates cancellation.
    ///
    /// Assertions:
    /// - `cancel` reports an armed timer once.
    /// - The cancelled timer never fires.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let schedule = RefreshSchedule::new();
        let fired = Arc::new(AtomicUsize::new(0));

        schedule.arm(Duration::from_secs(5), counter_future(&fired));
        assert!(schedule.cancel());
        assert!(!schedule.cancel());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    /// Validates that a firing timer can arm its successor.
    ///
    /// Assertions:
    /// - The re-armed timer survives the task that armed it.
    #[tokio::test(start_paused = true)]
    async fn test_firing_timer_can_rearm() {
        let schedule = RefreshSchedule::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let rearm = {
            let schedule = Arc::clone(&schedule);
            let fired = Arc::clone(&fired);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
                schedule.arm(Duration::from_secs(30), counter_future(&fired));
            })
        };
        schedule.arm(Duration::from_secs(10), rearm);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(schedule.is_armed());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
