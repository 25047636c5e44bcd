//! Bounded polling with cooperative cancellation.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{SpinupError, SpinupResult};

/// Shared flag that interrupts every wait it is passed to.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for `duration` or until cancelled. Returns `true` if
    /// the wait ended because of cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = cvar
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

/// How long a poll loop may keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Attempts(u32),
    Within(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub limit: Limit,
}

impl PollPolicy {
    #[must_use]
    pub const fn attempts(interval: Duration, max: u32) -> Self {
        Self {
            interval,
            limit: Limit::Attempts(max),
        }
    }

    #[must_use]
    pub const fn within(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            limit: Limit::Within(deadline),
        }
    }
}

/// Call `check` until it yields a value, the budget runs out, or
/// `cancel` fires.
///
/// `check` receives the 1-based attempt number. An `Err` from
/// `check` ends the loop immediately. Exhausting the budget gives
/// [`SpinupError::Timeout`]; no sleep follows the final attempt.
pub fn poll_until<T, F>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    what: &str,
    mut check: F,
) -> SpinupResult<T>
where
    F: FnMut(u32) -> SpinupResult<Option<T>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(SpinupError::Cancelled(what.to_string()));
        }

        attempt += 1;
        if let Some(value) = check(attempt)? {
            return Ok(value);
        }

        let pause = match policy.limit {
            Limit::Attempts(max) => {
                if attempt >= max {
                    None
                } else {
                    Some(policy.interval)
                }
            }
            Limit::Within(deadline) => deadline
                .checked_sub(started.elapsed())
                .filter(|left| !left.is_zero())
                .map(|left| left.min(policy.interval)),
        };

        let Some(pause) = pause else {
            return Err(SpinupError::Timeout {
                stage: what.to_string(),
                waited: started.elapsed(),
            });
        };

        if cancel.sleep(pause) {
            return Err(SpinupError::Cancelled(what.to_string()));
        }
    }
}
