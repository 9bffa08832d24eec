//! One-shot cancelable timers.
//!
//! The engine schedules connection-establishment deadlines and receive
//! watchdog expiries through a [`TimerQueue`]. Callbacks run on a timer
//! thread, never on the thread that scheduled them.

mod tokio_timer;
pub use tokio_timer::*;


use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Cancels the timer it was returned for.
///
/// Dropping the handle does not cancel; an expiry that already started
/// running is not interrupted.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg_attr(test, automock)]
pub trait TimerQueue: Send + Sync + 'static {
    /// Run `callback` once after `delay` unless the returned handle is
    /// cancelled first.
    fn schedule(
        &self,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerHandle;
}
