use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::TimerCallback;
use super::TimerHandle;
use super::TimerQueue;

/// [`TimerQueue`] backed by a tokio runtime.
///
/// Each timer is one task racing a sleep against its cancellation token.
/// Expired callbacks move to the blocking pool because they take the
/// context's locks and run user code.
#[derive(Debug, Clone)]
pub struct TokioTimerQueue {
    runtime: Handle,
}

impl TokioTimerQueue {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Queue bound to the runtime of the calling task, if there is one.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TimerQueue for TokioTimerQueue {
    fn schedule(
        &self,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerHandle {
        let token = CancellationToken::new();
        let child = token.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    trace!(?delay, "timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    let fired = tokio::task::spawn_blocking(move || {
                        if !child.is_cancelled() {
                            callback();
                        }
                    });
                    if let Err(e) = fired.await {
                        trace!(?e, "timer callback did not complete");
                    }
                }
            }
        });

        TimerHandle::new(token)
    }
}
