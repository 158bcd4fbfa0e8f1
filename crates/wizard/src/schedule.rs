//! Cancellable repeating tasks.
//!
//! [`schedule_repeating`] runs an async tick after an initial delay and
//! then again `interval` after each tick completes, until the tick asks to
//! stop or the returned [`ScheduledTask`] is cancelled. Ticks never
//! overlap. Cancellation is cooperative: a tick that is already running
//! finishes, and the loop exits before the next one.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Delay before the first status poll.
pub const DEFAULT_POLL_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Delay between consecutive status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Timing of the status poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_POLL_INITIAL_DELAY,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Handle to a running repeating task. Dropping the handle cancels it.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Stop scheduling further ticks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `true` once the loop has exited, either cancelled or stopped by its tick.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn `tick` after `initial_delay`, then every `interval` after the
/// previous tick returns, until it yields [`ControlFlow::Break`] or the
/// task is cancelled.
pub fn schedule_repeating<F, Fut>(
    initial_delay: Duration,
    interval: Duration,
    mut tick: F,
) -> ScheduledTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(initial_delay) => {}
        }

        loop {
            if token.is_cancelled() {
                return;
            }
            if tick().await.is_break() {
                return;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    ScheduledTask { cancel, handle }
}
