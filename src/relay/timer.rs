//! Cancellable fire-once timer backing the aggregator's quiet period

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A scheduled task that is currently armed
#[derive(Debug)]
struct ArmedTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

/// Single-slot scheduled callback
///
/// Arming replaces whatever was armed before. Every arm gets a new epoch,
/// and the fired task must win [`FlushTimer::consume`] with that epoch before
/// doing any work, so a task that woke up just as it was being replaced
/// cannot fire on behalf of its successor.
#[derive(Debug, Default)]
pub struct FlushTimer {
    armed: Option<ArmedTimer>,
    epoch: u64,
}

impl FlushTimer {
    /// Create a disarmed timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any armed task and schedule `fire` to run after `delay`
    ///
    /// `fire` receives the epoch of this arm. Returns that epoch.
    pub fn arm<F, Fut>(&mut self, runtime: &Handle, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.epoch += 1;
        let epoch = self.epoch;

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fire(epoch).await;
        });

        self.armed = Some(ArmedTimer { epoch, handle });
        epoch
    }

    /// Abort the armed task, if any. Returns whether something was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Claim the slot from inside the fired task
    ///
    /// Succeeds only if `epoch` is still the armed one. The task is detached
    /// rather than aborted since it is the caller.
    pub fn consume(&mut self, epoch: u64) -> bool {
        match &self.armed {
            Some(timer) if timer.epoch == epoch => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a task is currently scheduled
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Epoch of the most recent arm (0 if never armed)
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
