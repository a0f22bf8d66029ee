//! Debounced text aggregation for speech requests
//!
//! Chat widgets deliver a single answer as a burst of small messages. The
//! [`TextAggregator`] buffers them and, once no new fragment has arrived for
//! the quiet period, hands the space-joined text to a [`SpeechSink`] in one
//! call. Every fragment restarts the quiet period (debounce), so a steady
//! stream keeps deferring the flush until it stops.

use crate::widget::MessageListener;
use crate::{BridgeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tracing::{debug, error};

use super::timer::FlushTimer;

/// Default quiet period in milliseconds
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 200;

/// Separator placed between fragments of one batch
pub const FRAGMENT_SEPARATOR: &str = " ";

/// Consumer of flushed text
///
/// Implementations usually perform network I/O. The aggregator never awaits
/// one call before starting the next, so calls may overlap.
#[async_trait]
pub trait SpeechSink: Send + Sync + 'static {
    async fn speak(&self, text: String) -> Result<()>;
}

/// Configuration for the text aggregator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Quiet period with no new fragments before a flush fires
    pub quiet_period_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
        }
    }
}

impl AggregatorConfig {
    /// Set the quiet period
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period_ms = u64::try_from(quiet_period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Get the quiet period as a duration
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Observable aggregator state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregatorState {
    /// No pending fragments, no timer
    Idle,
    /// Timer armed, batch non-empty
    Accumulating,
    /// Disposed; submits are ignored
    Disposed,
}

/// Pending batch and its timer, always mutated together
#[derive(Debug, Default)]
struct Batch {
    fragments: Vec<String>,
    timer: FlushTimer,
    disposed: bool,
}

struct Inner {
    config: AggregatorConfig,
    sink: Arc<dyn SpeechSink>,
    runtime: Handle,
    batch: Mutex<Batch>,
    error_tx: Option<UnboundedSender<BridgeError>>,
    /// Sink calls started and not yet returned
    in_flight: AtomicUsize,
    settled: Notify,
}

/// Debouncing fragment buffer
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone)]
pub struct TextAggregator {
    inner: Arc<Inner>,
}

impl TextAggregator {
    /// Create an aggregator flushing into `sink`
    ///
    /// Must be called from within a tokio runtime; flush timers are spawned
    /// on that runtime.
    pub fn new(config: AggregatorConfig, sink: Arc<dyn SpeechSink>) -> Result<Self> {
        Self::build(config, sink, None)
    }

    /// Create an aggregator that also reports sink failures on `error_tx`
    pub fn with_error_channel(
        config: AggregatorConfig,
        sink: Arc<dyn SpeechSink>,
        error_tx: UnboundedSender<BridgeError>,
    ) -> Result<Self> {
        Self::build(config, sink, Some(error_tx))
    }

    fn build(
        config: AggregatorConfig,
        sink: Arc<dyn SpeechSink>,
        error_tx: Option<UnboundedSender<BridgeError>>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            BridgeError::ConfigError(format!("Text aggregator needs a tokio runtime: {}", e))
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sink,
                runtime,
                batch: Mutex::new(Batch::default()),
                error_tx,
                in_flight: AtomicUsize::new(0),
                settled: Notify::new(),
            }),
        })
    }

    /// Append a fragment and restart the quiet period
    pub fn submit(&self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        let mut batch = self.inner.batch.lock();

        if batch.disposed {
            debug!("Dropping fragment submitted after dispose");
            return;
        }

        batch.fragments.push(fragment);

        let inner = Arc::clone(&self.inner);
        let epoch = batch.timer.arm(
            &self.inner.runtime,
            self.inner.config.quiet_period(),
            move |epoch| flush(inner, epoch),
        );

        debug!(
            "Buffered fragment {} (timer epoch {})",
            batch.fragments.len(),
            epoch
        );
    }

    /// Cancel any armed timer and discard the pending batch
    ///
    /// No flush happens afterwards and later submits are ignored. Sink calls
    /// already in flight are left to finish.
    pub fn dispose(&self) {
        let mut batch = self.inner.batch.lock();
        let cancelled = batch.timer.cancel();
        let dropped = batch.fragments.len();
        batch.fragments.clear();
        batch.disposed = true;

        debug!(
            "Aggregator disposed (timer cancelled: {}, fragments dropped: {})",
            cancelled, dropped
        );
    }

    /// Wait until no flush is armed and no sink call is in flight
    ///
    /// Returns false if `timeout` elapsed first.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.settled.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.is_settled() {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn is_settled(&self) -> bool {
        let batch = self.inner.batch.lock();
        !batch.timer.is_armed() && self.inner.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Current state
    pub fn state(&self) -> AggregatorState {
        let batch = self.inner.batch.lock();
        if batch.disposed {
            AggregatorState::Disposed
        } else if batch.timer.is_armed() {
            AggregatorState::Accumulating
        } else {
            AggregatorState::Idle
        }
    }

    /// Number of fragments waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.inner.batch.lock().fragments.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &AggregatorConfig {
        &self.inner.config
    }
}

impl MessageListener for TextAggregator {
    fn on_message(&self, text: &str) {
        self.submit(text);
    }
}

/// Join fragments into the text of one speech request
pub fn join_fragments(fragments: &[String]) -> String {
    fragments.join(FRAGMENT_SEPARATOR)
}

/// Timer expiry: take the batch, then call the sink outside the lock
async fn flush(inner: Arc<Inner>, epoch: u64) {
    let fragments = {
        let mut batch = inner.batch.lock();
        if !batch.timer.consume(epoch) {
            debug!("Stale flush for epoch {} skipped", epoch);
            return;
        }
        let fragments = std::mem::take(&mut batch.fragments);
        if !fragments.is_empty() {
            inner.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        fragments
    };

    if fragments.is_empty() {
        inner.settled.notify_waiters();
        return;
    }

    let text = join_fragments(&fragments);
    debug!("Flushing {} fragments ({} chars)", fragments.len(), text.len());

    if let Err(e) = inner.sink.speak(text).await {
        error!("Speech request failed: {}", e);
        if let Some(tx) = &inner.error_tx {
            let _ = tx.send(e);
        }
    }

    inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    inner.settled.notify_waiters();
}
