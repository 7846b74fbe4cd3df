//! Interval poller with observable fetch state.
//!
//! A [`PollingFetcher`] fetches once when started and then once per period
//! until stopped. Observers read or subscribe to a [`FetchState`] snapshot
//! carried by a `tokio::sync::watch` channel.
//!
//! Ticks never wait for earlier attempts, so attempts can overlap. Every
//! attempt is numbered when issued; a completion older than the last applied
//! one is dropped instead of overwriting fresher data.
//!
//! Stopping cancels the timer only. An attempt already in flight still
//! completes and still updates the state.

use crate::source::{HttpSource, Source};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Snapshot of the three observable cells
pub struct FetchState<T> {
    /// Last successfully decoded body; cleared by any failure
    pub data: Option<Arc<T>>,
    /// Message of the most recent failure; cleared by the next success
    pub error: Option<String>,
    /// True while an attempt is in flight (unless suppressed)
    pub loading: bool,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
        }
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            loading: self.loading,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FetchState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchState")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("loading", &self.loading)
            .finish()
    }
}

impl<T: PartialEq> PartialEq for FetchState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.error == other.error && self.loading == other.loading
    }
}

/// Polling behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOptions {
    /// Refresh period. `None` means a single fetch on start.
    pub interval: Option<Duration>,
    /// Never raise `loading` before an attempt
    pub suppress_loading: bool,
}

impl PollOptions {
    /// Build from the millisecond form used in config files and flags.
    /// A zero interval is treated as no interval.
    pub fn from_millis(interval_ms: Option<u64>, suppress_loading: bool) -> Self {
        Self {
            interval: interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            suppress_loading,
        }
    }
}

#[derive(Debug, Default)]
struct Schedule {
    stopped: bool,
    issued: u64,
    applied: u64,
}

struct Shared<T> {
    source: Arc<dyn Source<T>>,
    suppress_loading: bool,
    cells: watch::Sender<FetchState<T>>,
    schedule: Mutex<Schedule>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issue one attempt unless the poller has been stopped.
    ///
    /// The schedule lock is held until the attempt is spawned, so once
    /// `stop()` has taken the lock no new attempt can start.
    fn issue(self: &Arc<Self>) -> bool {
        let mut schedule = self.lock_schedule();
        if schedule.stopped {
            return false;
        }
        schedule.issued += 1;
        let seq = schedule.issued;

        if !self.suppress_loading {
            self.cells.send_modify(|state| state.loading = true);
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.attempt(seq).await });
        true
    }

    async fn attempt(&self, seq: u64) {
        debug!(seq, source = %self.source.describe(), "Fetch attempt");
        let outcome = self.source.fetch().await;

        let mut schedule = self.lock_schedule();
        if seq < schedule.applied {
            debug!(seq, applied = schedule.applied, "Discarding stale fetch result");
            return;
        }
        schedule.applied = seq;

        self.cells.send_modify(|state| {
            match outcome {
                Ok(body) => {
                    state.data = Some(Arc::new(body));
                    state.error = None;
                }
                Err(e) => {
                    warn!(seq, source = %self.source.describe(), "Fetch failed: {}", e);
                    state.data = None;
                    state.error = Some(e.to_string());
                }
            }
            state.loading = false;
        });
    }
}

/// Builder for a polling fetch loop
pub struct PollingFetcher<T> {
    source: Arc<dyn Source<T>>,
    options: PollOptions,
}

impl<T: DeserializeOwned + Send + Sync + 'static> PollingFetcher<T> {
    /// Start polling `url` right away.
    ///
    /// Without an interval a single fetch happens. Must be called from inside
    /// a tokio runtime.
    pub fn create(url: &str, interval_ms: Option<u64>, suppress_loading: bool) -> PollHandle<T> {
        Self::new(HttpSource::new(url))
            .with_options(PollOptions::from_millis(interval_ms, suppress_loading))
            .start()
    }
}

impl<T: Send + Sync + 'static> PollingFetcher<T> {
    pub fn new(source: impl Source<T> + 'static) -> Self {
        Self {
            source: Arc::new(source),
            options: PollOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Refresh every `period`; a zero period means a single fetch
    pub fn interval(mut self, period: Duration) -> Self {
        self.options.interval = Some(period).filter(|p| !p.is_zero());
        self
    }

    pub fn suppress_loading(mut self, suppress: bool) -> Self {
        self.options.suppress_loading = suppress;
        self
    }

    /// Activate: fetch once now and start the timer if an interval is set.
    pub fn start(self) -> PollHandle<T> {
        let (cells, receiver) = watch::channel(FetchState::default());
        let shared = Arc::new(Shared {
            source: self.source,
            suppress_loading: self.options.suppress_loading,
            cells,
            schedule: Mutex::new(Schedule::default()),
        });

        info!(
            source = %shared.source.describe(),
            interval_ms = self.options.interval.map(|p| p.as_millis() as u64),
            suppress_loading = self.options.suppress_loading,
            "Poller started"
        );

        shared.issue();
        let timer = self
            .options
            .interval
            .map(|period| spawn_timer(Arc::clone(&shared), period));

        PollHandle {
            shared,
            receiver,
            timer,
        }
    }
}

fn spawn_timer<T: Send + Sync + 'static>(shared: Arc<Shared<T>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !shared.issue() {
                break;
            }
        }
    })
}

/// A running poller.
///
/// Dropping the handle stops the timer, same as calling [`PollHandle::stop`].
pub struct PollHandle<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
    receiver: watch::Receiver<FetchState<T>>,
    timer: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> PollHandle<T> {
    /// Current snapshot of all three cells
    pub fn state(&self) -> FetchState<T> {
        self.receiver.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.receiver.borrow().data.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.receiver.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().loading
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.receiver.clone()
    }

    /// Number of attempts issued so far
    pub fn attempts(&self) -> u64 {
        self.shared.lock_schedule().issued
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock_schedule().stopped
    }

    /// Deactivate: no attempt is issued after this returns.
    ///
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        {
            let mut schedule = self.shared.lock_schedule();
            if schedule.stopped {
                return;
            }
            schedule.stopped = true;
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        info!(source = %self.shared.source.describe(), "Poller stopped");
    }
}

impl<T: Send + Sync + 'static> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
