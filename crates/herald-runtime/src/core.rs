//! The event loop: concurrent dispatch with per-chat ordering.
//!
//! Every submitted event runs in its own task. Events sharing an ordering
//! key (the chat id, else the sender id) form a lane; a task waits for the
//! previous task of its lane before dispatching, so each chat sees its
//! events handled in arrival order while different chats proceed in
//! parallel.

use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::error::{RuntimeError, RuntimeResult};
use herald_core::{BoxedTransport, Event};
use herald_framework::{BoxedRepository, Dispatcher};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Default time in-flight events get to finish on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tail of one ordering lane.
struct Lane {
    generation: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Lanes {
    next_generation: u64,
    tails: HashMap<i64, Lane>,
}

/// Drives a [`Dispatcher`] from a stream of events.
///
/// ```rust,ignore
/// let core = DispatchCore::new(dispatcher, transport)
///     .with_repository(repository)
///     .with_shutdown_grace(Duration::from_secs(10));
///
/// core.run(events).await?;
/// ```
pub struct DispatchCore {
    dispatcher: Dispatcher,
    transport: BoxedTransport,
    repository: Option<BoxedRepository>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    lanes: Arc<Mutex<Lanes>>,
    state: AtomicU8,
    grace: Duration,
}

impl DispatchCore {
    pub fn new(dispatcher: Dispatcher, transport: BoxedTransport) -> Self {
        Self {
            dispatcher,
            transport,
            repository: None,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            lanes: Arc::new(Mutex::new(Lanes::default())),
            state: AtomicU8::new(IDLE),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Sets the repository closed at the end of [`shutdown`](Self::shutdown).
    pub fn with_repository(mut self, repository: BoxedRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Starts accepting events.
    pub fn start(&self) -> RuntimeResult<()> {
        match self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!(grace = ?self.grace, "Dispatch core started");
                Ok(())
            }
            Err(RUNNING) => {
                warn!("Dispatch core is already running");
                Ok(())
            }
            Err(_) => Err(RuntimeError::ShuttingDown),
        }
    }

    /// Schedules `event` for dispatch and returns immediately.
    pub fn submit(&self, event: Event) -> RuntimeResult<()> {
        match self.state.load(Ordering::Acquire) {
            RUNNING => {}
            IDLE => return Err(RuntimeError::NotStarted),
            _ => return Err(RuntimeError::ShuttingDown),
        }

        let key = ordering_key(&event);
        let (done_tx, done_rx) = oneshot::channel();
        let (generation, previous) = match key {
            Some(key) => {
                let mut lanes = self.lanes.lock();
                let generation = lanes.next_generation;
                lanes.next_generation += 1;
                let previous = lanes.tails.insert(
                    key,
                    Lane {
                        generation,
                        done: done_rx,
                    },
                );
                (generation, previous.map(|lane| lane.done))
            }
            None => (0, None),
        };

        let dispatcher = self.dispatcher.clone();
        let transport = Arc::clone(&self.transport);
        let lanes = Arc::clone(&self.lanes);
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let work = async {
                if let Some(previous) = previous {
                    // An error only means the previous task is gone
                    let _ = previous.await;
                }
                dispatcher.feed(event, transport).await;
            };

            tokio::select! {
                _ = cancel.cancelled() => debug!(lane = ?key, "Dispatch cancelled"),
                _ = work => {}
            }

            let _ = done_tx.send(());
            if let Some(key) = key {
                let mut lanes = lanes.lock();
                if lanes.tails.get(&key).map(|lane| lane.generation) == Some(generation) {
                    lanes.tails.remove(&key);
                }
            }
        });

        trace!(lane = ?key, pending = self.tracker.len(), "Event submitted");
        Ok(())
    }

    /// Stops accepting events and drains in-flight work.
    ///
    /// Tasks still running after the grace period are cancelled. The
    /// repository, if any, is closed last.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        if self.state.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return Ok(());
        }

        info!(pending = self.tracker.len(), "Shutting down dispatch core");
        self.tracker.close();

        if tokio::time::timeout(self.grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.tracker.len(),
                grace = ?self.grace,
                "Grace period elapsed, cancelling remaining events"
            );
            self.cancel.cancel();
            self.tracker.wait().await;
        }

        if let Some(repository) = &self.repository {
            if let Err(e) = repository.close().await {
                error!(error = %e, "Failed to close repository");
                return Err(e.into());
            }
        }

        info!("Dispatch core stopped");
        Ok(())
    }

    /// Dispatches events from `source` until it ends or `shutdown` resolves.
    pub async fn run_until<S, F>(&self, source: S, shutdown: F) -> RuntimeResult<()>
    where
        S: Stream<Item = Event>,
        F: Future<Output = ()>,
    {
        self.start()?;

        let mut source = pin!(source);
        let mut shutdown = pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = source.next() => match next {
                    Some(event) => self.submit(event)?,
                    None => {
                        info!("Event source ended");
                        break;
                    }
                },
            }
        }

        self.shutdown().await
    }

    /// Dispatches events from `source` until it ends, Ctrl+C or SIGTERM.
    pub async fn run<S>(&self, source: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Event>,
    {
        info!("Herald is running. Press Ctrl+C to stop.");
        self.run_until(source, wait_for_signal()).await
    }

    #[cfg(test)]
    fn lane_count(&self) -> usize {
        self.lanes.lock().tails.len()
    }
}

impl std::fmt::Debug for DispatchCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCore")
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.is_running())
            .field("pending", &self.tracker.len())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

fn ordering_key(event: &Event) -> Option<i64> {
    event
        .chat()
        .map(|chat| chat.id)
        .or_else(|| event.sender().map(|user| user.id))
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::testing::{RecordingTransport, group, private_text, text, user};
    use herald_framework::{MemoryRepository, Route, Router, Shared, UserRepository};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Sleeps for the number of milliseconds in the text, then logs it.
    async fn record(event: Arc<Event>, log: Shared<Log>) {
        let body = event.text().unwrap_or_default().to_string();
        let delay = body
            .split(':')
            .nth(1)
            .and_then(|ms| ms.parse().ok())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        log.lock().push(body);
    }

    fn core(log: &Log) -> DispatchCore {
        let dispatcher = Dispatcher::builder()
            .include_router(Router::new("main").route(Route::message().handler(record)))
            .shared(Arc::clone(log))
            .build();
        DispatchCore::new(dispatcher, Arc::new(RecordingTransport::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_within_chat() {
        let log = Log::default();
        let core = core(&log);
        core.start().unwrap();

        core.submit(text(group(-1), Some(user(1)), "a:100")).unwrap();
        core.submit(text(group(-1), Some(user(2)), "b:0")).unwrap();
        core.shutdown().await.unwrap();

        assert_eq!(*log.lock(), vec!["a:100".to_string(), "b:0".to_string()]);
        assert_eq!(core.lane_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chats_run_in_parallel() {
        let log = Log::default();
        let core = core(&log);
        core.start().unwrap();

        core.submit(private_text(user(1), "slow:100")).unwrap();
        core.submit(private_text(user(2), "fast:0")).unwrap();
        core.shutdown().await.unwrap();

        assert_eq!(*log.lock(), vec!["fast:0".to_string(), "slow:100".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_requires_running() {
        let log = Log::default();
        let core = core(&log);

        let event = private_text(user(1), "x");
        assert!(matches!(core.submit(event.clone()), Err(RuntimeError::NotStarted)));

        core.start().unwrap();
        core.shutdown().await.unwrap();
        assert!(matches!(core.submit(event), Err(RuntimeError::ShuttingDown)));
        assert!(matches!(core.start(), Err(RuntimeError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_cancels_and_closes_repository() {
        let log = Log::default();
        let repository = Arc::new(MemoryRepository::new());
        let core = core(&log)
            .with_repository(repository.clone())
            .with_shutdown_grace(Duration::from_secs(1));
        core.start().unwrap();

        core.submit(private_text(user(1), "stuck:60000")).unwrap();
        core.submit(private_text(user(2), "quick:10")).unwrap();
        core.shutdown().await.unwrap();

        assert_eq!(*log.lock(), vec!["quick:10".to_string()]);
        assert!(repository.count_users().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_stream_ends() {
        let log = Log::default();
        let core = core(&log);

        let events = futures::stream::iter(vec![
            private_text(user(1), "one:20"),
            private_text(user(1), "two:0"),
        ]);
        core.run_until(events, std::future::pending()).await.unwrap();

        assert_eq!(*log.lock(), vec!["one:20".to_string(), "two:0".to_string()]);
        assert!(!core.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown_future() {
        let log = Log::default();
        let core = core(&log);

        let events = futures::stream::pending::<Event>();
        core.run_until(events, tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(log.lock().is_empty());
    }
}
