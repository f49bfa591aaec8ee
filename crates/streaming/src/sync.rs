//! Live state synchronization session.
//!
//! One controller task owns the whole lifecycle: bootstrap the store from a
//! full snapshot, follow the push channel, reconnect, and fall back to
//! interval polling when push is unavailable. Every await is raced against
//! the teardown signal so a closed session never writes to the store, and
//! every transport call is bounded by a timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use catalog::{SnapshotStore, StoreRevision};
use runtime::{Metrics, MetricsSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::protocol::{LiveMessage, parse_live_message};
use crate::transport::{LiveChannel, LiveConnector, SnapshotSource};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Bootstrapping,
    LiveConnected,
    /// Waiting to reopen the channel; `failures` counts consecutive failed
    /// opens since the last successful one.
    Reconnecting { failures: u32 },
    Polling,
    Closed,
}

/// Diagnostics returned when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub session_id: String,
    /// Store revision of the last mutation this session applied.
    pub last_applied: Option<u64>,
    pub metrics: MetricsSnapshot,
}

impl SyncReport {
    fn empty(session_id: String) -> Self {
        Self {
            session_id,
            last_applied: None,
            metrics: MetricsSnapshot::default(),
        }
    }
}

pub struct LiveSyncController {
    store: SnapshotStore,
    source: Arc<dyn SnapshotSource>,
    connector: Option<Arc<dyn LiveConnector>>,
    config: SyncConfig,
}

impl LiveSyncController {
    /// A controller without a push connector polls after bootstrap.
    pub fn new(store: SnapshotStore, source: Arc<dyn SnapshotSource>, config: SyncConfig) -> Self {
        Self {
            store,
            source,
            connector: None,
            config,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn LiveConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Start the session on the current tokio runtime.
    pub fn spawn(self) -> SyncHandle {
        let session_id = Uuid::new_v4().to_string();
        let (state_tx, state_rx) = watch::channel(SyncState::Bootstrapping);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = SyncRun {
            store: self.store.clone(),
            source: self.source,
            connector: self.connector,
            config: self.config,
            state_tx,
            shutdown: shutdown_rx,
            metrics: Metrics::new(),
            last_applied: None,
            session_id: session_id.clone(),
        };
        let span = info_span!("live_sync", session = %session_id);
        let task = tokio::spawn(run.run().instrument(span));

        SyncHandle {
            session_id,
            store: self.store,
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Owner side of a running session. Dropping it tears the session down.
pub struct SyncHandle {
    session_id: String,
    store: SnapshotStore,
    state: watch::Receiver<SyncState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<SyncReport>>,
}

impl SyncHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Resolve once the session reaches a state matching `predicate`, or
    /// with the final state if the session ended first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(SyncState) -> bool) -> SyncState {
        let reached = self.state.wait_for(|s| predicate(*s)).await.map(|s| *s);
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    pub async fn shutdown(mut self) -> SyncReport {
        self.shutdown.send_replace(true);
        let Some(task) = self.task.take() else {
            return SyncReport::empty(self.session_id.clone());
        };
        match task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(session = %self.session_id, "sync task ended abnormally: {e}");
                SyncReport::empty(self.session_id.clone())
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Next step of the session. `Live` carries the open channel.
enum Phase {
    Bootstrap,
    Connect { failures: u32 },
    Live(Box<dyn LiveChannel>),
    Reconnect { failures: u32 },
    Poll,
}

struct SyncRun {
    store: SnapshotStore,
    source: Arc<dyn SnapshotSource>,
    connector: Option<Arc<dyn LiveConnector>>,
    config: SyncConfig,
    state_tx: watch::Sender<SyncState>,
    shutdown: watch::Receiver<bool>,
    metrics: Metrics,
    last_applied: Option<u64>,
    session_id: String,
}

impl SyncRun {
    async fn run(mut self) -> SyncReport {
        info!("sync session started");
        let mut phase = Phase::Bootstrap;
        loop {
            let next = match phase {
                Phase::Bootstrap => self.bootstrap().await,
                Phase::Connect { failures } => self.connect(failures).await,
                Phase::Live(channel) => self.follow(channel).await,
                Phase::Reconnect { failures } => self.reconnect(failures).await,
                Phase::Poll => self.poll().await,
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }

        self.enter(SyncState::Closed);
        info!(metrics = %self.metrics.snapshot(), "sync session closed");
        SyncReport {
            session_id: self.session_id,
            last_applied: self.last_applied,
            metrics: self.metrics.snapshot(),
        }
    }

    fn enter(&mut self, state: SyncState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = ?previous, to = ?state, "sync state");
            self.metrics.inc("sync.transitions");
        }
    }

    fn mark(&mut self, revision: StoreRevision) {
        self.last_applied = Some(revision.seq);
        self.metrics.set_gauge("sync.last_applied", revision.seq as i64);
    }

    fn count_timeout(&mut self, error: &TransportError) {
        if matches!(error, TransportError::Timeout { .. }) {
            self.metrics.inc("sync.timeouts");
        }
    }

    fn after_snapshot(&self) -> Phase {
        if self.connector.is_some() {
            Phase::Connect { failures: 0 }
        } else {
            Phase::Poll
        }
    }

    async fn bootstrap(&mut self) -> Option<Phase> {
        self.enter(SyncState::Bootstrapping);
        let mut failures = 0u32;
        loop {
            match self.refresh().await? {
                Ok(()) => return Some(self.after_snapshot()),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.config.bootstrap_delay(failures);
                    warn!(error = %e, failures, ?delay, "bootstrap fetch failed");
                    until_shutdown(&mut self.shutdown, tokio::time::sleep(delay)).await?;
                }
            }
        }
    }

    async fn connect(&mut self, failures: u32) -> Option<Phase> {
        let Some(connector) = self.connector.clone() else {
            return Some(Phase::Poll);
        };
        let timeout = self.config.connect_timeout;
        let open = bounded("live channel open", timeout, connector.connect());
        match until_shutdown(&mut self.shutdown, open).await? {
            Ok(channel) => Some(Phase::Live(channel)),
            Err(TransportError::Unsupported) => {
                info!("live channel unsupported, polling");
                Some(Phase::Poll)
            }
            Err(e) => {
                self.count_timeout(&e);
                self.metrics.inc("sync.connect_failures");
                let failures = failures.saturating_add(1);
                if failures >= self.config.max_connect_failures {
                    warn!(error = %e, failures, "live channel unavailable, polling");
                    Some(Phase::Poll)
                } else {
                    warn!(error = %e, failures, "live channel open failed");
                    Some(Phase::Reconnect { failures })
                }
            }
        }
    }

    async fn reconnect(&mut self, failures: u32) -> Option<Phase> {
        self.enter(SyncState::Reconnecting { failures });
        let delay = self.config.reconnect_delay;
        until_shutdown(&mut self.shutdown, tokio::time::sleep(delay)).await?;
        Some(Phase::Connect { failures })
    }

    async fn follow(&mut self, mut channel: Box<dyn LiveChannel>) -> Option<Phase> {
        self.enter(SyncState::LiveConnected);
        loop {
            let Some(frame) = until_shutdown(&mut self.shutdown, channel.next_message()).await
            else {
                close_channel(channel).await;
                return None;
            };
            match frame {
                Ok(Some(text)) => {
                    if self.handle_frame(&text).await.is_none() {
                        close_channel(channel).await;
                        return None;
                    }
                }
                Ok(None) => {
                    info!("live channel closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "live channel failed");
                    break;
                }
            }
        }
        close_channel(channel).await;
        Some(Phase::Reconnect { failures: 0 })
    }

    /// `None` only when the session was torn down mid-frame.
    async fn handle_frame(&mut self, text: &str) -> Option<()> {
        let patches = match parse_live_message(text) {
            Ok(LiveMessage::PsiUpdate(patches)) => patches,
            Ok(LiveMessage::Ignored { kind }) => {
                self.metrics.inc("sync.ignored_messages");
                debug!(%kind, "ignoring live message");
                return Some(());
            }
            Err(e) => {
                self.metrics.inc("sync.malformed_messages");
                warn!(error = %e, "dropping malformed live frame");
                return Some(());
            }
        };

        let outcome = self.store.patch(&patches);
        self.metrics
            .inc_counter("sync.patches_applied", outcome.applied.len() as u64);
        self.metrics.inc_counter(
            "sync.updates_ignored",
            (outcome.unknown.len() + outcome.rejected.len()) as u64,
        );
        if let Some(revision) = outcome.revision {
            self.mark(revision);
        }
        debug!(
            applied = outcome.applied.len(),
            unknown = outcome.unknown.len(),
            "applied live update"
        );

        if self.config.refresh_on_push {
            if let Err(e) = self.refresh().await? {
                warn!(error = %e, "refresh after push failed; keeping patched state");
            }
        }
        Some(())
    }

    async fn poll(&mut self) -> Option<Phase> {
        self.enter(SyncState::Polling);
        let interval = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        loop {
            until_shutdown(&mut self.shutdown, tokio::time::sleep(interval)).await?;
            if let Err(e) = self.refresh().await? {
                warn!(error = %e, "poll fetch failed; keeping last snapshot");
            }
        }
    }

    /// Full re-fetch. The outer `None` means teardown won the race and
    /// nothing was written.
    async fn refresh(&mut self) -> Option<Result<(), TransportError>> {
        self.metrics.inc("sync.snapshot_fetches");
        let started = Instant::now();
        let timeout = self.config.fetch_timeout;
        let fetch = bounded("country snapshot fetch", timeout, self.source.fetch_countries());
        let countries = match until_shutdown(&mut self.shutdown, fetch).await? {
            Ok(countries) => countries,
            Err(e) => {
                self.count_timeout(&e);
                self.metrics.inc("sync.snapshot_failures");
                return Some(Err(e));
            }
        };
        let revision = self.store.replace_all(countries);
        self.mark(revision);
        self.metrics
            .record_histogram("sync.refresh_ms", started.elapsed().as_millis() as i64);

        let fetch = bounded("election fetch", timeout, self.source.fetch_upcoming_elections());
        match until_shutdown(&mut self.shutdown, fetch).await? {
            Ok(elections) => {
                let revision = self.store.replace_elections(elections);
                self.mark(revision);
            }
            Err(e) => {
                self.count_timeout(&e);
                self.metrics.inc("sync.election_failures");
                debug!(error = %e, "election fetch failed; keeping previous list");
            }
        }
        Some(Ok(()))
    }
}

/// Run `fut` unless teardown is signalled first. Teardown wins ties, and a
/// result that completes after teardown was signalled is discarded.
async fn until_shutdown<F: Future>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    if *shutdown.borrow() {
        return None;
    }
    let out = tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => return None,
        out = fut => out,
    };
    if *shutdown.borrow() {
        return None;
    }
    Some(out)
}

/// Give up on a transport call after `after`; a hung request then takes the
/// ordinary failure path.
async fn bounded<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .unwrap_or_else(|_| Err(TransportError::Timeout { operation, after }))
}

async fn close_channel(mut channel: Box<dyn LiveChannel>) {
    if tokio::time::timeout(CLOSE_TIMEOUT, channel.close()).await.is_err() {
        debug!("live channel close timed out");
    }
}
