//! In-process transports for tests and offline hosts.
//!
//! Both types are cheap handles over shared state, so a test can keep one
//! clone to steer the fake while the controller owns another.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use catalog::{CountryRisk, UpcomingElection};
use foundation::CountryId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::protocol::CountryDetail;
use crate::transport::{BoxFuture, LiveChannel, LiveConnector, SnapshotSource};

#[derive(Default)]
struct SourceState {
    countries: Vec<CountryRisk>,
    elections: Vec<UpcomingElection>,
    details: BTreeMap<CountryId, CountryDetail>,
    fail_next: u32,
    elections_offline: bool,
    offline: bool,
    latency: Duration,
    country_fetches: u32,
}

#[derive(Clone, Default)]
pub struct MemorySnapshotSource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySnapshotSource {
    pub fn new(countries: Vec<CountryRisk>) -> Self {
        let source = Self::default();
        source.set_countries(countries);
        source
    }

    pub fn set_countries(&self, countries: Vec<CountryRisk>) {
        self.state.lock().countries = countries;
    }

    pub fn set_elections(&self, elections: Vec<UpcomingElection>) {
        self.state.lock().elections = elections;
    }

    pub fn insert_detail(&self, detail: CountryDetail) {
        self.state.lock().details.insert(detail.country.id, detail);
    }

    /// Fail the next `n` country fetches.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Fail only the election endpoint until switched back.
    pub fn set_elections_offline(&self, offline: bool) {
        self.state.lock().elections_offline = offline;
    }

    /// Fail every request until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Delay applied to every request, measured on the tokio clock.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Number of `fetch_countries` calls started so far.
    pub fn fetch_count(&self) -> u32 {
        self.state.lock().country_fetches
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.state.lock().offline {
            return Err(TransportError::Unavailable("memory source offline".into()));
        }
        Ok(())
    }
}

impl SnapshotSource for MemorySnapshotSource {
    fn fetch_countries(&self) -> BoxFuture<'_, Result<Vec<CountryRisk>, TransportError>> {
        Box::pin(async move {
            self.state.lock().country_fetches += 1;
            self.delay().await;
            self.check_online()?;
            let mut state = self.state.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TransportError::Unavailable("injected failure".into()));
            }
            Ok(state.countries.clone())
        })
    }

    fn fetch_upcoming_elections(
        &self,
    ) -> BoxFuture<'_, Result<Vec<UpcomingElection>, TransportError>> {
        Box::pin(async move {
            self.delay().await;
            self.check_online()?;
            let state = self.state.lock();
            if state.elections_offline {
                return Err(TransportError::Unavailable("elections offline".into()));
            }
            Ok(state.elections.clone())
        })
    }

    fn fetch_country(
        &self,
        id: CountryId,
    ) -> BoxFuture<'_, Result<CountryDetail, TransportError>> {
        Box::pin(async move {
            self.delay().await;
            self.check_online()?;
            self.state
                .lock()
                .details
                .get(&id)
                .cloned()
                .ok_or_else(|| TransportError::Status {
                    url: format!("memory:/country/{id}"),
                    status: 404,
                })
        })
    }
}

enum Frame {
    Text(String),
    Error(String),
    Close,
}

enum ConnectOutcome {
    Channel(MemoryLiveChannel),
    Fail(String),
    Stall,
}

#[derive(Default)]
struct ConnectorState {
    queue: VecDeque<ConnectOutcome>,
    unsupported: bool,
    attempts: u32,
}

/// Hands out queued channels in order; with nothing queued, opening fails.
#[derive(Clone, Default)]
pub struct MemoryLiveConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MemoryLiveConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose transport has no push support at all.
    pub fn unsupported() -> Self {
        let connector = Self::default();
        connector.state.lock().unsupported = true;
        connector
    }

    /// Queue a channel for the next successful open.
    pub fn push_channel(&self) -> LiveSender {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let channel = MemoryLiveChannel {
            rx,
            closed: closed.clone(),
        };
        self.state
            .lock()
            .queue
            .push_back(ConnectOutcome::Channel(channel));
        LiveSender { tx, closed }
    }

    pub fn push_failure(&self, reason: impl Into<String>) {
        self.state
            .lock()
            .queue
            .push_back(ConnectOutcome::Fail(reason.into()));
    }

    /// Queue an open that never completes.
    pub fn push_stall(&self) {
        self.state.lock().queue.push_back(ConnectOutcome::Stall);
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }
}

impl LiveConnector for MemoryLiveConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn LiveChannel>, TransportError>> {
        Box::pin(async move {
            let outcome = {
                let mut state = self.state.lock();
                state.attempts += 1;
                if state.unsupported {
                    return Err(TransportError::Unsupported);
                }
                state.queue.pop_front()
            };
            match outcome {
                Some(ConnectOutcome::Channel(channel)) => Ok(Box::new(channel) as Box<dyn LiveChannel>),
                Some(ConnectOutcome::Fail(reason)) => Err(TransportError::Unavailable(reason)),
                Some(ConnectOutcome::Stall) => std::future::pending().await,
                None => Err(TransportError::Unavailable("no channel queued".into())),
            }
        })
    }
}

pub struct MemoryLiveChannel {
    rx: mpsc::UnboundedReceiver<Frame>,
    closed: Arc<AtomicBool>,
}

impl LiveChannel for MemoryLiveChannel {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some(Frame::Text(text)) => Ok(Some(text)),
                Some(Frame::Error(reason)) => Err(TransportError::Unavailable(reason)),
                Some(Frame::Close) | None => Ok(None),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            self.rx.close();
        })
    }
}

/// Server side of a [`MemoryLiveChannel`].
#[derive(Clone)]
pub struct LiveSender {
    tx: mpsc::UnboundedSender<Frame>,
    closed: Arc<AtomicBool>,
}

impl LiveSender {
    /// Returns false once the client side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(Frame::Text(text.into())).is_ok()
    }

    pub fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Make the next read fail with a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.tx.send(Frame::Error(reason.into())).is_ok()
    }

    /// Close from the server side.
    pub fn close(&self) -> bool {
        self.tx.send(Frame::Close).is_ok()
    }

    /// Whether the client closed its end.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
