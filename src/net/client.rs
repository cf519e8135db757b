//! ScaleSyncClient: the live link to the scaling backend.
//!
//! Per session, one task on the tokio runtime:
//!   1. POST the scale-up trigger (no retry, any non-2xx is terminal)
//!   2. open the replica WebSocket
//!   3. forward every `{ "replicas": n }` frame until shutdown or failure
//!
//! Everything the task learns goes back to the event loop as `SyncEvent`s
//! over one unbounded channel, so updates keep transport order.
//!
//! `close()` fires the session's shutdown signal. A task that was shut
//! down exits quietly: it never reports the close it caused, and a trigger
//! still in flight is abandoned rather than resolved. Torn-down tasks are
//! kept until they finish so `drain()` can wait out the close handshake
//! before the runtime goes away.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::endpoints::Endpoints;
use super::error::{SyncError, SyncResult};
use super::{SyncEvent, SyncEventKind, SyncLink};

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire format of one stream update.
#[derive(Deserialize, Debug)]
struct ReplicaUpdate {
    replicas: u32,
}

fn parse_update(payload: &[u8]) -> Result<u32, serde_json::Error> {
    serde_json::from_slice::<ReplicaUpdate>(payload).map(|u| u.replicas)
}

struct ActiveSession {
    session: u64,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct ScaleSyncClient {
    runtime: Handle,
    http: reqwest::Client,
    endpoints: Endpoints,
    events: mpsc::UnboundedSender<SyncEvent>,
    active: Option<ActiveSession>,
    /// Shut-down tasks that may still be sending their close frame.
    closing: Vec<JoinHandle<()>>,
}

impl ScaleSyncClient {
    pub fn new(
        runtime: Handle,
        endpoints: Endpoints,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(TRIGGER_TIMEOUT)
            .build()
            .map_err(SyncError::HttpClient)?;
        Ok(Self::with_http(runtime, endpoints, events, http))
    }

    pub fn with_http(
        runtime: Handle,
        endpoints: Endpoints,
        events: mpsc::UnboundedSender<SyncEvent>,
        http: reqwest::Client,
    ) -> Self {
        ScaleSyncClient {
            runtime,
            http,
            endpoints,
            events,
            active: None,
            closing: Vec::new(),
        }
    }

    /// Tear down the live session and block until every torn-down task has
    /// exited, or `limit` passes. Returns whether all of them finished.
    /// Must not be called from inside the runtime.
    pub fn drain(&mut self, limit: Duration) -> bool {
        self.close();
        let tasks = std::mem::take(&mut self.closing);
        if tasks.is_empty() {
            return true;
        }
        let pending = tasks.len();
        let all_done = async move {
            for task in tasks {
                let _ = task.await;
            }
        };
        let finished = self
            .runtime
            .block_on(async move { tokio::time::timeout(limit, all_done).await })
            .is_ok();
        if !finished {
            warn!(pending, "sync teardown did not finish in time");
        }
        finished
    }
}

impl SyncLink for ScaleSyncClient {
    fn open(&mut self, session: u64) {
        // One live session at a time.
        self.close();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = SessionTask {
            session,
            http: self.http.clone(),
            endpoints: self.endpoints.clone(),
            events: self.events.clone(),
        };
        let task = self.runtime.spawn(task.run(shutdown_rx));
        self.active = Some(ActiveSession { session, shutdown: shutdown_tx, task });
        info!(session, trigger = %self.endpoints.trigger, "requesting scale-up");
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(session = active.session, "tearing down sync session");
            // The task may already be gone; nothing to do then.
            let _ = active.shutdown.send(());
            self.closing.retain(|t| !t.is_finished());
            self.closing.push(active.task);
        }
    }
}

impl Drop for ScaleSyncClient {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Session task ──

struct SessionTask {
    session: u64,
    http: reqwest::Client,
    endpoints: Endpoints,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl SessionTask {
    fn emit(&self, kind: SyncEventKind) {
        // Receiver gone means the game loop exited.
        let _ = self.events.send(SyncEvent { session: self.session, kind });
    }

    fn fail(&self, err: SyncError) {
        warn!(session = self.session, error = %err, "sync session failed");
        self.emit(SyncEventKind::Failed(err.failure()));
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let triggered = tokio::select! {
            _ = &mut shutdown => return,
            res = trigger(&self.http, &self.endpoints.trigger) => res,
        };
        if let Err(err) = triggered {
            self.fail(err);
            return;
        }
        self.emit(SyncEventKind::Triggered);

        let connected = tokio::select! {
            _ = &mut shutdown => return,
            res = tokio_tungstenite::connect_async(self.endpoints.stream.as_str()) => res,
        };
        let mut ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                self.fail(SyncError::StreamConnect(e));
                return;
            }
        };
        debug!(session = self.session, stream = %self.endpoints.stream, "replica stream open");
        self.emit(SyncEventKind::StreamOpened);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Err(e) = ws.close(None).await {
                        debug!(session = self.session, error = %e, "close handshake failed");
                    }
                    return;
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.forward(text.as_bytes()),
                    Some(Ok(Message::Binary(bytes))) => self.forward(&bytes),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(session = self.session, ?frame, "backend closed replica stream");
                        self.fail(SyncError::StreamClosed);
                        return;
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.fail(SyncError::Stream(e));
                        return;
                    }
                    None => {
                        self.fail(SyncError::StreamClosed);
                        return;
                    }
                },
            }
        }
    }

    fn forward(&self, payload: &[u8]) {
        match parse_update(payload) {
            Ok(replicas) => {
                debug!(session = self.session, replicas, "replica update");
                self.emit(SyncEventKind::Replicas(replicas));
            }
            Err(e) => {
                warn!(
                    session = self.session,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "ignoring malformed replica update"
                );
            }
        }
    }
}

async fn trigger(http: &reqwest::Client, url: &Url) -> SyncResult<()> {
    let response = http
        .post(url.clone())
        .send()
        .await
        .map_err(SyncError::TriggerRequest)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::TriggerStatus(status));
    }
    Ok(())
}
