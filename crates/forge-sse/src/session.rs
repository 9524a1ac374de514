//! Stream sessions and the client that owns them.
//!
//! [`EventStreamClient::start`] registers a session, spawns a task that reads
//! the response body frame by frame, and returns the receiving ends. Events
//! are handed off through a single-slot channel, so a slow consumer stalls the
//! reader rather than growing a buffer.
//!
//! A stop is observed between frames and while a handoff is pending. An
//! in-flight body read is never interrupted; configure a read timeout on the
//! transport if that matters.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::errors::{StreamError, TransportError};
use crate::event::{Event, decode};
use crate::registry::{SessionId, SessionRegistry, StopSignal};
use crate::segmenter::{DEFAULT_MAX_FRAME_LEN, FrameReader};
use crate::transport::{HttpTransport, ReqwestTransport, StreamRequest, TransportConfig};

/// Client-side limits shared by every session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Read `FORGE_SSE_MAX_FRAME_LEN`, keeping the default when it is unset,
    /// zero or not a number.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_frame_len = lookup("FORGE_SSE_MAX_FRAME_LEN")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_FRAME_LEN);
        Self { max_frame_len }
    }
}

/// Receiving side of one session.
///
/// `events` yields decoded events in stream order and closes when the session
/// ends. `errors` then resolves with the terminal error. It resolves with a
/// `RecvError` instead when the session was stopped or its event receiver was
/// dropped.
#[derive(Debug)]
pub struct EventStream {
    pub id: SessionId,
    pub events: mpsc::Receiver<Event>,
    pub errors: oneshot::Receiver<StreamError>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }
}

/// Starts and stops event stream sessions over a shared transport.
#[derive(Clone)]
pub struct EventStreamClient {
    transport: Arc<dyn HttpTransport>,
    registry: Arc<SessionRegistry>,
    config: ClientConfig,
}

impl EventStreamClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            registry: Arc::new(SessionRegistry::default()),
            config,
        }
    }

    /// Build a reqwest-backed client from `FORGE_SSE_*` environment variables.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&TransportConfig::from_lookup(&lookup))?;
        Ok(Self::with_config(
            Arc::new(transport),
            ClientConfig::from_lookup(&lookup),
        ))
    }

    /// Open a session for `request`. The session is registered before the
    /// request is sent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: StreamRequest) -> EventStream {
        let (id, stop) = self.registry.register();
        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = oneshot::channel();

        debug!(session_id = %id, method = %request.method, url = %request.url, "starting event stream session");

        let session = StreamSession {
            id,
            transport: Arc::clone(&self.transport),
            registry: Arc::clone(&self.registry),
            stop,
            events: event_tx,
            max_frame_len: self.config.max_frame_len,
        };
        tokio::spawn(session.run(request, error_tx));

        EventStream {
            id,
            events: event_rx,
            errors: error_rx,
        }
    }

    /// Ask a running session to stop. Returns `false`, and does nothing, when
    /// the session is unknown or has already finished.
    pub fn stop(&self, id: &SessionId) -> bool {
        let known = self.registry.request_stop(id);
        debug!(session_id = %id, known, "stop requested for event stream session");
        known
    }

    pub fn is_active(&self, id: &SessionId) -> bool {
        self.registry.contains(id)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}

impl std::fmt::Debug for EventStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamClient")
            .field("active_sessions", &self.active_sessions())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum SessionExit {
    Terminal(StreamError),
    Stopped,
    ConsumerGone,
}

struct StreamSession {
    id: SessionId,
    transport: Arc<dyn HttpTransport>,
    registry: Arc<SessionRegistry>,
    stop: Arc<StopSignal>,
    events: mpsc::Sender<Event>,
    max_frame_len: usize,
}

impl StreamSession {
    async fn run(self, request: StreamRequest, errors: oneshot::Sender<StreamError>) {
        // The response body lives inside `drive` and is closed when it returns.
        let exit = self.drive(request).await;

        let Self {
            id,
            registry,
            events,
            ..
        } = self;
        registry.deregister(&id);
        drop(events);

        debug!(session_id = %id, exit = ?exit, "event stream session ended");
        if let SessionExit::Terminal(error) = exit {
            let _ = errors.send(error);
        }
    }

    async fn drive(&self, request: StreamRequest) -> SessionExit {
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(session_id = %self.id, %error, "event stream request failed");
                return SessionExit::Terminal(error.into());
            }
        };
        if !response.is_success() {
            warn!(session_id = %self.id, status = response.status, "event stream returned non-success status");
            return SessionExit::Terminal(StreamError::Status {
                status: response.status,
            });
        }

        let mut frames = FrameReader::with_max_frame_len(response.body, self.max_frame_len);
        loop {
            let frame = match frames.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return SessionExit::Terminal(StreamError::StreamClosed),
                Err(error) => {
                    warn!(session_id = %self.id, %error, "event stream read failed");
                    return SessionExit::Terminal(error);
                }
            };

            match decode(&frame) {
                Ok(event) => {
                    tokio::select! {
                        biased;
                        _ = self.stop.stopped() => return SessionExit::Stopped,
                        sent = self.events.send(event) => {
                            if sent.is_err() {
                                return SessionExit::ConsumerGone;
                            }
                        }
                    }
                }
                Err(error) => trace!(session_id = %self.id, %error, "skipping frame"),
            }

            if self.stop.is_requested() {
                return SessionExit::Stopped;
            }
        }
    }
}
