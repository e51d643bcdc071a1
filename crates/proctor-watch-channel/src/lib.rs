#![warn(missing_docs)]
//! # proctor-watch-channel
//!
//! ## Purpose
//! Thin duplex pipe between the client and the remote analyzer.
//!
//! ## Responsibilities
//! - Validate the analyzer endpoint.
//! - Send encoded frames as fire-and-forget `video_frame` events.
//! - Turn inbound transport traffic into typed [`ChannelEvent`] values:
//!   lifecycle notifications and parsed verdicts.
//! - Provide an in-memory transport for tests.
//!
//! ## Data flow
//! Caller -> [`ResultChannel::send`] -> [`ChannelTransport::emit`] -> analyzer.
//! Analyzer -> transport pushes [`TransportEvent`] -> [`ResultChannel`] decodes
//! -> caller polls [`ResultChannel::next_event_timeout`].
//!
//! ## Ownership and lifetimes
//! The transport is shared (`Arc`) because concrete transports usually run
//! their own I/O thread. Inbound events cross into the session loop through a
//! single `mpsc` queue owned by the channel.
//!
//! ## Error model
//! Only endpoint validation and the initial connect can fail with
//! [`ConnectionError`]. Send failures are logged and counted, never returned.
//! Malformed verdicts surface as [`ChannelEvent::Rejected`] so the caller can
//! drop them without tearing down the channel.
//!
//! ## Security and privacy notes
//! Frame payloads are never logged; only their sizes are.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use proctor_watch_analysis_contract::{MalformedResultError, parse_proctor_result};
use proctor_watch_core::{PROCTOR_RESULT_EVENT, ProctorResult, VIDEO_FRAME_EVENT, VideoFramePayload};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Endpoint schemes accepted for the analyzer channel.
pub const SUPPORTED_SCHEMES: [&str; 4] = ["ws", "wss", "http", "https"];

/// Raw traffic pushed by a transport into the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established (or re-established by the transport).
    Connect,
    /// Connection lost.
    Disconnect,
    /// Named event with a JSON payload.
    Message {
        /// Event name.
        event: String,
        /// JSON payload text.
        payload: String,
    },
}

/// Persistent-connection transport underlying the channel.
///
/// Reconnection, backoff, and session handshakes are the transport's concern.
pub trait ChannelTransport: Send + Sync {
    /// Starts the connection and registers the inbound event sink.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Transport`] when the connection cannot be
    /// started at all.
    fn connect(
        &self,
        endpoint: &Url,
        inbound: Sender<TransportEvent>,
    ) -> Result<(), ConnectionError>;

    /// Emits one named event with a JSON payload.
    ///
    /// # Errors
    /// Returns [`ConnectionError`] when the message could not be handed to the
    /// connection.
    fn emit(&self, event: &str, payload: &str) -> Result<(), ConnectionError>;
}

/// Typed inbound event delivered to the session.
#[derive(Debug)]
pub enum ChannelEvent {
    /// Lifecycle: connected.
    Connected,
    /// Lifecycle: disconnected.
    Disconnected,
    /// A valid verdict.
    Verdict(ProctorResult),
    /// A verdict payload that failed validation and must be dropped.
    Rejected(MalformedResultError),
}

/// Counters describing channel traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames handed to the transport.
    pub frames_sent: u64,
    /// Frames the transport refused.
    pub send_failures: u64,
    /// Valid verdicts received.
    pub verdicts_received: u64,
    /// Malformed verdicts dropped.
    pub verdicts_rejected: u64,
    /// Inbound messages with an unknown event name.
    pub unknown_events: u64,
}

/// Duplex channel to the remote analyzer.
pub struct ResultChannel {
    endpoint: Url,
    transport: Arc<dyn ChannelTransport>,
    inbound: Receiver<TransportEvent>,
    closed: bool,
    disconnected: bool,
    stats: ChannelStats,
}

impl ResultChannel {
    /// Validates `endpoint` and starts the transport connection.
    ///
    /// # Errors
    /// Returns [`ConnectionError::InvalidEndpoint`] for unusable URLs and
    /// propagates transport connect failures.
    pub fn open(
        endpoint: &str,
        transport: Arc<dyn ChannelTransport>,
    ) -> Result<Self, ConnectionError> {
        let endpoint = validate_channel_endpoint(endpoint)?;
        let (inbound_tx, inbound_rx) = mpsc::channel();
        transport.connect(&endpoint, inbound_tx)?;
        info!(endpoint = %endpoint, "analyzer channel opened");

        Ok(Self {
            endpoint,
            transport,
            inbound: inbound_rx,
            closed: false,
            disconnected: false,
            stats: ChannelStats::default(),
        })
    }

    /// Sends one frame. Fire-and-forget: failures are logged and counted.
    pub fn send(&mut self, payload: &VideoFramePayload) {
        let json = match payload.to_json() {
            Ok(json) => json,
            Err(error) => {
                self.stats.send_failures += 1;
                warn!(%error, "video frame serialization failed");
                return;
            }
        };

        match self.transport.emit(VIDEO_FRAME_EVENT, &json) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                debug!(bytes = json.len(), "video frame sent");
            }
            Err(error) => {
                self.stats.send_failures += 1;
                debug!(%error, "video frame dropped by transport");
            }
        }
    }

    /// Returns the next pending event without blocking.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.inbound.try_recv() {
                Ok(raw) => {
                    if let Some(event) = self.decode(raw) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return self.mark_closed(),
            }
        }
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Once the transport has gone away this reports one synthesized
    /// [`ChannelEvent::Disconnected`] and afterwards just waits out the timeout.
    pub fn next_event_timeout(&mut self, timeout: Duration) -> Option<ChannelEvent> {
        if self.closed {
            std::thread::sleep(timeout);
            return None;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbound.recv_timeout(remaining) {
                Ok(raw) => {
                    if let Some(event) = self.decode(raw) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => return self.mark_closed(),
            }
        }
    }

    /// Validated analyzer endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Traffic counters.
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Returns `true` once the transport has dropped its inbound sink.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        self.closed = true;
        warn!(endpoint = %self.endpoint, "analyzer transport went away");
        if self.disconnected {
            return None;
        }
        self.disconnected = true;
        Some(ChannelEvent::Disconnected)
    }

    fn decode(&mut self, raw: TransportEvent) -> Option<ChannelEvent> {
        match raw {
            TransportEvent::Connect => {
                self.disconnected = false;
                Some(ChannelEvent::Connected)
            }
            TransportEvent::Disconnect => {
                self.disconnected = true;
                Some(ChannelEvent::Disconnected)
            }
            TransportEvent::Message { event, payload } if event == PROCTOR_RESULT_EVENT => {
                match parse_proctor_result(&payload) {
                    Ok(result) => {
                        self.stats.verdicts_received += 1;
                        Some(ChannelEvent::Verdict(result))
                    }
                    Err(error) => {
                        self.stats.verdicts_rejected += 1;
                        warn!(%error, "dropping malformed verdict");
                        Some(ChannelEvent::Rejected(error))
                    }
                }
            }
            TransportEvent::Message { event, .. } => {
                self.stats.unknown_events += 1;
                debug!(event = %event, "ignoring unknown inbound event");
                None
            }
        }
    }
}

/// Validates an analyzer endpoint URL.
///
/// # Errors
/// Returns [`ConnectionError::InvalidEndpoint`] for unparsable URLs, URLs
/// without a host, or schemes other than [`SUPPORTED_SCHEMES`].
pub fn validate_channel_endpoint(endpoint: &str) -> Result<Url, ConnectionError> {
    let parsed = Url::parse(endpoint).map_err(|error| {
        ConnectionError::InvalidEndpoint(format!("invalid channel url: {error}"))
    })?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ConnectionError::InvalidEndpoint(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ConnectionError::InvalidEndpoint(
            "channel url has no host".to_string(),
        ));
    }

    Ok(parsed)
}

/// One message recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedMessage {
    /// Event name.
    pub event: String,
    /// JSON payload text.
    pub payload: String,
}

/// In-process transport that records outbound messages and lets tests inject
/// inbound traffic.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: Mutex<Option<Sender<TransportEvent>>>,
    emitted: Mutex<Vec<EmittedMessage>>,
    offline: Mutex<bool>,
    connect_on_open: bool,
}

impl MemoryTransport {
    /// Transport that stays silent until events are injected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that reports `connect` as soon as the channel opens.
    pub fn connected() -> Self {
        Self {
            connect_on_open: true,
            ..Self::default()
        }
    }

    /// Pushes an inbound event. Returns `false` when no channel is listening.
    pub fn inject(&self, event: TransportEvent) -> bool {
        let Ok(inbound) = self.inbound.lock() else {
            return false;
        };
        inbound
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Pushes a raw `proctor_result` payload.
    pub fn inject_verdict(&self, payload: impl Into<String>) -> bool {
        self.inject(TransportEvent::Message {
            event: PROCTOR_RESULT_EVENT.to_string(),
            payload: payload.into(),
        })
    }

    /// Makes subsequent emits fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    /// Drops the inbound sink, as a transport shutting down would.
    pub fn hang_up(&self) {
        if let Ok(mut inbound) = self.inbound.lock() {
            inbound.take();
        }
    }

    /// Snapshot of every emitted message, oldest first.
    pub fn emitted(&self) -> Vec<EmittedMessage> {
        self.emitted
            .lock()
            .map(|emitted| emitted.clone())
            .unwrap_or_default()
    }
}

impl ChannelTransport for MemoryTransport {
    fn connect(
        &self,
        _endpoint: &Url,
        inbound: Sender<TransportEvent>,
    ) -> Result<(), ConnectionError> {
        if self.connect_on_open {
            inbound
                .send(TransportEvent::Connect)
                .map_err(|error| ConnectionError::Transport(error.to_string()))?;
        }

        let mut slot = self
            .inbound
            .lock()
            .map_err(|_| ConnectionError::Transport("memory transport lock poisoned".to_string()))?;
        *slot = Some(inbound);
        Ok(())
    }

    fn emit(&self, event: &str, payload: &str) -> Result<(), ConnectionError> {
        let offline = self
            .offline
            .lock()
            .map_err(|_| ConnectionError::Transport("memory transport lock poisoned".to_string()))?;
        if *offline {
            return Err(ConnectionError::NotConnected);
        }

        let mut emitted = self
            .emitted
            .lock()
            .map_err(|_| ConnectionError::Transport("memory transport lock poisoned".to_string()))?;
        emitted.push(EmittedMessage {
            event: event.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

/// Channel errors; transient from the session's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Endpoint URL is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Transport is currently not connected.
    #[error("transport not connected")]
    NotConnected,
    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}
