//! Broker session ownership and message exchange
//!
//! The `SessionClient` owns everything the original device kept in scattered
//! globals: the connection status, the message id counter, the telemetry
//! counter, and the single inbound handler. It is mutated exclusively from
//! dispatched tasks, so none of that state needs a lock.

use super::message::{
    InboundFrame, InboundPayload, MessageId, OutboundMessage, PayloadTooLarge,
};
use super::state::SessionState;
use super::transport::{ConnectCode, MessageTransport, TransportError};
use crate::net::Link;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Application callback for inbound control messages. The payload buffer
/// does not outlive the call; copy out anything that must.
pub type InboundHandler = Box<dyn FnMut(&InboundPayload) + Send>;

/// Session handshake failures
#[derive(Debug, Error)]
pub enum SessionError {
    /// The handshake could not complete at the transport level.
    #[error("session handshake failed")]
    Handshake(#[source] TransportError),
    /// The handshake completed but the broker answered with a non-success
    /// code and strict handshake policy is in force.
    #[error("broker rejected session handshake with code {}", .0.value())]
    Rejected(ConnectCode),
}

/// Publish failures
#[derive(Debug, Error)]
pub enum PublishError {
    /// Fail-fast guard: no transport I/O happened and no id was consumed.
    #[error("session is not connected (state: {state:?})")]
    NotConnected { state: SessionState },
    /// Caller handed over an oversize payload; no id was consumed.
    #[error(transparent)]
    Oversize(#[from] PayloadTooLarge),
    /// The transport rejected the message. The id stays consumed.
    #[error("transport rejected message {}", .id.value())]
    Transport {
        id: MessageId,
        #[source]
        source: TransportError,
    },
}

/// The device's one publish/subscribe session with the broker.
pub struct SessionClient<T: MessageTransport> {
    transport: T,
    link: Arc<Link>,
    device_id: String,
    state: SessionState,
    next_id: u32,
    telemetry_count: u32,
    inbound_handler: Option<InboundHandler>,
}

impl<T: MessageTransport> SessionClient<T> {
    /// Build a session over an established link. The link handle is shared,
    /// never owned: it is guaranteed to outlive the session but the session
    /// may only read it.
    pub fn new(transport: T, link: Arc<Link>, device_id: impl Into<String>) -> Self {
        Self {
            transport,
            link,
            device_id: device_id.into(),
            state: SessionState::Disconnected,
            next_id: 0,
            telemetry_count: 0,
            inbound_handler: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The underlying transport, for inspection in tests.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register the inbound-message handler. At most one is held; a second
    /// registration replaces the first.
    pub fn set_inbound_handler(&mut self, handler: impl FnMut(&InboundPayload) + Send + 'static) {
        if self.inbound_handler.is_some() {
            debug!("replacing registered inbound handler");
        }
        self.inbound_handler = Some(Box::new(handler));
    }

    /// Perform the session handshake.
    ///
    /// The broker's connect-result code is returned verbatim and NOT
    /// interpreted here: the session transitions to `Connected` whenever the
    /// handshake completes at the transport level, even on a non-success
    /// code. Callers enforce (or waive) strictness; see the
    /// `strict_handshake` configuration switch.
    pub async fn connect(&mut self) -> Result<ConnectCode, SessionError> {
        self.state = SessionState::Connecting;
        match self.transport.connect().await {
            Ok(code) => {
                self.state = SessionState::Connected;
                info!(code = code.value(), device_id = %self.device_id, "session connect returned");
                Ok(code)
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                Err(SessionError::Handshake(err))
            }
        }
    }

    /// Publish one fire-and-forget message.
    ///
    /// Fails fast when the session is not connected: no transport I/O, no id
    /// consumed. Once a message reaches the transport its id is consumed for
    /// good, success or not; assignment is at-most-once, delivery is not.
    pub async fn publish(&mut self, payload: &[u8]) -> Result<MessageId, PublishError> {
        if !self.state.can_publish() {
            return Err(PublishError::NotConnected { state: self.state });
        }

        let id = MessageId(self.next_id);
        let message = OutboundMessage::new(id, payload)?;
        self.next_id += 1;

        match self.transport.publish(&message).await {
            Ok(()) => {
                debug!(id = id.value(), len = payload.len(), "message published");
                Ok(id)
            }
            Err(source) => Err(PublishError::Transport { id, source }),
        }
    }

    /// Publish the standard telemetry message for one trigger firing.
    ///
    /// The message counter advances on every attempted send, delivered or
    /// not, matching the id counter's at-most-once consumption. The
    /// fail-fast path advances neither.
    pub async fn publish_telemetry(&mut self) -> Result<MessageId, PublishError> {
        if !self.state.can_publish() {
            return Err(PublishError::NotConnected { state: self.state });
        }

        let text = format!("Message #{} from {}.", self.telemetry_count, self.device_id);
        info!(message = %text, "sending telemetry");

        let result = self.publish(text.as_bytes()).await;
        self.telemetry_count += 1;
        result
    }

    /// Bound an inbound frame and hand it to the registered handler.
    ///
    /// The payload is clamped to the inbound bound before the copy; the
    /// handler's view is valid only for the duration of the call.
    pub fn handle_inbound(&mut self, frame: InboundFrame) {
        let payload = InboundPayload::from_frame(&frame.payload);
        if payload.truncated() {
            warn!(
                topic = %frame.topic,
                original_len = frame.payload.len(),
                kept = payload.len(),
                "inbound payload truncated"
            );
        }
        info!(topic = %frame.topic, len = payload.len(), "message arrived");

        match self.inbound_handler.as_mut() {
            Some(handler) => handler(&payload),
            None => debug!("no inbound handler registered; message dropped"),
        }
    }
}
