//! Messaging transport seam
//!
//! The publish/subscribe wire protocol is an external collaborator; this
//! trait is the session's entire view of it. Production code plugs in the
//! rumqttc-backed [`MqttTransport`](super::mqtt::MqttTransport), tests plug
//! in [`MockTransport`](crate::testing::mocks::MockTransport).

use super::message::OutboundMessage;
use async_trait::async_trait;
use thiserror::Error;

/// Connect-result status code from the broker, preserved verbatim.
///
/// The session returns it to the caller for diagnostics and never interprets
/// it beyond [`is_success`](Self::is_success); deciding what a rejection
/// means is startup policy, not session logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectCode(i32);

impl ConnectCode {
    /// The broker accepted the session.
    pub const ACCEPTED: Self = Self(0);

    pub fn from_raw(code: i32) -> Self {
        Self(code)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("handshake failed")]
    Handshake(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("publish rejected by transport")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("transport already started")]
    AlreadyStarted,
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
}

/// The external publish/subscribe client the session drives.
#[async_trait]
pub trait MessageTransport: Send {
    /// Perform the session handshake over the already-established link.
    /// Returns the broker's connect-result code verbatim; an `Err` means the
    /// handshake could not complete at all.
    async fn connect(&mut self) -> Result<ConnectCode, TransportError>;

    /// Submit one outbound message. Fire-and-forget: success means the
    /// transport took the message, not that anyone received it.
    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;
}
