//! Broker session layer
//!
//! Split the way the rest of the crate is: pure state in [`state`], message
//! value types and their bounds in [`message`], the external transport seam
//! in [`transport`], the rumqttc implementation in [`mqtt`], and the impure
//! session client in [`client`].

pub mod client;
pub mod message;
pub mod mqtt;
pub mod state;
pub mod transport;

pub use client::{InboundHandler, PublishError, SessionClient, SessionError};
pub use message::{
    AckLevel, InboundFrame, InboundPayload, MessageId, OutboundMessage, PayloadTooLarge,
    INBOUND_CAPACITY, MAX_INBOUND_PAYLOAD, MAX_OUTBOUND_PAYLOAD,
};
pub use mqtt::MqttTransport;
pub use state::SessionState;
pub use transport::{ConnectCode, MessageTransport, TransportError};
