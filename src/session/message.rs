//! Message value types exchanged with the broker
//!
//! Payload bounds live here, in the types, rather than in implicit buffer
//! sizes at the call sites: outbound payloads are rejected when oversize
//! (the caller controls them), inbound payloads are truncated (the broker
//! does not).

use thiserror::Error;

/// Inbound buffer capacity. The final byte is reserved for a zero
/// terminator, so at most [`MAX_INBOUND_PAYLOAD`] payload bytes are kept.
pub const INBOUND_CAPACITY: usize = 128;

/// Largest inbound payload preserved before truncation.
pub const MAX_INBOUND_PAYLOAD: usize = INBOUND_CAPACITY - 1;

/// Largest payload accepted for an outbound message.
pub const MAX_OUTBOUND_PAYLOAD: usize = 128;

/// Identifier assigned to an outbound message.
///
/// Strictly increasing per session, starting at 0. An id consumed by a
/// failed transport publish is never reused: assignment is at-most-once even
/// though delivery is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);

impl MessageId {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Delivery-guarantee tier for a published message. This profile only ever
/// uses the weakest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckLevel {
    /// QoS 0: the broker never acknowledges receipt
    #[default]
    FireAndForget,
}

/// Rejected outbound payload; no message was built and no id was consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payload of {len} bytes exceeds the {max}-byte outbound bound", max = MAX_OUTBOUND_PAYLOAD)]
pub struct PayloadTooLarge {
    pub len: usize,
}

/// A fully-formed outbound telemetry message, consumed by the transport on
/// submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub payload: Vec<u8>,
    pub ack: AckLevel,
    pub retained: bool,
    pub dup: bool,
}

impl OutboundMessage {
    /// Build a fire-and-forget message. Retained and duplicate flags are
    /// always clear in this profile.
    pub fn new(id: MessageId, payload: &[u8]) -> Result<Self, PayloadTooLarge> {
        if payload.len() > MAX_OUTBOUND_PAYLOAD {
            return Err(PayloadTooLarge { len: payload.len() });
        }
        Ok(Self {
            id,
            payload: payload.to_vec(),
            ack: AckLevel::FireAndForget,
            retained: false,
            dup: false,
        })
    }
}

/// A raw inbound frame as reported by the transport, before bounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Bounded view of an inbound payload handed to the application handler.
///
/// The payload length is clamped to [`MAX_INBOUND_PAYLOAD`] before any byte
/// is copied, and the storage is zero-initialized, so the byte after the
/// payload (and in particular the final byte of the backing buffer) is
/// always zero. The buffer only lives for the duration of the handler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPayload {
    buf: [u8; INBOUND_CAPACITY],
    len: usize,
    truncated: bool,
}

impl InboundPayload {
    pub fn from_frame(payload: &[u8]) -> Self {
        // Clamp before the copy; an oversize frame must never overrun.
        let len = payload.len().min(MAX_INBOUND_PAYLOAD);
        let mut buf = [0u8; INBOUND_CAPACITY];
        buf[..len].copy_from_slice(&payload[..len]);
        Self {
            buf,
            len,
            truncated: len < payload.len(),
        }
    }

    /// The preserved payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the original frame exceeded the bound and was cut.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// The zero-terminated backing storage.
    pub fn storage(&self) -> &[u8; INBOUND_CAPACITY] {
        &self.buf
    }
}
