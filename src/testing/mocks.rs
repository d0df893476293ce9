//! Mock implementations for testing
//!
//! Provides a scriptable `MessageTransport` and `NetworkInterface` so the
//! session, connector, and dispatcher can be exercised without a broker or
//! a network.

use crate::net::{LinkAttemptError, NetworkInterface};
use crate::session::{ConnectCode, MessageTransport, OutboundMessage, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

/// Mock transport for testing
///
/// Records every message handed to it and plays back scripted publish
/// outcomes; an exhausted script accepts everything.
#[derive(Debug, Default)]
pub struct MockTransport {
    connect_code: ConnectCode,
    fail_handshake: bool,
    publish_script: Mutex<VecDeque<bool>>,
    published: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handshake completes, but the broker answers with the given code.
    pub fn with_connect_code(code: ConnectCode) -> Self {
        Self {
            connect_code: code,
            ..Default::default()
        }
    }

    /// Handshake fails outright at the transport level.
    pub fn with_handshake_failure() -> Self {
        Self {
            fail_handshake: true,
            ..Default::default()
        }
    }

    /// Script the outcome of successive publishes (`true` = accepted).
    pub fn script_publish(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.publish_script
            .lock()
            .unwrap()
            .extend(outcomes);
        self
    }

    /// Every message submitted so far, accepted or rejected.
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Shared handle to the submission record, for tests that give up
    /// ownership of the transport.
    pub fn published_handle(&self) -> Arc<Mutex<Vec<OutboundMessage>>> {
        self.published.clone()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn connect(&mut self) -> Result<ConnectCode, TransportError> {
        if self.fail_handshake {
            return Err(TransportError::Handshake("mock handshake failure".into()));
        }
        Ok(self.connect_code)
    }

    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.published.lock().unwrap().push(message.clone());

        let accepted = self.publish_script.lock().unwrap().pop_front().unwrap_or(true);
        if accepted {
            Ok(())
        } else {
            Err(TransportError::Publish("mock publish failure".into()))
        }
    }
}

/// Network interface that fails a scripted number of times before coming up.
#[derive(Debug)]
pub struct FlakyInterface {
    failures_remaining: u32,
    attempts: u32,
    connected: bool,
}

impl FlakyInterface {
    /// Address the interface reports once connected.
    pub const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 7, 42));

    /// Status code reported by each scripted failure (mirrors a no-connection
    /// stack code).
    pub const FAILURE_CODE: i32 = -3004;

    pub fn new(failures: u32) -> Self {
        Self {
            failures_remaining: failures,
            attempts: 0,
            connected: false,
        }
    }

    /// How many times `connect` has been called.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl NetworkInterface for FlakyInterface {
    fn connect(&mut self) -> Result<(), LinkAttemptError> {
        self.attempts += 1;
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(LinkAttemptError {
                code: Self::FAILURE_CODE,
            });
        }
        self.connected = true;
        Ok(())
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.connected.then_some(Self::ADDR)
    }
}
