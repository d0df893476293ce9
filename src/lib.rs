//! beacond - single-device telemetry client
//!
//! A resilient publish/subscribe client for one physical device: bring the
//! network link up (retrying forever), open a session to the broker, relay
//! inbound control messages to application logic, and publish a telemetry
//! message whenever the external trigger fires.
//!
//! # Overview
//!
//! The crate is organized around three core components:
//! - [`net`]: link establishment with unconditional retry
//! - [`session`]: the broker session: handshake, publish, inbound dispatch
//! - [`dispatch`]: the single-threaded task queue every session operation is
//!   serialized through
//!
//! # Quick Start
//!
//! ```rust
//! use beacond::dispatch::Dispatcher;
//! use beacond::net::NetworkConnector;
//! use beacond::session::SessionClient;
//! use beacond::testing::mocks::{FlakyInterface, MockTransport};
//! use beacond::trigger::telemetry_task;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! // Two transient network failures, then the link comes up
//! let mut iface = FlakyInterface::new(2);
//! let link = Arc::new(NetworkConnector::connect(&mut iface));
//!
//! let mut session = SessionClient::new(MockTransport::new(), link, "demo-device");
//! session.connect().await.unwrap();
//!
//! let (dispatcher, handle) = Dispatcher::new(session);
//! handle.post(telemetry_task()).unwrap();
//! drop(handle); // in production the trigger source holds this forever
//!
//! let session = dispatcher.dispatch_forever().await;
//! assert_eq!(session.transport().published().len(), 1);
//! # });
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod net;
pub mod observability;
pub mod session;
pub mod testing;
pub mod trigger;

pub use config::DeviceConfig;
pub use dispatch::{DispatchHandle, Dispatcher, Task};
pub use error::{DeviceError, DeviceResult};
pub use net::{Link, NetworkConnector, NetworkInterface};
pub use session::{
    ConnectCode, InboundPayload, MessageId, MessageTransport, MqttTransport, SessionClient,
    SessionState,
};
