//! Integration tests for startup link bring-up
//!
//! The device has no operator: link establishment must retry transient
//! failures forever and only ever give up when no interface exists at all.

use beacond::config::BrokerSection;
use beacond::net::NetworkConnector;
use beacond::session::{MessageTransport, MqttTransport, TransportError};
use beacond::testing::mocks::FlakyInterface;
use std::time::Duration;
use tokio::time::timeout;

fn dead_broker_section(port: u16) -> BrokerSection {
    BrokerSection {
        url: format!("mqtt://localhost:{port}"),
        username_env: None,
        password_env: None,
        keep_alive_secs: 60,
        probe_timeout_secs: 1,
    }
}

#[test]
fn test_connector_makes_exactly_n_plus_one_attempts() {
    // 3 transient failures then success: exactly 4 attempts, then a link
    let mut iface = FlakyInterface::new(3);
    let link = NetworkConnector::connect(&mut iface);

    assert_eq!(iface.attempts(), 4);
    assert_eq!(link.local_addr(), FlakyInterface::ADDR);
}

#[test]
fn test_connector_does_not_over_retry_on_immediate_success() {
    let mut iface = FlakyInterface::new(0);
    let _link = NetworkConnector::connect(&mut iface);
    assert_eq!(iface.attempts(), 1);
}

#[test]
fn test_connector_survives_long_failure_runs() {
    // No retry cap: a long outage is just a long wait
    let mut iface = FlakyInterface::new(500);
    let _link = NetworkConnector::connect(&mut iface);
    assert_eq!(iface.attempts(), 501);
}

#[tokio::test]
async fn test_handshake_fails_when_broker_unreachable() {
    // Nothing listens on this port; the handshake must error out rather
    // than report a connection
    let mut transport =
        MqttTransport::new("itest-no-broker", &dead_broker_section(39321)).unwrap();

    let result = timeout(Duration::from_secs(5), transport.connect()).await;
    match result {
        Ok(Ok(code)) => panic!("handshake reported success ({code:?}) with no broker"),
        Ok(Err(err)) => assert!(matches!(err, TransportError::Handshake(_))),
        Err(_elapsed) => {} // still dialing; equally not a connection
    }
}

#[tokio::test]
async fn test_transport_rejects_invalid_broker_url() {
    let mut broker = dead_broker_section(1883);
    broker.url = "not-a-url".to_string();

    let result = MqttTransport::new("itest-bad-url", &broker);
    assert!(matches!(result, Err(TransportError::InvalidBrokerUrl(_))));
}
