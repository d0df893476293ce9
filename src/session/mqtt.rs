//! rumqttc-backed messaging transport
//!
//! Owns the MQTT client and its event loop. `connect` drives the loop
//! inline until the broker answers the handshake, then parks the loop on a
//! background task that forwards inbound publish frames to the session via
//! an unbounded channel. Publishes are QoS 0 throughout.

use super::message::{InboundFrame, OutboundMessage};
use super::transport::{ConnectCode, MessageTransport, TransportError};
use crate::config::BrokerSection;
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay before re-polling after an event loop error. rumqttc re-dials on
/// the next poll; the delay keeps a dead broker from spinning the task.
const POLL_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Topic this device publishes telemetry on: `devices/{device_id}/telemetry`
pub fn telemetry_topic(device_id: &str) -> String {
    format!("devices/{device_id}/telemetry")
}

/// Topic this device receives control messages on: `devices/{device_id}/commands`
pub fn command_topic(device_id: &str) -> String {
    format!("devices/{device_id}/commands")
}

/// Build MQTT options from the broker section.
fn configure_mqtt_options(
    device_id: &str,
    broker: &BrokerSection,
) -> Result<MqttOptions, TransportError> {
    let url = url::Url::parse(&broker.url)
        .map_err(|_| TransportError::InvalidBrokerUrl(broker.url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| TransportError::InvalidBrokerUrl(broker.url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    // Suffix with the process id so a restarted device does not collide
    // with its broker-side ghost.
    let client_id = format!("beacond-{device_id}-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        options.set_transport(rumqttc::Transport::tls_with_default_config());
    }

    if let Some(username_env) = &broker.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = broker
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            options.set_credentials(&username, &password);
        }
    }

    options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));

    Ok(options)
}

/// MQTT transport for a single telemetry device.
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    frame_tx: Option<mpsc::UnboundedSender<InboundFrame>>,
    loop_handle: Option<JoinHandle<()>>,
    telemetry_topic: String,
    command_topic: String,
}

impl MqttTransport {
    pub fn new(device_id: &str, broker: &BrokerSection) -> Result<Self, TransportError> {
        let options = configure_mqtt_options(device_id, broker)?;
        let (client, event_loop) = AsyncClient::new(options, 10);

        Ok(Self {
            client,
            event_loop: Some(event_loop),
            frame_tx: None,
            loop_handle: None,
            telemetry_topic: telemetry_topic(device_id),
            command_topic: command_topic(device_id),
        })
    }

    /// Register the channel inbound frames are forwarded on. At most one;
    /// frames arriving without a registered sender are dropped with a log.
    pub fn set_frame_sender(&mut self, sender: mpsc::UnboundedSender<InboundFrame>) {
        self.frame_tx = Some(sender);
    }

    /// Background poll loop: forwards publishes, re-subscribes after a
    /// broker-side reconnect, and keeps polling through errors.
    async fn run_event_loop(
        mut event_loop: EventLoop,
        client: AsyncClient,
        command_topic: String,
        frame_tx: Option<mpsc::UnboundedSender<InboundFrame>>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let frame = InboundFrame {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload.to_vec(),
                    };
                    match &frame_tx {
                        Some(tx) => {
                            if tx.send(frame).is_err() {
                                debug!("frame receiver dropped, stopping event loop");
                                return;
                            }
                        }
                        None => warn!(topic = %frame.topic, "inbound frame dropped: no sender registered"),
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // The broker re-accepted us after a drop; restore the
                    // command subscription it forgot.
                    info!("session re-established, re-subscribing");
                    if let Err(e) = client.subscribe(&command_topic, QoS::AtMostOnce).await {
                        warn!(error = %e, topic = %command_topic, "re-subscribe failed");
                    }
                }
                Ok(event) => debug!(?event, "transport event"),
                Err(e) => {
                    warn!(error = %e, "transport event loop error");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}

#[async_trait]
impl MessageTransport for MqttTransport {
    async fn connect(&mut self) -> Result<ConnectCode, TransportError> {
        let mut event_loop = self.event_loop.take().ok_or(TransportError::AlreadyStarted)?;

        // Drive the loop inline until the broker actually answers; any
        // event short of a ConnAck is not a connection.
        let code = loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    break ConnectCode::from_raw(ack.code as i32);
                }
                Ok(event) => debug!(?event, "pre-handshake event"),
                Err(e) => return Err(TransportError::Handshake(Box::new(e))),
            }
        };

        self.client
            .subscribe(&self.command_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Handshake(Box::new(e)))?;
        debug!(topic = %self.command_topic, "subscribed to command topic");

        self.loop_handle = Some(tokio::spawn(Self::run_event_loop(
            event_loop,
            self.client.clone(),
            self.command_topic.clone(),
            self.frame_tx.clone(),
        )));

        Ok(code)
    }

    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.client
            .publish(
                &self.telemetry_topic,
                QoS::AtMostOnce,
                message.retained,
                message.payload.clone(),
            )
            .await
            .map_err(|e| TransportError::Publish(Box::new(e)))
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_handle.take() {
            handle.abort();
        }
    }
}
