//! Network link bring-up
//!
//! The connector owns the one place this process is allowed to stall
//! indefinitely: establishing the underlying network link at startup. Every
//! transient failure is retried without a cap and without backoff; the device
//! has no operator, so eventually succeeding beats failing fast. The single
//! exception is the total absence of a usable interface, which is fatal.

use crate::config::BrokerSection;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Fatal network errors. Transient link failures are not represented here;
/// those are retried inside [`NetworkConnector::connect`] and never escape.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no usable network interface")]
    NoInterface,
}

/// Status code carried by a failed link attempt, preserved verbatim from the
/// underlying stack for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("link attempt failed with status {code}")]
pub struct LinkAttemptError {
    pub code: i32,
}

/// An established, ready-to-use network connection handle.
///
/// A `Link` can only be obtained from [`NetworkConnector::connect`], so any
/// value of this type is fully connected; there is no partially-initialized
/// state to observe.
#[derive(Debug, Clone)]
pub struct Link {
    local_addr: IpAddr,
}

impl Link {
    /// Address assigned to this device on the connected network. Diagnostic
    /// only; nothing routes on it.
    pub fn local_addr(&self) -> IpAddr {
        self.local_addr
    }
}

/// Abstraction over the platform's link-establishment mechanism.
///
/// Production code uses [`TcpLinkProbe`]; tests substitute scripted
/// interfaces to exercise the retry policy.
pub trait NetworkInterface {
    /// Attempt to bring the link up once. A failure carries the raw status
    /// code for logging and is always retryable.
    fn connect(&mut self) -> Result<(), LinkAttemptError>;

    /// Local address of the interface, available once `connect` succeeded.
    fn local_addr(&self) -> Option<IpAddr>;
}

/// Startup link establishment with unconditional, unbounded retry.
pub struct NetworkConnector;

impl NetworkConnector {
    /// Block until the interface comes up.
    ///
    /// Retries every non-success status forever, logging each failure. The
    /// only ways out are a live [`Link`] or the process never starting.
    pub fn connect<I: NetworkInterface>(iface: &mut I) -> Link {
        loop {
            match iface.connect() {
                Ok(()) => {
                    let local_addr = iface
                        .local_addr()
                        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                    info!(ip = %local_addr, "connected to the network");
                    return Link { local_addr };
                }
                Err(err) => {
                    warn!(status = err.code, "unable to connect to network, retrying");
                }
            }
        }
    }
}

/// Link probe that dials the broker's TCP endpoint to confirm reachability
/// and learn the device's own address.
///
/// The probe connection is closed immediately; the messaging transport opens
/// its own connection once the link is known good.
pub struct TcpLinkProbe {
    host: String,
    port: u16,
    timeout: Duration,
    local_addr: Option<IpAddr>,
}

impl TcpLinkProbe {
    /// Locate a usable network interface for the configured broker.
    ///
    /// Returns `None` when the host has no network stack to speak of (not
    /// even an unbound UDP socket can be created) or the broker URL names no
    /// host. There is nothing to retry against in either case.
    pub fn detect(broker: &BrokerSection) -> Option<Self> {
        // A socket that cannot even be created means no interface exists.
        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;

        let url = Url::parse(&broker.url).ok()?;
        let host = url.host_str()?.to_string();
        let port = url
            .port()
            .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

        Some(Self {
            host,
            port,
            timeout: Duration::from_secs(broker.probe_timeout_secs),
            local_addr: None,
        })
    }

    fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl NetworkInterface for TcpLinkProbe {
    fn connect(&mut self) -> Result<(), LinkAttemptError> {
        let addrs = self.resolve().map_err(|e| LinkAttemptError {
            code: e.raw_os_error().unwrap_or(-1),
        })?;

        let mut last_code = -1;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    self.local_addr = stream.local_addr().ok().map(|a| a.ip());
                    return Ok(());
                }
                Err(e) => last_code = e.raw_os_error().unwrap_or(-1),
            }
        }
        Err(LinkAttemptError { code: last_code })
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.local_addr
    }
}
