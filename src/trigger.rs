//! Physical trigger boundary
//!
//! The original device published on a button's rising edge; the host-side
//! equivalent is SIGUSR1. The trigger context is deliberately thin: its only
//! permitted action is posting a task onto the dispatcher. It performs no
//! session I/O of its own, so the no-concurrent-session-ops invariant is
//! enforced by construction.

use crate::dispatch::{DispatchHandle, Task};
use crate::error::DeviceError;
use crate::session::{MessageTransport, SessionClient};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The task one trigger firing enqueues: publish a single telemetry
/// message. Shared between the signal bridge and the test harnesses so both
/// exercise the same unit of work.
pub fn telemetry_task<T>() -> Task<SessionClient<T>>
where
    T: MessageTransport + 'static,
{
    Box::new(|mut session: SessionClient<T>| {
        Box::pin(async move {
            let outcome = session
                .publish_telemetry()
                .await
                .map(drop)
                .map_err(DeviceError::from);
            (session, outcome)
        })
    })
}

/// Bridge SIGUSR1 deliveries onto the dispatcher, one publish task per
/// rising edge. Runs until the signal stream or the dispatch loop goes away.
pub fn spawn_signal_trigger<T>(
    handle: DispatchHandle<SessionClient<T>>,
) -> std::io::Result<JoinHandle<()>>
where
    T: MessageTransport + 'static,
{
    let mut rising_edge = signal(SignalKind::user_defined1())?;
    info!("send SIGUSR1 to this process to publish a telemetry message");

    Ok(tokio::spawn(async move {
        while rising_edge.recv().await.is_some() {
            debug!("trigger fired");
            if handle.post(telemetry_task()).is_err() {
                debug!("dispatch loop gone, trigger source stopping");
                break;
            }
        }
    }))
}
