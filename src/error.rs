//! Device-wide error taxonomy
//!
//! Every failure is handled at the boundary where it occurs and converted to
//! diagnostic output; nothing unwinds past the dispatch loop. This type
//! exists so tasks and startup code share one conversion point.

use crate::config::ConfigError;
use crate::net::NetworkError;
use crate::session::{PublishError, SessionError, TransportError};
use thiserror::Error;

/// Main error type for device operations
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn test_publish_error_converts_and_displays() {
        let err: DeviceError = PublishError::NotConnected {
            state: SessionState::Disconnected,
        }
        .into();

        let rendered = err.to_string();
        assert!(rendered.contains("not connected"), "got: {rendered}");
    }

    #[test]
    fn test_network_error_converts() {
        let err: DeviceError = NetworkError::NoInterface.into();
        assert!(matches!(err, DeviceError::Network(_)));
        assert!(!err.to_string().is_empty());
    }
}
