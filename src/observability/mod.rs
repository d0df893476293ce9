//! Observability: structured logging
//!
//! Diagnostic text output is the device's only console contract; it carries
//! no machine-readable protocol.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
