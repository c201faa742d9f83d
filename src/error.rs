//! Internal error types.
//!
//! Per the engine's propagation policy, none of these ever escape a
//! [`crate::Session`] public method -- they are logged via `tracing`
//! and absorbed, observable only through subsequent attach/flush
//! cycles. They exist so the transport-sink boundary and the config
//! loader have something typed to return and `?`-propagate internally.

/// Failure writing to or probing a transport sink.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport reported inactive before write")]
    Inactive,
    #[error("transport write failed: {0}")]
    Write(String),
}

/// Failure loading or validating an [`crate::EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
