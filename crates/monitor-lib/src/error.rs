//! Error types for the reporting pipeline

use thiserror::Error;

/// Errors surfaced by the reporting pipeline.
///
/// The first three kinds are fatal for the current run: configuration
/// problems abort startup, connect and publish failures abort the report
/// loop after a best-effort disconnect. `ProcessNotFound` is recovered
/// locally by VM discovery and never reaches the loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or missing configuration, detected once at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The broker connection could not be established.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// A chunk could not be delivered; the rest of the batch is abandoned.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A VM process vanished between enumeration and sampling.
    #[error("process {0} disappeared before sampling")]
    ProcessNotFound(u32),
}
