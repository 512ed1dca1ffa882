//! Publisher
//!
//! Owns the connection lifecycle and chunked batch delivery. States move
//! `Disconnected → Connecting → Connected`, with `Failed` absorbing from
//! either on a connect or publish error. There is no internal retry: the
//! report loop decides what a failure means for the run.

mod transport;

pub use transport::{AmqpTransport, BrokerConfig, Transport};

use tracing::{debug, info, warn};

use crate::error::AgentError;

/// Maximum lines per publish call, bounding the wire message size.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Delivers rendered batches through a broker transport.
pub struct Publisher<T: Transport> {
    transport: T,
    state: PublisherState,
    chunk_size: usize,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, chunk_size: usize) -> Self {
        Self {
            transport,
            state: PublisherState::Disconnected,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Establish the broker connection.
    ///
    /// Bad parameters and an unreachable broker are both surfaced as
    /// `AgentError::Connect`; retry policy belongs to the caller.
    pub async fn connect(&mut self) -> Result<(), AgentError> {
        self.state = PublisherState::Connecting;
        match self.transport.open().await {
            Ok(()) => {
                self.state = PublisherState::Connected;
                info!("Connected to broker");
                Ok(())
            }
            Err(e) => {
                self.state = PublisherState::Failed;
                Err(e)
            }
        }
    }

    /// Deliver a batch in chunks of at most `chunk_size` lines.
    ///
    /// Chunks go out sequentially; the first failure abandons the rest of
    /// the batch and is reported as one publish failure. There is no
    /// partial-success signal.
    pub async fn publish(&mut self, lines: &[String]) -> Result<(), AgentError> {
        if lines.is_empty() {
            return Ok(());
        }
        if self.state != PublisherState::Connected {
            return Err(AgentError::Publish(format!(
                "publisher is not connected (state {:?})",
                self.state
            )));
        }

        let total = lines.len().div_ceil(self.chunk_size);
        for (index, chunk) in lines.chunks(self.chunk_size).enumerate() {
            if let Err(e) = self.transport.send(&chunk.join("\n")).await {
                self.state = PublisherState::Failed;
                warn!(
                    chunk = index + 1,
                    total,
                    error = %e,
                    "Chunk delivery failed, abandoning batch"
                );
                return Err(e);
            }
        }

        debug!(lines = lines.len(), chunks = total, "Batch published");
        Ok(())
    }

    /// Best-effort teardown, always attempted on shutdown. Close errors are
    /// logged and swallowed: past this point there is nothing to correct.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Error while closing broker connection");
        }
        self.state = PublisherState::Disconnected;
        info!("Disconnected from broker");
    }
}
