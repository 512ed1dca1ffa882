//! Flat collector registry
//!
//! Maps metric identifiers to sampling functions with a per-collector
//! cadence ("every N beats"). The table is built once at startup and is
//! read-only for the lifetime of the report loop.

use crate::error::AgentError;
use crate::models::MetricSample;

/// A sampling function producing one metric sample per invocation.
pub type SampleFn = Box<dyn FnMut() -> MetricSample + Send>;

/// One registered collector: identifier, sampling function, cadence.
pub struct CollectorEntry {
    identifier: String,
    cadence: u64,
    sample_fn: SampleFn,
}

impl CollectorEntry {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }
}

/// Registry of metric collectors, kept in registration order.
#[derive(Default)]
pub struct CollectorRegistry {
    entries: Vec<CollectorEntry>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector that is due every `cadence` beats.
    ///
    /// A cadence of zero has no defined due-semantics and is rejected with
    /// `AgentError::Configuration`.
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        sample_fn: SampleFn,
        cadence: u64,
    ) -> Result<(), AgentError> {
        let identifier = identifier.into();
        if cadence == 0 {
            return Err(AgentError::Configuration(format!(
                "cadence for collector {identifier} must be positive"
            )));
        }
        tracing::debug!(collector = %identifier, cadence, "Registering collector");
        self.entries.push(CollectorEntry {
            identifier,
            cadence,
            sample_fn,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers of all registered collectors, in registration order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.identifier.as_str()).collect()
    }

    /// Cadences of all registered collectors, for cycle-length computation.
    pub fn cadences(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.cadence).collect()
    }

    /// Identifiers of the collectors due at the given beat.
    pub fn due_identifiers(&self, beat: u64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| beat % e.cadence == 0)
            .map(|e| e.identifier.as_str())
            .collect()
    }

    /// Invoke every collector whose cadence divides the beat, in
    /// registration order.
    ///
    /// Sampling functions are called directly; the registry never catches
    /// or rewrites what they produce.
    pub fn collect_due(&mut self, beat: u64) -> Vec<MetricSample> {
        self.entries
            .iter_mut()
            .filter(|e| beat % e.cadence == 0)
            .map(|e| (e.sample_fn)())
            .collect()
    }
}
