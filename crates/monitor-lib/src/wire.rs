//! Wire-line rendering for the Graphite plaintext format
//!
//! Each sample becomes one line, `"<agent-name>.<metric-name> <value>
//! <unix-timestamp>"`. Lines keep insertion order within a batch; an empty
//! batch renders to nothing and is never published.

use crate::models::MetricSample;
use sysinfo::System;

/// Renders metric samples into wire lines under a fixed agent prefix.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    prefix: String,
}

impl BatchAssembler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Render one line per sample, preserving input order. Values are fixed
    /// two-decimal, timestamps integer Unix seconds.
    pub fn render(&self, samples: &[MetricSample]) -> Vec<String> {
        samples
            .iter()
            .map(|s| format!("{}.{} {:.2} {}", self.prefix, s.name, s.value, s.timestamp))
            .collect()
    }
}

/// Default agent name: the host name with its dot-separated labels reversed,
/// so metrics group by domain in the metric tree.
pub fn host_agent_name() -> String {
    let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
    let mut labels: Vec<&str> = host.split('.').collect();
    labels.reverse();
    labels.join(".")
}
