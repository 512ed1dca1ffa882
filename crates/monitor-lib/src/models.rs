//! Core data models for the monitoring agent

/// One sampled data point.
///
/// Immutable once produced: created by a collector invocation, rendered by
/// the batch assembler in the same tick, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Metric name relative to the agent prefix, e.g. `cpu.usage`.
    pub name: String,
    pub value: f64,
    /// Unix seconds at sampling time.
    pub timestamp: i64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

/// A guest VM identified from a hypervisor process invocation.
///
/// Rebuilt on every discovery pass; copies are handed to the assembler,
/// nothing is kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    /// VM name parsed from the `-name` argument.
    pub name: String,
    pub pid: u32,
    /// Memory allocation parsed from the `-m` / `--memory-size` argument.
    pub memory_mb: u64,
}
