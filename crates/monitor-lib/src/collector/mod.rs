//! Metric collection
//!
//! Built-in node samplers over `sysinfo` and guest-VM discovery from
//! hypervisor process invocations. Node collectors go through the cadence
//! multiplexer; VM discovery runs once per tick and merges its samples
//! after the node metrics.

mod discovery;
mod node;

pub use discovery::{
    InterfaceCounters, ProcessRecord, ProcessSource, ProcessStats, SysinfoSource, VmDiscovery,
};
pub use node::{register_node_collectors, NodeCadences, NodeProbe};
