//! Library for the host and guest-VM metrics reporting agent
//!
//! This crate provides the core reporting pipeline:
//! - A flat collector registry multiplexed over a single beat clock
//! - Built-in node samplers and guest-VM discovery
//! - Wire-line assembly for the Graphite plaintext format
//! - A chunking publisher over an AMQP transport
//! - The report loop that ties it all together

pub mod collector;
pub mod error;
pub mod models;
pub mod publish;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod wire;

pub use collector::{
    register_node_collectors, NodeCadences, NodeProbe, ProcessSource, SysinfoSource, VmDiscovery,
};
pub use error::AgentError;
pub use models::{MetricSample, VmRecord};
pub use publish::{AmqpTransport, BrokerConfig, Publisher, PublisherState, Transport};
pub use registry::{CollectorEntry, CollectorRegistry, SampleFn};
pub use report::ReportLoop;
pub use scheduler::BeatScheduler;
pub use wire::{host_agent_name, BatchAssembler};
