//! vm-monitor - host and guest-VM metrics reporting agent
//!
//! Samples node and VM resource metrics on a multiplexed beat clock and
//! republishes them, batched, to an AMQP broker for a Graphite-style
//! metrics store.

use std::sync::{Arc, Mutex};

use monitor_lib::{
    register_node_collectors, AgentError, AmqpTransport, BatchAssembler, CollectorRegistry,
    NodeProbe, Publisher, ReportLoop, SysinfoSource, VmDiscovery,
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

// Exit codes: configuration problems, connect failures and publish failures
// are distinguishable to the process supervisor.
const EXIT_CONFIGURATION: i32 = 1;
const EXIT_CONNECT: i32 = 2;
const EXIT_PUBLISH: i32 = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    info!(version = AGENT_VERSION, "Starting vm-monitor");

    if let Err(e) = run().await {
        error!(error = %e, "Agent terminated with error");
        let code = match e {
            AgentError::Configuration(_) => EXIT_CONFIGURATION,
            AgentError::Connect(_) => EXIT_CONNECT,
            AgentError::Publish(_) | AgentError::ProcessNotFound(_) => EXIT_PUBLISH,
        };
        std::process::exit(code);
    }
}

async fn run() -> Result<(), AgentError> {
    let cfg = config::AgentConfig::load()?;
    info!(
        agent = %cfg.agent_name,
        broker = %cfg.broker.host,
        port = cfg.broker.port,
        "Agent configured"
    );

    let probe = Arc::new(Mutex::new(NodeProbe::new()));
    let mut registry = CollectorRegistry::new();
    register_node_collectors(&mut registry, probe, &cfg.cadences)?;

    let discovery = VmDiscovery::with_vmcount_cadence(SysinfoSource::new(), cfg.vmcount_cadence);
    let publisher = Publisher::new(AmqpTransport::new(cfg.broker.clone()), cfg.chunk_size);
    let assembler = BatchAssembler::new(&cfg.agent_name);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    ReportLoop::new(registry, discovery, assembler, publisher, cfg.quantum)?
        .run(shutdown_rx)
        .await
}
