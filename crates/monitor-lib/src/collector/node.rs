//! Built-in node metric collectors
//!
//! A flat catalog of samplers over a shared `sysinfo` probe, registered
//! according to the configured cadence map. A cadence of zero disables the
//! metric.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use sysinfo::{Networks, System, Users};

use crate::error::AgentError;
use crate::models::MetricSample;
use crate::registry::CollectorRegistry;

/// Cadences for the node metrics, in beats. Zero disables a metric.
///
/// `network` covers the four traffic counters with one shared cadence.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeCadences {
    pub cpu_usage: u64,
    pub memory_usage: u64,
    pub swap_usage: u64,
    pub user_count: u64,
    pub boot_time: u64,
    pub network: u64,
}

/// Shared probe over the host's live counters.
pub struct NodeProbe {
    system: System,
    networks: Networks,
}

impl NodeProbe {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu();
        self.system.global_cpu_info().cpu_usage() as f64
    }

    fn memory_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        percent(self.system.used_memory(), self.system.total_memory())
    }

    fn swap_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        percent(self.system.used_swap(), self.system.total_swap())
    }

    fn user_count(&self) -> f64 {
        Users::new_with_refreshed_list().list().len() as f64
    }

    fn boot_time(&self) -> f64 {
        System::boot_time() as f64
    }

    fn network_totals(&mut self) -> NetworkTotals {
        self.networks.refresh();
        let mut totals = NetworkTotals::default();
        for (_name, data) in &self.networks {
            totals.bytes_sent += data.total_transmitted();
            totals.bytes_received += data.total_received();
            totals.packets_sent += data.total_packets_transmitted();
            totals.packets_received += data.total_packets_received();
        }
        totals
    }
}

impl Default for NodeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct NetworkTotals {
    bytes_sent: u64,
    bytes_received: u64,
    packets_sent: u64,
    packets_received: u64,
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

fn now() -> i64 {
    Utc::now().timestamp()
}

type Probe = Arc<Mutex<NodeProbe>>;

fn sample<F>(probe: &Probe, name: &'static str, read: F) -> MetricSample
where
    F: FnOnce(&mut NodeProbe) -> f64,
{
    let mut probe = probe.lock().expect("node probe lock");
    let value = read(&mut probe);
    MetricSample::new(name, value, now())
}

/// Register the enabled node collectors into the registry.
///
/// Entries land in a fixed order so batches stay stable across runs. The
/// four network counters share the `network` cadence, matching how the
/// configuration names them.
pub fn register_node_collectors(
    registry: &mut CollectorRegistry,
    probe: Probe,
    cadences: &NodeCadences,
) -> Result<(), AgentError> {
    if cadences.cpu_usage > 0 {
        let probe = probe.clone();
        registry.register(
            "cpu.usage",
            Box::new(move || sample(&probe, "cpu.usage", NodeProbe::cpu_percent)),
            cadences.cpu_usage,
        )?;
    }
    if cadences.memory_usage > 0 {
        let probe = probe.clone();
        registry.register(
            "memory.usage",
            Box::new(move || sample(&probe, "memory.usage", NodeProbe::memory_percent)),
            cadences.memory_usage,
        )?;
    }
    if cadences.swap_usage > 0 {
        let probe = probe.clone();
        registry.register(
            "swap.usage",
            Box::new(move || sample(&probe, "swap.usage", NodeProbe::swap_percent)),
            cadences.swap_usage,
        )?;
    }
    if cadences.user_count > 0 {
        let probe = probe.clone();
        registry.register(
            "user.count",
            Box::new(move || sample(&probe, "user.count", |p| p.user_count())),
            cadences.user_count,
        )?;
    }
    if cadences.boot_time > 0 {
        let probe = probe.clone();
        registry.register(
            "system.boot_time",
            Box::new(move || sample(&probe, "system.boot_time", |p| p.boot_time())),
            cadences.boot_time,
        )?;
    }
    if cadences.network > 0 {
        let pairs: [(&'static str, fn(NetworkTotals) -> u64); 4] = [
            ("network.bytes_sent", |t| t.bytes_sent),
            ("network.bytes_received", |t| t.bytes_received),
            ("network.packages_sent", |t| t.packets_sent),
            ("network.packages_received", |t| t.packets_received),
        ];
        for (name, field) in pairs {
            let probe = probe.clone();
            registry.register(
                name,
                Box::new(move || {
                    sample(&probe, name, |p| field(p.network_totals()) as f64)
                }),
                cadences.network,
            )?;
        }
    }
    Ok(())
}
