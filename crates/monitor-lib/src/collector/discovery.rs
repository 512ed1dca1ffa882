//! Guest-VM discovery
//!
//! Scans host processes for hypervisor invocations, parses the VM name and
//! memory allocation out of the argument vector, and samples each VM's live
//! resource counters. A VM whose process vanishes between enumeration and
//! sampling is dropped for that tick only; this is steady-state churn, not
//! an error.

use sysinfo::{Networks, Pid, System};
use tracing::debug;

use crate::error::AgentError;
use crate::models::{MetricSample, VmRecord};

/// Process names recognized as hypervisor VM processes.
const HYPERVISOR_NAMES: &[&str] = &[
    "kvm",
    "qemu-kvm",
    "qemu-system-x86_64",
    "qemu-system-aarch64",
];

/// How many discovery passes between `vmcount` samples. Deliberately on the
/// discovery component's own counter, independent of the beat multiplexer.
const DEFAULT_VMCOUNT_CADENCE: u64 = 30;

/// Snapshot of one host process at enumeration time.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cmdline: Vec<String>,
}

/// Live resource counters for one process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessStats {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

/// Cumulative counters for one network interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Seam over host probing so discovery can run against a mock in tests.
pub trait ProcessSource: Send {
    /// Enumerate all host processes.
    fn processes(&mut self) -> Vec<ProcessRecord>;

    /// Re-read one process's live counters. `AgentError::ProcessNotFound`
    /// when the process has disappeared since enumeration.
    fn stats(&mut self, pid: u32) -> Result<ProcessStats, AgentError>;

    /// Network interfaces with their cumulative counters.
    fn interfaces(&mut self) -> Vec<(String, InterfaceCounters)>;
}

/// Production probe over `sysinfo`.
pub struct SysinfoSource {
    system: System,
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoSource {
    fn processes(&mut self) -> Vec<ProcessRecord> {
        self.system.refresh_processes();
        self.system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                cmdline: process.cmd().to_vec(),
            })
            .collect()
    }

    fn stats(&mut self, pid: u32) -> Result<ProcessStats, AgentError> {
        let sys_pid = Pid::from_u32(pid);
        if !self.system.refresh_process(sys_pid) {
            return Err(AgentError::ProcessNotFound(pid));
        }
        self.system
            .process(sys_pid)
            .map(|p| ProcessStats {
                cpu_percent: p.cpu_usage() as f64,
                memory_bytes: p.memory(),
            })
            .ok_or(AgentError::ProcessNotFound(pid))
    }

    fn interfaces(&mut self) -> Vec<(String, InterfaceCounters)> {
        self.networks.refresh_list();
        self.networks
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    InterfaceCounters {
                        bytes_sent: data.total_transmitted(),
                        bytes_received: data.total_received(),
                    },
                )
            })
            .collect()
    }
}

/// Discovers guest VMs and samples their resource counters once per tick.
pub struct VmDiscovery<S: ProcessSource> {
    source: S,
    vmcount_cadence: u64,
    passes: u64,
}

impl<S: ProcessSource> VmDiscovery<S> {
    pub fn new(source: S) -> Self {
        Self::with_vmcount_cadence(source, DEFAULT_VMCOUNT_CADENCE)
    }

    pub fn with_vmcount_cadence(source: S, vmcount_cadence: u64) -> Self {
        Self {
            source,
            vmcount_cadence: vmcount_cadence.max(1),
            passes: 0,
        }
    }

    /// Enumerate the currently running VMs.
    ///
    /// A hypervisor process lacking a parseable `-name` / memory-size
    /// argument pair is skipped, not fatal.
    pub fn discover(&mut self) -> Vec<VmRecord> {
        self.source
            .processes()
            .into_iter()
            .filter(|p| HYPERVISOR_NAMES.contains(&p.name.as_str()))
            .filter_map(|p| parse_vm_record(&p))
            .collect()
    }

    /// One collection pass: per-VM cpu, memory and network samples, plus the
    /// periodic `vmcount` scalar.
    pub fn collect(&mut self, timestamp: i64) -> Vec<MetricSample> {
        self.passes += 1;

        let records = self.discover();
        let interfaces = self.source.interfaces();
        let mut samples = Vec::new();

        for vm in &records {
            let stats = match self.source.stats(vm.pid) {
                Ok(stats) => stats,
                Err(e) => {
                    debug!(vm = %vm.name, error = %e, "Dropping VM for this tick");
                    continue;
                }
            };

            samples.push(MetricSample::new(
                format!("vm.{}.cpu.usage", vm.name),
                stats.cpu_percent,
                timestamp,
            ));
            samples.push(MetricSample::new(
                format!("vm.{}.memory.usage", vm.name),
                stats.memory_bytes as f64,
                timestamp,
            ));
            samples.push(MetricSample::new(
                format!("vm.{}.memory.allocated", vm.name),
                vm.memory_mb as f64,
                timestamp,
            ));

            // Interfaces follow the `{vm_name}-{suffix}` naming convention;
            // anything else is ignored.
            let tap_prefix = format!("{}-", vm.name);
            let mut traffic = InterfaceCounters::default();
            let mut matched = false;
            for (name, counters) in &interfaces {
                if name.starts_with(&tap_prefix) {
                    traffic.bytes_sent += counters.bytes_sent;
                    traffic.bytes_received += counters.bytes_received;
                    matched = true;
                }
            }
            if matched {
                samples.push(MetricSample::new(
                    format!("vm.{}.network.bytes_sent", vm.name),
                    traffic.bytes_sent as f64,
                    timestamp,
                ));
                samples.push(MetricSample::new(
                    format!("vm.{}.network.bytes_received", vm.name),
                    traffic.bytes_received as f64,
                    timestamp,
                ));
            }
        }

        if self.passes % self.vmcount_cadence == 0 {
            samples.push(MetricSample::new(
                "vmcount",
                records.len() as f64,
                timestamp,
            ));
        }

        samples
    }
}

fn parse_vm_record(process: &ProcessRecord) -> Option<VmRecord> {
    let raw_name = arg_value(&process.cmdline, &["-name"])?;
    // qemu accepts `-name guest=web-1,debug-threads=on`.
    let name = raw_name
        .split(',')
        .next()?
        .trim_start_matches("guest=")
        .to_string();
    if name.is_empty() {
        return None;
    }

    let raw_memory = arg_value(&process.cmdline, &["-m", "--memory-size"])?;
    let memory_mb = leading_megabytes(&raw_memory)?;

    Some(VmRecord {
        name,
        pid: process.pid,
        memory_mb,
    })
}

/// The argument following any of the given tokens.
fn arg_value(args: &[String], keys: &[&str]) -> Option<String> {
    args.windows(2)
        .find(|pair| keys.contains(&pair[0].as_str()))
        .map(|pair| pair[1].clone())
}

/// Parse the leading integer of a qemu memory size: `2048`, `2048M`,
/// `size=2048,slots=2` all yield 2048.
fn leading_megabytes(value: &str) -> Option<u64> {
    let value = value.strip_prefix("size=").unwrap_or(value);
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
