//! Agent configuration
//!
//! Loaded once at startup from an optional config file plus `MONITOR_*`
//! environment variables, then validated into a single explicit struct.
//! Missing required broker parameters fail fast before anything connects.

use std::time::Duration;

use monitor_lib::{AgentError, BrokerConfig, NodeCadences};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "/etc/vm-monitor/agent";

/// Validated agent configuration, passed into every component that needs it.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Prefix for every wire line, identifying this host.
    pub agent_name: String,
    pub broker: BrokerConfig,
    /// Fixed sleep between ticks.
    pub quantum: Duration,
    /// Maximum lines per publish call.
    pub chunk_size: usize,
    /// Node metric cadences, in beats. Zero disables a metric.
    pub cadences: NodeCadences,
    /// Discovery passes between `vmcount` samples.
    pub vmcount_cadence: u64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    broker_host: Option<String>,
    #[serde(default = "defaults::broker_port")]
    broker_port: u16,
    broker_user: Option<String>,
    broker_password: Option<String>,
    #[serde(default = "defaults::broker_vhost")]
    broker_vhost: String,
    #[serde(default = "defaults::broker_exchange")]
    broker_exchange: String,

    agent_name: Option<String>,
    #[serde(default = "defaults::quantum_secs")]
    quantum_secs: u64,
    #[serde(default = "defaults::chunk_size")]
    chunk_size: usize,

    #[serde(default = "defaults::cadence_cpu")]
    cadence_cpu_usage: u64,
    #[serde(default = "defaults::cadence_memory")]
    cadence_memory_usage: u64,
    #[serde(default = "defaults::cadence_swap")]
    cadence_swap_usage: u64,
    #[serde(default = "defaults::cadence_users")]
    cadence_user_count: u64,
    #[serde(default = "defaults::cadence_boot_time")]
    cadence_boot_time: u64,
    #[serde(default = "defaults::cadence_network")]
    cadence_network: u64,

    #[serde(default = "defaults::vmcount_cadence")]
    vmcount_cadence: u64,
}

mod defaults {
    pub fn broker_port() -> u16 {
        5672
    }
    pub fn broker_vhost() -> String {
        "/".to_string()
    }
    pub fn broker_exchange() -> String {
        "monitor".to_string()
    }
    pub fn quantum_secs() -> u64 {
        1
    }
    pub fn chunk_size() -> usize {
        monitor_lib::publish::DEFAULT_CHUNK_SIZE
    }
    pub fn cadence_cpu() -> u64 {
        5
    }
    pub fn cadence_memory() -> u64 {
        5
    }
    pub fn cadence_swap() -> u64 {
        30
    }
    pub fn cadence_users() -> u64 {
        30
    }
    pub fn cadence_boot_time() -> u64 {
        60
    }
    pub fn cadence_network() -> u64 {
        10
    }
    pub fn vmcount_cadence() -> u64 {
        30
    }
}

impl AgentConfig {
    /// Load from the default file location (if present) and the
    /// environment.
    pub fn load() -> Result<Self, AgentError> {
        Self::load_from(
            config::Config::builder()
                .add_source(config::File::with_name(DEFAULT_CONFIG_PATH).required(false))
                .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true)),
        )
    }

    fn load_from(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AgentError> {
        let raw: RawConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AgentError::Configuration(e.to_string()))?;
        raw.validate()
    }
}

impl RawConfig {
    fn validate(self) -> Result<AgentConfig, AgentError> {
        let missing =
            |field: &str| AgentError::Configuration(format!("missing required field {field}"));

        let broker = BrokerConfig {
            host: self.broker_host.ok_or_else(|| missing("broker_host"))?,
            port: self.broker_port,
            user: self.broker_user.ok_or_else(|| missing("broker_user"))?,
            password: self
                .broker_password
                .ok_or_else(|| missing("broker_password"))?,
            vhost: self.broker_vhost,
            exchange: self.broker_exchange,
        };

        if self.quantum_secs == 0 {
            return Err(AgentError::Configuration(
                "quantum_secs must be positive".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(AgentError::Configuration(
                "chunk_size must be positive".into(),
            ));
        }
        if self.vmcount_cadence == 0 {
            return Err(AgentError::Configuration(
                "vmcount_cadence must be positive".into(),
            ));
        }

        Ok(AgentConfig {
            agent_name: self
                .agent_name
                .unwrap_or_else(monitor_lib::host_agent_name),
            broker,
            quantum: Duration::from_secs(self.quantum_secs),
            chunk_size: self.chunk_size,
            cadences: NodeCadences {
                cpu_usage: self.cadence_cpu_usage,
                memory_usage: self.cadence_memory_usage,
                swap_usage: self.cadence_swap_usage,
                user_count: self.cadence_user_count,
                boot_time: self.cadence_boot_time,
                network: self.cadence_network,
            },
            vmcount_cadence: self.vmcount_cadence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn from_file(contents: &str) -> Result<AgentConfig, AgentError> {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        AgentConfig::load_from(
            config::Config::builder()
                .add_source(config::File::from(file.path())),
        )
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = from_file(
            r#"
            broker_host = "broker.example"
            broker_user = "agent"
            broker_password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.broker.port, 5672);
        assert_eq!(cfg.broker.vhost, "/");
        assert_eq!(cfg.quantum, Duration::from_secs(1));
        assert_eq!(cfg.chunk_size, 100);
        assert_eq!(cfg.cadences.cpu_usage, 5);
        assert!(!cfg.agent_name.is_empty());
    }

    #[test]
    fn test_missing_broker_host_fails_fast() {
        let result = from_file(
            r#"
            broker_user = "agent"
            broker_password = "secret"
            "#,
        );
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = from_file(
            r#"
            broker_host = "broker.example"
            broker_user = "agent"
            broker_password = "secret"
            chunk_size = 0
            "#,
        );
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_zero_cadence_disables_metric() {
        let cfg = from_file(
            r#"
            broker_host = "broker.example"
            broker_user = "agent"
            broker_password = "secret"
            cadence_swap_usage = 0
            cadence_network = 15
            "#,
        )
        .unwrap();

        assert_eq!(cfg.cadences.swap_usage, 0);
        assert_eq!(cfg.cadences.network, 15);
    }

    #[test]
    fn test_explicit_agent_name_wins() {
        let cfg = from_file(
            r#"
            broker_host = "broker.example"
            broker_user = "agent"
            broker_password = "secret"
            agent_name = "net.example.host1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent_name, "net.example.host1");
    }
}
