//! # Engine Configuration
//!
//! Settings for the message-processing core: logging, the fire-and-forget
//! delivery pool, event channel sizing, the roles this node plays, and the
//! global phase layout of every flow.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use phase_engine::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_directory(Some("config".into()))?;
//! let pool_size = manager.config().worker_pool.max_concurrent_deliveries;
//! let in_flow = &manager.config().phases.in_flow;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::phases;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring engine.yaml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Structured logging settings
    pub logging: LoggingConfig,

    /// Fire-and-forget delivery pool settings
    pub worker_pool: WorkerPoolConfig,

    /// Lifecycle event channel settings
    pub events: EventsConfig,

    /// Processing node settings
    pub engine: NodeConfig,

    /// Global phase layout per flow
    pub phases: PhaseLayout,
}

/// Structured logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `phase_engine=debug`
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

/// Worker pool configuration for fire-and-forget transport delivery
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Upper bound of deliveries running at the same time
    pub max_concurrent_deliveries: usize,
}

/// Event publisher configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

/// Settings describing this processing node
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Roles played by this node; headers targeted at other roles are not checked
    pub roles: Vec<String>,

    /// Dispatch to the only registered operation when none was resolved
    pub single_operation_fallback: bool,
}

/// Ordered global phase names for each flow
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PhaseLayout {
    pub in_flow: Vec<String>,
    pub out_flow: Vec<String>,
    pub in_fault_flow: Vec<String>,
    pub out_fault_flow: Vec<String>,

    /// Phase that resolves the target operation on the inbound flows
    pub dispatch_phase: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            logging: LoggingConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            events: EventsConfig::default(),
            engine: NodeConfig::default(),
            phases: PhaseLayout::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: 16,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            roles: Vec::new(),
            single_operation_fallback: false,
        }
    }
}

impl Default for PhaseLayout {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        Self {
            in_flow: names(&[
                phases::TRANSPORT,
                phases::ADDRESSING,
                phases::SECURITY,
                phases::PRE_DISPATCH,
                phases::DISPATCH,
                phases::OPERATION_IN,
            ]),
            out_flow: names(&[
                phases::OPERATION_OUT,
                phases::POLICY_DETERMINATION,
                phases::MESSAGE_OUT,
                phases::SECURITY,
            ]),
            in_fault_flow: names(&[
                phases::PRE_DISPATCH,
                phases::DISPATCH,
                phases::OPERATION_IN_FAULT,
            ]),
            out_fault_flow: names(&[
                phases::OPERATION_OUT_FAULT,
                phases::POLICY_DETERMINATION,
                phases::MESSAGE_OUT,
                phases::SECURITY,
            ]),
            dispatch_phase: phases::DISPATCH.to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, rejecting layouts the registry cannot build
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_pool.max_concurrent_deliveries == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.max_concurrent_deliveries",
                "0",
                "at least one concurrent delivery is required",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "broadcast channels need a positive capacity",
            ));
        }

        self.phases.validate()
    }
}

impl PhaseLayout {
    pub fn validate(&self) -> ConfigResult<()> {
        for (flow, names) in [
            ("in_flow", &self.in_flow),
            ("out_flow", &self.out_flow),
            ("in_fault_flow", &self.in_fault_flow),
            ("out_fault_flow", &self.out_fault_flow),
        ] {
            if names.is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    flow,
                    "phases",
                ));
            }

            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(ConfigurationError::invalid_value(
                        format!("phases.{flow}"),
                        name.clone(),
                        "phase names must be unique within a flow",
                    ));
                }
            }
        }

        if !self.in_flow.contains(&self.dispatch_phase) {
            return Err(ConfigurationError::invalid_value(
                "phases.dispatch_phase",
                self.dispatch_phase.clone(),
                "dispatch phase must be part of the in flow",
            ));
        }

        Ok(())
    }
}
