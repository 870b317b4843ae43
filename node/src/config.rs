// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use sequent_kernel::command::FailurePolicy;
use sequent_kernel::config::{ADMIN_SOURCE, DEFAULT_REGION_CAPACITY};
use sequent_kernel::duty::IdleConfig;
use sequent_kernel::error::ConfigError;
use sequent_kernel::log::SequencePolicy;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the command and event logs.
    pub data_dir: PathBuf,
    pub command_log: String,
    pub event_log: String,
    /// Initial size of a freshly created log file, in bytes.
    pub region_capacity: usize,
    /// Source id of commands submitted to this node.
    pub input_id: i32,
    /// Commands that may wait in the submission channel.
    pub channel_capacity: usize,
    /// Most commands sequenced from the channel in one cycle.
    pub input_batch: usize,
    pub idle: IdleConfig,
    pub failure_policy: FailurePolicy,
    pub sequence_policy: SequencePolicy,
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            command_log: "commands.log".into(),
            event_log: "events.log".into(),
            region_capacity: DEFAULT_REGION_CAPACITY,
            input_id: 1,
            channel_capacity: 1024,
            input_batch: 64,
            idle: IdleConfig::default(),
            failure_policy: FailurePolicy::default(),
            sequence_policy: SequencePolicy::default(),
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            auth_token: None,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.input_id <= ADMIN_SOURCE {
            return Err(ConfigError::ReservedInput(self.input_id));
        }
        if self.command_log == self.event_log {
            return Err(ConfigError::SharedLog);
        }
        if self.region_capacity == 0 {
            return Err(ConfigError::Invalid("region_capacity must be positive".into()));
        }
        if self.channel_capacity == 0 || self.input_batch == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity and input_batch must be positive".into(),
            ));
        }
        if let FailurePolicy::Retry { max_attempts: 0 } = self.failure_policy {
            return Err(ConfigError::Invalid("retry policy needs at least one attempt".into()));
        }
        Ok(())
    }

    pub fn command_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.command_log)
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.event_log)
    }
}
