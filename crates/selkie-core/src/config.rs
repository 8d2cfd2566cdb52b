//! Configuration for the Selkie syncer
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one syncer instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Interval between background reconciliation passes (milliseconds)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,

    /// Discovery agent connection configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_sync_interval() -> u64 {
    SYNC_INTERVAL_MS_DEFAULT
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval(),
            agent: AgentConfig::default(),
        }
    }
}

impl SyncerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_ms < SYNC_INTERVAL_MS_MIN {
            return Err(Error::InvalidConfiguration {
                field: "sync_interval_ms".into(),
                reason: format!(
                    "{} below minimum {}",
                    self.sync_interval_ms, SYNC_INTERVAL_MS_MIN
                ),
            });
        }

        if self.sync_interval_ms > SYNC_INTERVAL_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "sync_interval_ms".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.sync_interval_ms, SYNC_INTERVAL_MS_MAX
                ),
            });
        }

        self.agent.validate()?;
        Ok(())
    }

    /// Create config for testing with a short interval
    #[doc(hidden)]
    pub fn for_testing() -> Self {
        Self {
            sync_interval_ms: SYNC_INTERVAL_MS_MIN,
            agent: AgentConfig::default(),
        }
    }
}

/// Discovery agent connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent address (host:port)
    #[serde(default = "default_agent_address")]
    pub address: String,

    /// Request timeout against the agent (milliseconds)
    #[serde(default = "default_agent_timeout")]
    pub timeout_ms: u64,

    /// Fail construction if the agent is unreachable
    ///
    /// When false the syncer starts optimistically and retries on the
    /// next pass.
    #[serde(default)]
    pub require_agent: bool,
}

fn default_agent_address() -> String {
    AGENT_ADDRESS_DEFAULT.to_string()
}

fn default_agent_timeout() -> u64 {
    AGENT_TIMEOUT_MS_DEFAULT
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_agent_address(),
            timeout_ms: default_agent_timeout(),
            require_agent: false,
        }
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::InvalidConfiguration {
                field: "agent.address".into(),
                reason: "cannot be empty".into(),
            });
        }

        if !self.address.contains(':') {
            return Err(Error::InvalidConfiguration {
                field: "agent.address".into(),
                reason: "must be in host:port format".into(),
            });
        }

        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfiguration {
                field: "agent.timeout_ms".into(),
                reason: "must be nonzero".into(),
            });
        }

        Ok(())
    }
}
