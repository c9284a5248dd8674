//! # Configuration
//!
//! Typed configuration for the actor system and traversal jobs.
//!
//! ## Sources
//!
//! [`ConfigManager`] layers, lowest precedence first:
//!
//! 1. Built-in defaults ([`ActorsConfig::default`])
//! 2. An optional TOML file
//! 3. `TRAVERSAL_*` environment variables, with `__` between nested keys
//!    (`TRAVERSAL_MAILBOX__BATCH_SIZE=8`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use traversal_actors::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().mailbox.batch_size;
//! let timeout = manager.config().job.timeout();
//! # Ok(())
//! # }
//! ```

pub mod loader;

pub use loader::ConfigManager;

use crate::constants::system;
use crate::error::{Result, TraversalError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorsConfig {
    pub system_name: String,
    pub master_location: String,
    /// Worker addresses are this prefix followed by a hash of the partition id
    pub worker_prefix: String,
    pub mailbox: MailboxConfig,
    pub job: JobConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Most envelopes an actor takes from its mailbox per wakeup
    pub batch_size: usize,
    /// Sort each batch by the actor program's message priorities
    pub priorities_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Upper bound on a job's run time; unbounded when absent
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; the environment decides when absent
    pub level: Option<String>,
    pub json: bool,
}

impl Default for ActorsConfig {
    fn default() -> Self {
        Self {
            system_name: system::DEFAULT_SYSTEM_NAME.to_string(),
            master_location: system::DEFAULT_MASTER_LOCATION.to_string(),
            worker_prefix: system::DEFAULT_WORKER_PREFIX.to_string(),
            mailbox: MailboxConfig::default(),
            job: JobConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            batch_size: system::DEFAULT_MAILBOX_BATCH_SIZE,
            priorities_enabled: true,
        }
    }
}

impl JobConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl ActorsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.system_name.trim().is_empty() {
            return Err(TraversalError::configuration("system_name must not be empty"));
        }
        if self.master_location.trim().is_empty() {
            return Err(TraversalError::configuration(
                "master_location must not be empty",
            ));
        }
        if self.worker_prefix.is_empty() {
            return Err(TraversalError::configuration("worker_prefix must not be empty"));
        }
        if self.master_location.starts_with(&self.worker_prefix) {
            return Err(TraversalError::configuration(format!(
                "master_location '{}' collides with worker_prefix '{}'",
                self.master_location, self.worker_prefix
            )));
        }
        if self.mailbox.batch_size == 0 {
            return Err(TraversalError::configuration(
                "mailbox.batch_size must be greater than 0",
            ));
        }
        if self.job.timeout_ms == Some(0) {
            return Err(TraversalError::configuration(
                "job.timeout_ms must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ActorsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mailbox.batch_size, 64);
        assert!(config.mailbox.priorities_enabled);
        assert_eq!(config.job.timeout(), None);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ActorsConfig::default();
        config.mailbox.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(TraversalError::Configuration(_))
        ));

        let mut config = ActorsConfig::default();
        config.master_location = "worker-master".to_string();
        assert!(config.validate().is_err());

        let mut config = ActorsConfig::default();
        config.job.timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ActorsConfig =
            serde_json::from_str(r#"{"mailbox": {"batch_size": 8}, "job": {"timeout_ms": 500}}"#)
                .unwrap();
        assert_eq!(config.mailbox.batch_size, 8);
        assert!(config.mailbox.priorities_enabled);
        assert_eq!(config.job.timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.worker_prefix, "worker-");
    }
}
