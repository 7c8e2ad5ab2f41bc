//! Runtime configuration for pipeline systems.

use crate::decorators::RoutingStrategy;
use crate::errors::{PipeflowError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix of every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "PIPEFLOW_";

/// Configuration shared by every worker of a [`PipelineSystem`].
///
/// [`PipelineSystem`]: crate::runtime::PipelineSystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bound of every instance mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Number of members in a load-balanced pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Routing policy of load-balanced pools.
    #[serde(default)]
    pub routing: RoutingStrategy,
    /// How long [`EntryPoint::shutdown`](crate::entry::EntryPoint::shutdown)
    /// waits for workers before aborting them.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: f64,
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_pool_size() -> usize {
    4
}

fn default_shutdown_timeout() -> f64 {
    10.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            pool_size: default_pool_size(),
            routing: RoutingStrategy::default(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mailbox capacity.
    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the pool routing policy.
    #[must_use]
    pub fn with_routing(mut self, routing: RoutingStrategy) -> Self {
        self.routing = routing;
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, seconds: f64) -> Self {
        self.shutdown_timeout_seconds = seconds;
        self
    }

    /// Gets the shutdown timeout as a Duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.shutdown_timeout_seconds.max(0.0))
    }

    /// Checks that every bound is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::Config`] for a zero capacity or pool size,
    /// or a negative or non-finite timeout.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(PipeflowError::Config("mailbox_capacity must be at least 1".into()));
        }
        if self.pool_size == 0 {
            return Err(PipeflowError::Config("pool_size must be at least 1".into()));
        }
        if !self.shutdown_timeout_seconds.is_finite() || self.shutdown_timeout_seconds < 0.0 {
            return Err(PipeflowError::Config(format!(
                "shutdown_timeout_seconds must be a non-negative number, got {}",
                self.shutdown_timeout_seconds
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON, or a config error
    /// if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads overrides from `PIPEFLOW_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a config error if a variable cannot be parsed or the result
    /// does not validate.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads overrides through an arbitrary lookup function.
    ///
    /// Recognized keys: `PIPEFLOW_MAILBOX_CAPACITY`, `PIPEFLOW_POOL_SIZE`,
    /// `PIPEFLOW_ROUTING` and `PIPEFLOW_SHUTDOWN_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(raw) = var("MAILBOX_CAPACITY") {
            config.mailbox_capacity = parse_var("MAILBOX_CAPACITY", &raw)?;
        }
        if let Some(raw) = var("POOL_SIZE") {
            config.pool_size = parse_var("POOL_SIZE", &raw)?;
        }
        if let Some(raw) = var("ROUTING") {
            config.routing = raw.parse()?;
        }
        if let Some(raw) = var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipeflowError::Config(format!("{ENV_PREFIX}{name}: cannot parse '{raw}'")))
}
