//! Workflow configuration.
//!
//! Provides the knobs for the content-synthesis workflow: concurrency limits,
//! revision budgets, knowledge lookup thresholds, port timeouts and store
//! retry behaviour.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the workflow orchestrator and its phase pipelines.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    // Execution settings
    /// Maximum number of sections processed concurrently.
    pub max_concurrent_sections: usize,
    /// Timeout applied to every port call.
    pub port_timeout: Duration,

    // Revision budgets
    /// Maximum Writer re-invocations inside the editing revision loop.
    pub max_revisions: u32,
    /// Run-level cap on total revisions per section across editing and the
    /// finalizer re-entry.
    pub max_total_revisions: u32,

    // Knowledge lookup settings
    /// Minimum match count before the researcher widens its query.
    pub min_knowledge_matches: usize,
    /// Maximum matches requested per lookup.
    pub max_knowledge_results: usize,

    // Store retry settings
    /// Initial backoff between artifact write retries; doubles per attempt.
    pub store_retry_backoff: Duration,
    /// Maximum artifact write attempts before the section fails.
    pub store_max_retries: u32,

    // Assessment settings
    /// Assumed reading speed used by the duration-fit assessor.
    pub words_per_minute: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sections: 4,
            port_timeout: Duration::from_secs(60),
            max_revisions: 2,
            max_total_revisions: 4,
            min_knowledge_matches: 2,
            max_knowledge_results: 8,
            store_retry_backoff: Duration::from_millis(250),
            store_max_retries: 3,
            words_per_minute: 130,
        }
    }
}

impl WorkflowConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WORKFLOW_MAX_CONCURRENT_SECTIONS`: concurrent sections (default: 4)
    /// - `WORKFLOW_PORT_TIMEOUT_SECS`: per-call timeout in seconds (default: 60)
    /// - `WORKFLOW_MAX_REVISIONS`: editing revision budget (default: 2)
    /// - `WORKFLOW_MAX_TOTAL_REVISIONS`: run-level revision cap (default: 4)
    /// - `WORKFLOW_MIN_KNOWLEDGE_MATCHES`: widen threshold (default: 2)
    /// - `WORKFLOW_MAX_KNOWLEDGE_RESULTS`: lookup result cap (default: 8)
    /// - `WORKFLOW_STORE_RETRY_BACKOFF_MS`: initial write backoff (default: 250)
    /// - `WORKFLOW_STORE_MAX_RETRIES`: write attempts (default: 3)
    /// - `WORKFLOW_WORDS_PER_MINUTE`: duration heuristic (default: 130)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("WORKFLOW_MAX_CONCURRENT_SECTIONS") {
            config.max_concurrent_sections =
                parse_env_value(&val, "WORKFLOW_MAX_CONCURRENT_SECTIONS")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_PORT_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "WORKFLOW_PORT_TIMEOUT_SECS")?;
            config.port_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("WORKFLOW_MAX_REVISIONS") {
            config.max_revisions = parse_env_value(&val, "WORKFLOW_MAX_REVISIONS")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_MAX_TOTAL_REVISIONS") {
            config.max_total_revisions = parse_env_value(&val, "WORKFLOW_MAX_TOTAL_REVISIONS")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_MIN_KNOWLEDGE_MATCHES") {
            config.min_knowledge_matches = parse_env_value(&val, "WORKFLOW_MIN_KNOWLEDGE_MATCHES")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_MAX_KNOWLEDGE_RESULTS") {
            config.max_knowledge_results = parse_env_value(&val, "WORKFLOW_MAX_KNOWLEDGE_RESULTS")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_STORE_RETRY_BACKOFF_MS") {
            let millis: u64 = parse_env_value(&val, "WORKFLOW_STORE_RETRY_BACKOFF_MS")?;
            config.store_retry_backoff = Duration::from_millis(millis);
        }

        if let Ok(val) = std::env::var("WORKFLOW_STORE_MAX_RETRIES") {
            config.store_max_retries = parse_env_value(&val, "WORKFLOW_STORE_MAX_RETRIES")?;
        }

        if let Ok(val) = std::env::var("WORKFLOW_WORDS_PER_MINUTE") {
            config.words_per_minute = parse_env_value(&val, "WORKFLOW_WORDS_PER_MINUTE")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_sections == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_sections must be greater than 0".to_string(),
            ));
        }

        if self.port_timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "port_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_total_revisions < self.max_revisions {
            return Err(ConfigError::ValidationFailed(
                "max_total_revisions cannot be smaller than max_revisions".to_string(),
            ));
        }

        if self.max_knowledge_results == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_knowledge_results must be greater than 0".to_string(),
            ));
        }

        if self.min_knowledge_matches > self.max_knowledge_results {
            return Err(ConfigError::ValidationFailed(
                "min_knowledge_matches cannot exceed max_knowledge_results".to_string(),
            ));
        }

        if self.store_max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "store_max_retries must be greater than 0".to_string(),
            ));
        }

        if self.words_per_minute == 0 {
            return Err(ConfigError::ValidationFailed(
                "words_per_minute must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the concurrent section cap.
    pub fn with_max_concurrent_sections(mut self, max: usize) -> Self {
        self.max_concurrent_sections = max;
        self
    }

    /// Builder method to set the port call timeout.
    pub fn with_port_timeout(mut self, timeout: Duration) -> Self {
        self.port_timeout = timeout;
        self
    }

    /// Builder method to set the editing revision budget.
    pub fn with_max_revisions(mut self, max: u32) -> Self {
        self.max_revisions = max;
        self
    }

    /// Builder method to set the run-level revision cap.
    pub fn with_max_total_revisions(mut self, max: u32) -> Self {
        self.max_total_revisions = max;
        self
    }

    /// Builder method to set the widen threshold.
    pub fn with_min_knowledge_matches(mut self, min: usize) -> Self {
        self.min_knowledge_matches = min;
        self
    }

    /// Builder method to set the lookup result cap.
    pub fn with_max_knowledge_results(mut self, max: usize) -> Self {
        self.max_knowledge_results = max;
        self
    }

    /// Builder method to set the store retry backoff.
    pub fn with_store_retry_backoff(mut self, backoff: Duration) -> Self {
        self.store_retry_backoff = backoff;
        self
    }

    /// Builder method to set the store retry count.
    pub fn with_store_max_retries(mut self, retries: u32) -> Self {
        self.store_max_retries = retries;
        self
    }

    /// Builder method to set the reading-speed heuristic.
    pub fn with_words_per_minute(mut self, wpm: u32) -> Self {
        self.words_per_minute = wpm;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
