//! Agent configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all) is
//! enough to build a config.

use std::time::Duration;

use serde::Deserialize;
use tonic::Code;

use crate::error::HarnessError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub app_name: String,
    /// Apdex threshold in seconds
    pub apdex_t: f64,
    pub distributed_tracing: DistributedTracingConfig,
    pub error_collector: ErrorCollectorConfig,
    pub grpc: GrpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributedTracingConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorCollectorConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    pub record_errors: bool,
    /// Status codes that never produce a traced error
    pub ignore_status_codes: Vec<i32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: "grpc-harness".to_string(),
            apdex_t: 0.1,
            distributed_tracing: DistributedTracingConfig::default(),
            error_collector: ErrorCollectorConfig::default(),
            grpc: GrpcConfig::default(),
        }
    }
}

impl Default for DistributedTracingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ErrorCollectorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            record_errors: true,
            ignore_status_codes: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HarnessError::ConfigurationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if !self.apdex_t.is_finite() || self.apdex_t <= 0.0 {
            return Err(HarnessError::ConfigurationError(format!(
                "apdex_t must be a positive number of seconds, got {}",
                self.apdex_t
            )));
        }
        Ok(())
    }

    pub fn with_distributed_tracing(mut self, enabled: bool) -> Self {
        self.distributed_tracing.enabled = enabled;
        self
    }

    pub fn with_error_collector(mut self, enabled: bool) -> Self {
        self.error_collector.enabled = enabled;
        self
    }

    pub fn with_grpc_record_errors(mut self, enabled: bool) -> Self {
        self.grpc.record_errors = enabled;
        self
    }

    pub fn with_ignored_status_codes(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.grpc.ignore_status_codes = codes.into_iter().map(i32::from).collect();
        self
    }

    pub fn apdex_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.apdex_t)
    }

    /// Whether a call that ended with `code` should produce a traced error
    pub fn should_record_error(&self, code: Code) -> bool {
        code != Code::Ok
            && self.error_collector.enabled
            && self.grpc.record_errors
            && !self.grpc.ignore_status_codes.contains(&i32::from(code))
    }
}
