//! # Traversal Error Types
//!
//! Structured error handling for the actor coordination core. Every handler
//! failure is fatal to the running job: the actor that observes it reports the
//! error to the actor system, which terminates all actors and hands the first
//! recorded error back to the job caller.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraversalError {
    #[error("Protocol error: {actor} cannot handle {message}")]
    Protocol { actor: String, message: String },

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Pipeline error at step {step_id}: {message}")]
    Pipeline { step_id: String, message: String },

    #[error("Barrier consistency error: step {step_id} is not a known barrier")]
    BarrierConsistency { step_id: String },

    #[error("Host error: {0}")]
    Host(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TraversalError {
    /// Create a protocol error for a message the receiving actor does not define
    pub fn protocol(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            actor: actor.into(),
            message: message.into(),
        }
    }

    /// Create a routing error
    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing(message.into())
    }

    /// Create a pipeline error attributed to a step
    pub fn pipeline(step_id: impl ToString, message: impl Into<String>) -> Self {
        Self::Pipeline {
            step_id: step_id.to_string(),
            message: message.into(),
        }
    }

    /// Create a barrier consistency error
    pub fn barrier_consistency(step_id: impl ToString) -> Self {
        Self::BarrierConsistency {
            step_id: step_id.to_string(),
        }
    }

    /// Create a host (actor system) error
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short category label used in structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Protocol { .. } => "protocol",
            Self::Routing(_) => "routing",
            Self::Pipeline { .. } => "pipeline",
            Self::BarrierConsistency { .. } => "barrier_consistency",
            Self::Host(_) => "host",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for TraversalError {
    fn from(error: serde_json::Error) -> Self {
        TraversalError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for TraversalError {
    fn from(error: config::ConfigError) -> Self {
        TraversalError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TraversalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TraversalError::protocol("master", "Start");
        assert_eq!(error.to_string(), "Protocol error: master cannot handle Start");

        let error = TraversalError::barrier_consistency("count@2");
        assert_eq!(
            error.to_string(),
            "Barrier consistency error: step count@2 is not a known barrier"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(TraversalError::routing("x").category(), "routing");
        assert_eq!(TraversalError::pipeline("out@1", "x").category(), "pipeline");
        assert_eq!(TraversalError::host("x").category(), "host");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: TraversalError = parse_error.into();
        assert!(matches!(error, TraversalError::Serialization(_)));
    }
}
