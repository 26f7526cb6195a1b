use std::time::Duration;

use thiserror::Error;

/// Core engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("{kind} '{name}' not found")]
    CapabilityNotFound { kind: String, name: String },

    #[error("{kind} does not support action '{action}'")]
    UnsupportedAction { kind: String, action: String },

    #[error("Missing required param: {param}")]
    ParamMissing { param: String },

    #[error("Invalid value for param '{param}': {message}")]
    ParamTypeInvalid { param: String, message: String },

    #[error("No value bound for variable ${name}")]
    VariableUnbound { name: String },

    #[error("No _input provided in workflow params")]
    MissingInput,

    #[error("Workflow produced no output (missing _response var)")]
    NoOutputProduced,

    #[error("Provider error: {provider} - {message}")]
    ProviderFailure { provider: String, message: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::CapabilityNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn unsupported_action(kind: impl Into<String>, action: impl Into<String>) -> Self {
        Self::UnsupportedAction {
            kind: kind.into(),
            action: action.into(),
        }
    }

    pub fn param_missing(param: impl Into<String>) -> Self {
        Self::ParamMissing {
            param: param.into(),
        }
    }

    pub fn param_type(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParamTypeInvalid {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn unbound(name: impl Into<String>) -> Self {
        Self::VariableUnbound { name: name.into() }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
