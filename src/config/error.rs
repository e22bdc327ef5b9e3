//! Configuration Error Types
//!
//! Errors raised while loading or validating the scheduler, gh-ost and logging
//! configuration. Invalid values are reported, never replaced by fallbacks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The layered sources could not be read or merged
    #[error("Failed to load configuration from '{source_name}': {error}")]
    LoadError { source_name: String, error: String },

    /// The merged configuration does not match the expected structure
    #[error("Failed to deserialize configuration: {error}")]
    DeserializeError { error: String },

    /// A field holds a value outside its allowed range
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    /// Create a load error
    pub fn load_error<S: Into<String>, E: std::fmt::Display>(source_name: S, error: E) -> Self {
        Self::LoadError {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    /// Create a deserialize error
    pub fn deserialize_error<E: std::fmt::Display>(error: E) -> Self {
        Self::DeserializeError {
            error: error.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: ToString, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
