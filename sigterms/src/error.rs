//! Error types for significant terms reduction and transport

use thiserror::Error;

/// A wire payload could not be decoded.
///
/// `field` names the part of the layout that was being read when decoding
/// stopped, so a corrupt partial can be traced back to the offending value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Decode error in '{field}': {reason}")]
pub struct DecodeError {
    pub field: &'static str,
    pub reason: String,
}

impl DecodeError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn truncated(field: &'static str, needed: usize, remaining: usize) -> Self {
        Self::new(
            field,
            format!("truncated buffer: need {} bytes, {} remaining", needed, remaining),
        )
    }
}

/// A partial result cannot be represented on the wire, e.g. a term longer
/// than the decoder accepts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Encode error in '{field}': {reason}")]
pub struct EncodeError {
    pub field: &'static str,
    pub reason: String,
}

impl EncodeError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Count overflow while merging '{field}'")]
    CountOverflow { field: &'static str },

    #[error("Configuration mismatch on '{field}': expected {expected}, found {found}")]
    ConfigMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("Cannot reduce an empty list of partial results")]
    EmptyReduce,

    #[error("Sub-aggregation error: {0}")]
    SubAggregation(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Decode(_) => "decode",
            Error::Encode(_) => "encode",
            Error::CountOverflow { .. } => "count_overflow",
            Error::ConfigMismatch { .. } => "config_mismatch",
            Error::EmptyReduce => "empty_reduce",
            Error::SubAggregation(_) => "sub_aggregation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::TomlDe(_) | Error::TomlSer(_) => "toml",
            Error::Json(_) => "json",
        }
    }

    pub(crate) fn mismatch(
        field: &'static str,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::ConfigMismatch {
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
