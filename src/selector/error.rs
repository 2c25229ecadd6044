// SPDX-License-Identifier: MIT

//! Error types for device selection
//!
//! Compilation problems are a [`CompileError`] tagged with an [`ErrorKind`].
//! Problems while matching one device are a [`MatchError`]; they say nothing
//! about other devices and never invalidate the compiled expression.

use std::fmt;
use thiserror::Error;

use crate::expr::{EvalDetails, EvalError};

/// Who is at fault for a compilation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The expression is malformed or has the wrong result type
    Invalid,
    /// The environment or program construction failed
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Invalid => write!(f, "Invalid value"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// A failed compilation
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{detail}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub detail: String,
    pub expression: String,
}

impl CompileError {
    pub fn invalid(expression: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Invalid,
            detail: detail.into(),
            expression: expression.into(),
        }
    }

    pub fn internal(expression: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            detail: detail.into(),
            expression: expression.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

/// Why a device attribute could not be turned into a value
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttributeError {
    #[error("unsupported attribute value")]
    Unsupported,

    #[error("parse semantic version: {0}")]
    Version(String),
}

/// Errors from matching one device
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatchError {
    /// The expression never compiled, so nothing was evaluated
    #[error("expression is not usable: {0}")]
    Compile(#[from] CompileError),

    /// One of the device's attributes is malformed
    #[error("attribute {name}: {source}")]
    Attribute {
        name: String,
        #[source]
        source: AttributeError,
    },

    /// Evaluation failed or was interrupted
    #[error("{source}")]
    Eval {
        #[source]
        source: EvalError,
        details: EvalDetails,
    },

    /// The expression produced something other than a bool
    #[error("result of type {type_name} could not be converted to bool")]
    NotBool {
        type_name: String,
        details: EvalDetails,
    },
}

impl MatchError {
    /// Evaluation bookkeeping, when the evaluation got that far
    pub fn details(&self) -> Option<EvalDetails> {
        match self {
            MatchError::Eval { details, .. } | MatchError::NotBool { details, .. } => {
                Some(*details)
            }
            MatchError::Compile(_) | MatchError::Attribute { .. } => None,
        }
    }

    /// True when the cost limit, a cancellation or a deadline stopped evaluation
    pub fn is_interruption(&self) -> bool {
        matches!(self, MatchError::Eval { source, .. } if source.is_interruption())
    }
}

/// Errors from the configuration and file loading surfaces
#[derive(Debug, Error)]
pub enum SelectorError {
    /// Configuration errors (bad environment variables or flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Device file with an extension we cannot parse
    #[error("Unsupported device file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SelectorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
