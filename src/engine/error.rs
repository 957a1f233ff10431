// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference error types for the monoinfer core.
//!
//! All errors are fail-closed: invalid inputs are rejected, never truncated,
//! and no fallback output is produced in place of a failure.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a model or running a prediction.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Model file not found or unreadable: {0}")]
    NotFound(PathBuf),

    #[error("Model parse error: {0}")]
    Parse(String),

    #[error("Unsupported operator '{op}' in node '{node}'")]
    UnsupportedOperator { op: String, node: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("No model loaded")]
    NotLoaded,

    #[error("Inference failed: {0}")]
    InferenceFailure(String),
}

/// Fieldless projection of [`InferenceError`], stable across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidShape,
    NotFound,
    ParseError,
    UnsupportedOperator,
    ShapeMismatch,
    NotLoaded,
    InferenceFailure,
}

impl ErrorKind {
    /// Short snake_case label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidShape => "invalid_shape",
            Self::NotFound => "not_found",
            Self::ParseError => "parse_error",
            Self::UnsupportedOperator => "unsupported_operator",
            Self::ShapeMismatch => "shape_mismatch",
            Self::NotLoaded => "not_loaded",
            Self::InferenceFailure => "inference_failure",
        }
    }
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidShape(_) => ErrorKind::InvalidShape,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::UnsupportedOperator { .. } => ErrorKind::UnsupportedOperator,
            Self::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            Self::NotLoaded => ErrorKind::NotLoaded,
            Self::InferenceFailure(_) => ErrorKind::InferenceFailure,
        }
    }

    /// Returns true if this error is caused by the caller rather than the model.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidShape(_) | Self::NotLoaded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        assert_eq!(
            InferenceError::Parse("x".into()).kind(),
            ErrorKind::ParseError
        );
        assert_eq!(
            InferenceError::UnsupportedOperator {
                op: "Lstm".into(),
                node: "n0".into()
            }
            .kind(),
            ErrorKind::UnsupportedOperator
        );
        assert_eq!(InferenceError::NotLoaded.kind(), ErrorKind::NotLoaded);
    }

    #[test]
    fn test_display_names_operator_and_node() {
        let err = InferenceError::UnsupportedOperator {
            op: "Lstm".into(),
            node: "rnn".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Lstm"));
        assert!(msg.contains("rnn"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(InferenceError::NotLoaded.is_caller_error());
        assert!(InferenceError::InvalidArgument("len".into()).is_caller_error());
        assert!(!InferenceError::InferenceFailure("nan".into()).is_caller_error());
    }
}
