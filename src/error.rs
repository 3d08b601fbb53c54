//! Error taxonomy for the network core.
//!
//! Numeric routines never recover internally: a shape or label violation
//! aborts the current run and is surfaced to the caller immediately.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Incompatible array dimensions between layers, filters, or inputs.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A class label outside the [0, classes) range.
    #[error("label {label} outside class range 0..{classes}")]
    LabelOutOfRange { label: usize, classes: usize },

    /// Malformed or missing configuration at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("could not read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn shape(
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Error::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}
