//! Error types for the bias-detection workflow.

use std::fmt;

use thiserror::Error;

/// Which of the two deviance runs an error or result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevianceRun {
    /// Batch covariate ignored.
    Default,
    /// Batch covariate modelled.
    Batch,
}

impl fmt::Display for DevianceRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevianceRun::Default => write!(f, "default"),
            DevianceRun::Batch => write!(f, "batch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BiasError {
    /// Invalid or missing arguments (batch field, variable genes).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input container lacks a required layer or its dimensions disagree.
    #[error("shape error: {0}")]
    Shape(String),

    /// The deviance model failed; the model's error is kept as the source.
    #[error("deviance computation failed in the {run} run: {source}")]
    Computation {
        run: DevianceRun,
        #[source]
        source: anyhow::Error,
    },

    /// Raised only under `DegeneracyPolicy::Reject`.
    #[error("statistical degeneracy: {0}")]
    Degenerate(String),
}

pub type Result<T> = std::result::Result<T, BiasError>;
