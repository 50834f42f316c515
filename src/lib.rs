//! # single-featurebias
//!
//! Batch-bias detection for deviance-based feature selection in single-cell and spatial
//! transcriptomics data, part of the single-rust ecosystem.
//!
//! Feature selection by count deviance ranks genes by how far their expression departs from a
//! constant-proportion null model. When a known technical covariate (tissue slide, donor,
//! processing batch) shifts a gene's expression, that gene can look informative for the wrong
//! reason. This crate runs the deviance model with and without the batch covariate and scores
//! each gene by how much its deviance and rank change.
//!
//! ## Core Features
//!
//! - **Container-agnostic input**: any type implementing [`ExpressionContainer`], with counts
//!   stored as `CsrMatrix` from nalgebra-sparse or a dense `ndarray::Array2`
//! - **Deviance models**: binomial and Poisson null-residual deviance with optional batch
//!   stratification, or a custom [`DevianceModel`]
//! - **Bias scores**: relative deviance difference, rank difference and their z-scores
//!   (`nSD_dev`, `nSD_rank`), plus threshold-based flagging
//!
//! ## Quick Start
//!
//! Build an [`Experiment`] (or implement [`ExpressionContainer`] for your own type), pick the
//! variable genes to test, and call [`feature_select`] with the name of the batch field.
//!
//! ## Module Organization
//!
//! - **[`input`]**: Container interface, metadata tables and validation/subsetting
//! - **[`deviance`]**: Deviance model interface, default model and ranking
//! - **[`bias`]**: Joining the two runs, standardization and the entry points
//! - **[`error`]**: Error type shared by all stages

pub mod bias;
pub mod deviance;
pub mod error;
pub mod input;

pub use bias::{
    BiasResult, BiasRow, DegeneracyPolicy, DegeneracyWarning, FeatureSelectOptions,
    feature_select, feature_select_with,
};
pub use deviance::{CountDeviance, DevianceFamily, DevianceModel};
pub use error::{BiasError, DevianceRun};
pub use input::{CountsLayer, Experiment, ExpressionContainer, MetadataTable};
