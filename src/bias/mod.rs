//! Batch-bias scores for deviance-based feature selection.
//!
//! A deviance model is run twice over the same variable genes: once ignoring the batch
//! covariate and once modelling it. Genes whose deviance or rank changes unusually much
//! between the two runs owe part of their apparent importance to the batch rather than to
//! biology. The change is summarized per gene as:
//!
//! - `d_diff = (dev_default - dev_batch) / dev_batch` and its z-score `nsd_dev`
//! - `r_diff = rank_batch - rank_default` and its z-score `nsd_rank`
//!
//! ## Example
//!
//! ```rust,no_run
//! use ndarray::Array2;
//! use single_featurebias::{Experiment, feature_select};
//!
//! # fn load() -> Experiment<Array2<f64>> { unimplemented!() }
//! let experiment = load();
//! let variable_genes = ["ENSG00000141510", "ENSG00000171862"];
//! let result = feature_select(&experiment, "slide", &variable_genes)?;
//! for row in result.flagged(5.0, 5.0) {
//!     println!("{} ({}): nSD_dev = {:.2}", row.gene, row.gene_name, row.nsd_dev);
//! }
//! # Ok::<(), single_featurebias::BiasError>(())
//! ```

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::deviance::{
    CountDeviance, DevianceFamily, DevianceModel, GeneDeviance, run_deviance,
};
use crate::error::{BiasError, DevianceRun, Result};
use crate::input::{ExpressionContainer, prepare_input};

pub mod merge;
pub mod stats;

pub use merge::DegeneracyWarning;

/// What to do when the joined table cannot be standardized cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegeneracyPolicy {
    /// Log a warning, record it on the result and keep the non-finite values.
    #[default]
    Propagate,
    /// Fail with [`BiasError::Degenerate`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct FeatureSelectOptions {
    /// Likelihood family passed to the deviance model
    pub family: DevianceFamily,
    /// Run the default and batch deviance computations concurrently
    pub parallel_runs: bool,
    pub degeneracy: DegeneracyPolicy,
    /// `|dev_batch|` at or below this value counts as a zero denominator
    pub zero_tolerance: f64,
}

impl Default for FeatureSelectOptions {
    fn default() -> Self {
        FeatureSelectOptions {
            family: DevianceFamily::Binomial,
            parallel_runs: true,
            degeneracy: DegeneracyPolicy::Propagate,
            zero_tolerance: 0.0,
        }
    }
}

impl FeatureSelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family: DevianceFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_parallel_runs(mut self, parallel_runs: bool) -> Self {
        self.parallel_runs = parallel_runs;
        self
    }

    pub fn with_degeneracy(mut self, policy: DegeneracyPolicy) -> Self {
        self.degeneracy = policy;
        self
    }

    pub fn with_zero_tolerance(mut self, tolerance: f64) -> Self {
        self.zero_tolerance = tolerance;
        self
    }
}

/// One gene present in both deviance runs.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasRow {
    pub gene: String,
    pub gene_name: String,
    pub dev_default: f64,
    pub rank_default: usize,
    pub dev_batch: f64,
    pub rank_batch: usize,
    /// `(dev_default - dev_batch) / dev_batch`
    pub d_diff: f64,
    pub nsd_dev: f64,
    /// `rank_batch - rank_default`
    pub r_diff: i64,
    pub nsd_rank: f64,
}

impl BiasRow {
    /// Differences between the two runs, z-scores unset (`NaN`).
    pub fn from_runs(default: &GeneDeviance, batch: &GeneDeviance) -> Self {
        BiasRow {
            gene: default.gene.clone(),
            gene_name: default.gene_name.clone(),
            dev_default: default.deviance,
            rank_default: default.rank,
            dev_batch: batch.deviance,
            rank_batch: batch.rank,
            d_diff: (default.deviance - batch.deviance) / batch.deviance,
            nsd_dev: f64::NAN,
            r_diff: batch.rank as i64 - default.rank as i64,
            nsd_rank: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BiasResult {
    /// Sorted by `(gene, gene_name)`
    pub rows: Vec<BiasRow>,
    pub warnings: Vec<DegeneracyWarning>,
}

impl BiasResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn row(&self, gene: &str) -> Option<&BiasRow> {
        self.rows.iter().find(|row| row.gene == gene)
    }

    pub fn genes(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.gene.as_str()).collect()
    }

    /// Rows whose deviance or rank z-score reaches its cutoff.
    pub fn flagged(&self, dev_cutoff: f64, rank_cutoff: f64) -> Vec<&BiasRow> {
        self.rows
            .iter()
            .filter(|row| row.nsd_dev >= dev_cutoff || row.nsd_rank >= rank_cutoff)
            .collect()
    }

    /// The `n` rows with the largest finite `nsd_dev`, largest first.
    pub fn top_by_nsd_dev(&self, n: usize) -> Vec<&BiasRow> {
        let mut rows: Vec<&BiasRow> = self
            .rows
            .iter()
            .filter(|row| row.nsd_dev.is_finite())
            .collect();
        rows.sort_by(|a, b| b.nsd_dev.partial_cmp(&a.nsd_dev).unwrap_or(Ordering::Equal));
        rows.truncate(n);
        rows
    }
}

/// Compute batch-bias scores with the default binomial [`CountDeviance`] model.
///
/// # Arguments
///
/// * `input` - Expression container with a `counts` assay, `gene_id`/`gene_name` gene metadata
///   and sample metadata
/// * `batch_effect` - Name of the sample metadata field holding the batch covariate
/// * `vgs` - Variable gene ids to restrict the analysis to
///
/// # Returns
///
/// One row per gene present in both runs, or the first error encountered.
pub fn feature_select<C, S>(input: &C, batch_effect: &str, vgs: &[S]) -> Result<BiasResult>
where
    C: ExpressionContainer,
    S: AsRef<str>,
{
    feature_select_with(
        input,
        batch_effect,
        vgs,
        &CountDeviance::new(),
        &FeatureSelectOptions::default(),
    )
}

/// Compute batch-bias scores with a caller-supplied deviance model and options.
pub fn feature_select_with<C, S, M>(
    input: &C,
    batch_effect: &str,
    vgs: &[S],
    model: &M,
    options: &FeatureSelectOptions,
) -> Result<BiasResult>
where
    C: ExpressionContainer,
    S: AsRef<str>,
    M: DevianceModel + ?Sized,
{
    let filtered = prepare_input(input, batch_effect, vgs)?;

    let (default_run, batch_run) = if options.parallel_runs {
        rayon::join(
            || run_deviance(model, &filtered, options.family, DevianceRun::Default),
            || run_deviance(model, &filtered, options.family, DevianceRun::Batch),
        )
    } else {
        (
            run_deviance(model, &filtered, options.family, DevianceRun::Default),
            run_deviance(model, &filtered, options.family, DevianceRun::Batch),
        )
    };
    let default_run = default_run?;
    let batch_run = batch_run?;

    let mut rows = merge::merge_runs(&default_run, &batch_run);
    debug!(
        default = default_run.len(),
        batch = batch_run.len(),
        joined = rows.len(),
        "joined deviance runs"
    );

    let warnings = merge::detect_degeneracy(&rows, options.zero_tolerance);
    for warning in &warnings {
        warn!(%warning, "degenerate bias statistics");
    }
    if options.degeneracy == DegeneracyPolicy::Reject {
        if let Some(first) = warnings.first() {
            return Err(BiasError::Degenerate(first.to_string()));
        }
    }

    merge::standardize(&mut rows);

    Ok(BiasResult { rows, warnings })
}
