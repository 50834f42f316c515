//! Validation of the workflow arguments and restriction to the variable-gene set.

use std::collections::{HashMap, HashSet};

use ndarray::Array2;
use tracing::{debug, warn};

use crate::error::{BiasError, Result};
use crate::input::{
    COUNTS_ASSAY, CountsLayer, ExpressionContainer, GENE_ID_FIELD, GENE_NAME_FIELD,
};

/// Categorical batch covariate aligned to samples.
///
/// Levels are sorted lexicographically; `codes[j]` is the level index of sample `j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFactor {
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl BatchFactor {
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let mut levels: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
        levels.sort();
        levels.dedup();

        let level_index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(code, level)| (level.as_str(), code))
            .collect();
        // every value is one of the levels
        let codes = values.iter().map(|v| level_index[v.as_ref()]).collect();

        BatchFactor { levels, codes }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Sample indices belonging to the level at `level_idx`.
    pub fn sample_indices(&self, level_idx: usize) -> Vec<usize> {
        self.codes
            .iter()
            .enumerate()
            .filter_map(|(j, &code)| if code == level_idx { Some(j) } else { None })
            .collect()
    }
}

/// The gene/sample universe shared by both deviance runs.
#[derive(Debug, Clone)]
pub struct FilteredInput {
    pub gene_ids: Vec<String>,
    pub gene_names: Vec<String>,
    /// Dense counts, retained genes × samples.
    pub counts: Array2<f64>,
    pub batch: BatchFactor,
}

impl FilteredInput {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }
}

/// Validate `input` against the workflow's requirements and restrict it to `vgs`.
///
/// Argument problems are reported as [`BiasError::Configuration`] before the counts layer is
/// read; container problems as [`BiasError::Shape`]. Retained genes keep their input order.
pub fn prepare_input<C, S>(input: &C, batch_effect: &str, vgs: &[S]) -> Result<FilteredInput>
where
    C: ExpressionContainer,
    S: AsRef<str>,
{
    if batch_effect.trim().is_empty() {
        return Err(BiasError::Configuration(
            "batch_effect must name a sample metadata field".to_string(),
        ));
    }
    if vgs.is_empty() {
        return Err(BiasError::Configuration(
            "variable gene set must not be empty".to_string(),
        ));
    }

    let col_data = input.col_data();
    let batch_values = col_data.field(batch_effect).ok_or_else(|| {
        BiasError::Configuration(format!(
            "batch_effect `{}` is not a sample metadata field (available: [{}])",
            batch_effect,
            col_data.field_names().join(", ")
        ))
    })?;

    let counts = input.assay(COUNTS_ASSAY).ok_or_else(|| {
        BiasError::Shape(format!("input has no `{}` assay", COUNTS_ASSAY))
    })?;
    let n_genes = counts.n_genes();
    let n_samples = counts.n_samples();

    if !col_data.is_rectangular() {
        return Err(BiasError::Shape(
            "sample metadata fields have differing lengths".to_string(),
        ));
    }
    if batch_values.len() != n_samples {
        return Err(BiasError::Shape(format!(
            "sample metadata has {} rows but counts have {} columns",
            batch_values.len(),
            n_samples
        )));
    }

    let row_data = input.row_data();
    if !row_data.is_rectangular() {
        return Err(BiasError::Shape(
            "gene metadata fields have differing lengths".to_string(),
        ));
    }
    let gene_ids = row_data.field(GENE_ID_FIELD).ok_or_else(|| {
        BiasError::Shape(format!("gene metadata has no `{}` field", GENE_ID_FIELD))
    })?;
    let gene_names = row_data.field(GENE_NAME_FIELD).ok_or_else(|| {
        BiasError::Shape(format!("gene metadata has no `{}` field", GENE_NAME_FIELD))
    })?;
    if gene_ids.len() != n_genes {
        return Err(BiasError::Shape(format!(
            "gene metadata has {} rows but counts have {} rows",
            gene_ids.len(),
            n_genes
        )));
    }

    let mut seen = HashSet::with_capacity(gene_ids.len());
    if let Some(duplicate) = gene_ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(BiasError::Shape(format!(
            "gene_id `{}` occurs more than once",
            duplicate
        )));
    }

    let wanted: HashSet<&str> = vgs.iter().map(AsRef::as_ref).collect();
    let keep: Vec<usize> = gene_ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| if wanted.contains(id.as_str()) { Some(i) } else { None })
        .collect();

    debug!(
        requested = wanted.len(),
        matched = keep.len(),
        samples = n_samples,
        "restricted input to variable genes"
    );

    let batch = BatchFactor::from_values(batch_values);
    if batch.n_levels() < 2 {
        warn!(
            batch_effect,
            levels = batch.n_levels(),
            "batch covariate has fewer than two levels; batch modelling has no effect"
        );
    }

    Ok(FilteredInput {
        gene_ids: keep.iter().map(|&i| gene_ids[i].clone()).collect(),
        gene_names: keep.iter().map(|&i| gene_names[i].clone()).collect(),
        counts: counts.dense_rows(&keep),
        batch,
    })
}
