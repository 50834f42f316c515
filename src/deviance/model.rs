//! Null-model count deviance for feature selection.
//!
//! Each gene is compared against a null model in which its share of every sample's total
//! counts is constant. Binomial deviance is the default; Poisson is available as the
//! large-count approximation. When a batch factor is given, the matrix is split by batch
//! level, each level is fitted with its own size factors, and the per-level deviances are
//! summed, so expression shifts between batches no longer count as deviation.

use anyhow::{anyhow, bail};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::deviance::{DevianceFamily, DevianceModel};
use crate::input::BatchFactor;

/// Default [`DevianceModel`]: binomial or Poisson null-residual deviance per gene.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountDeviance;

impl CountDeviance {
    pub fn new() -> Self {
        CountDeviance
    }
}

impl DevianceModel for CountDeviance {
    fn compute_deviance(
        &self,
        counts: ArrayView2<'_, f64>,
        family: DevianceFamily,
        batch: Option<&BatchFactor>,
    ) -> anyhow::Result<Array1<f64>> {
        validate_counts(counts)?;

        let Some(batch) = batch else {
            return Ok(null_deviance(counts, family));
        };

        if batch.len() != counts.ncols() {
            bail!(
                "batch factor has {} entries but counts have {} samples",
                batch.len(),
                counts.ncols()
            );
        }

        let mut total = Array1::<f64>::zeros(counts.nrows());
        for level_idx in 0..batch.n_levels() {
            let samples = batch.sample_indices(level_idx);
            let level_counts = counts.select(Axis(1), &samples);
            total += &null_deviance(level_counts.view(), family);
        }
        Ok(total)
    }
}

fn validate_counts(counts: ArrayView2<'_, f64>) -> anyhow::Result<()> {
    for (gene_idx, row) in counts.outer_iter().enumerate() {
        if let Some(&bad) = row.iter().find(|&&x| !x.is_finite() || x < 0.0) {
            return Err(anyhow!(
                "counts must be finite and non-negative, found {} in gene row {}",
                bad,
                gene_idx
            ));
        }
    }
    Ok(())
}

/// Deviance of every gene against the constant-proportion null model.
fn null_deviance(counts: ArrayView2<'_, f64>, family: DevianceFamily) -> Array1<f64> {
    let size_factors = counts.sum_axis(Axis(0));
    let total = size_factors.sum();

    let deviances: Vec<f64> = (0..counts.nrows())
        .into_par_iter()
        .map(|gene_idx| {
            let row = counts.row(gene_idx);
            let p = if total > 0.0 { row.sum() / total } else { 0.0 };
            match family {
                DevianceFamily::Binomial => binomial_deviance(row, p, size_factors.view()),
                DevianceFamily::Poisson => poisson_deviance(row, p, size_factors.view()),
            }
        })
        .collect();

    Array1::from(deviances)
}

/// `2 Σ [x ln(x / np) + (n - x) ln((n - x) / n(1 - p))]`, zero-count terms contribute nothing.
fn binomial_deviance(x: ArrayView1<'_, f64>, p: f64, size_factors: ArrayView1<'_, f64>) -> f64 {
    let mut term = 0.0;
    for (&x, &n) in x.iter().zip(size_factors.iter()) {
        if x > 0.0 {
            term += x * (x / (n * p)).ln();
        }
        let nx = n - x;
        if nx > 0.0 {
            term += nx * (nx / (n * (1.0 - p))).ln();
        }
    }
    2.0 * term
}

fn poisson_deviance(x: ArrayView1<'_, f64>, p: f64, size_factors: ArrayView1<'_, f64>) -> f64 {
    let mut term = 0.0;
    for (&x, &n) in x.iter().zip(size_factors.iter()) {
        let mu = n * p;
        if x > 0.0 {
            term += x * (x / mu).ln();
        }
        term -= x - mu;
    }
    2.0 * term
}
