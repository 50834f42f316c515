//! Per-gene deviance runs.
//!
//! The deviance model is an external collaborator reached through [`DevianceModel`]: given a
//! genes × samples counts matrix and an optional batch factor, it returns one deviance value
//! per gene. [`model::CountDeviance`] is the default implementation. [`run_deviance`] invokes a
//! model for one run and attaches gene identities and ranks.

use ndarray::{Array1, ArrayView2};
use tracing::debug;

use crate::error::{BiasError, DevianceRun, Result};
use crate::input::{BatchFactor, FilteredInput};

pub mod model;
pub mod rank;

pub use model::CountDeviance;
pub use rank::descending_ranks;

/// Likelihood family of the null model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevianceFamily {
    #[default]
    Binomial,
    Poisson,
}

/// A per-gene deviance routine.
pub trait DevianceModel: Sync {
    /// Compute one deviance value per row of `counts`.
    ///
    /// When `batch` is given it is aligned to the columns of `counts` and must be modelled.
    fn compute_deviance(
        &self,
        counts: ArrayView2<'_, f64>,
        family: DevianceFamily,
        batch: Option<&BatchFactor>,
    ) -> anyhow::Result<Array1<f64>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneDeviance {
    pub gene: String,
    pub gene_name: String,
    pub deviance: f64,
    /// 1 = highest deviance in the run
    pub rank: usize,
}

/// Deviance and rank of every retained gene for one run.
#[derive(Debug, Clone)]
pub struct PerGeneDeviance {
    pub run: DevianceRun,
    pub entries: Vec<GeneDeviance>,
}

impl PerGeneDeviance {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, gene: &str) -> Option<&GeneDeviance> {
        self.entries.iter().find(|entry| entry.gene == gene)
    }
}

/// Run `model` over the filtered input, with the batch factor only for [`DevianceRun::Batch`].
///
/// Any model failure aborts the run and is returned as [`BiasError::Computation`].
pub fn run_deviance<M>(
    model: &M,
    input: &FilteredInput,
    family: DevianceFamily,
    run: DevianceRun,
) -> Result<PerGeneDeviance>
where
    M: DevianceModel + ?Sized,
{
    let batch = match run {
        DevianceRun::Default => None,
        DevianceRun::Batch => Some(&input.batch),
    };

    let deviances = model
        .compute_deviance(input.counts.view(), family, batch)
        .map_err(|source| BiasError::Computation { run, source })?;

    if deviances.len() != input.n_genes() {
        return Err(BiasError::Computation {
            run,
            source: anyhow::anyhow!(
                "model returned {} deviance values for {} genes",
                deviances.len(),
                input.n_genes()
            ),
        });
    }

    let deviances = deviances.to_vec();
    let ranks = descending_ranks(&deviances);

    let entries = input
        .gene_ids
        .iter()
        .zip(&input.gene_names)
        .zip(deviances.iter().zip(ranks))
        .map(|((gene, gene_name), (&deviance, rank))| GeneDeviance {
            gene: gene.clone(),
            gene_name: gene_name.clone(),
            deviance,
            rank,
        })
        .collect::<Vec<_>>();

    debug!(%run, genes = entries.len(), ?family, "deviance run finished");

    Ok(PerGeneDeviance { run, entries })
}
