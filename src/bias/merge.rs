use std::collections::HashMap;
use std::fmt;

use crate::bias::BiasRow;
use crate::bias::stats::{sample_sd, z_scores};
use crate::deviance::{GeneDeviance, PerGeneDeviance};

/// Advisory conditions under which `d_diff` or the z-scores are not finite.
#[derive(Debug, Clone, PartialEq)]
pub enum DegeneracyWarning {
    /// `dev_batch` is zero (within tolerance) for this gene.
    ZeroDenominator { gene: String },
    /// Standard deviation is undefined for fewer than two rows.
    TooFewRows { rows: usize },
    /// A difference column is constant.
    ZeroVariance { column: &'static str },
}

impl fmt::Display for DegeneracyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegeneracyWarning::ZeroDenominator { gene } => {
                write!(f, "dev_batch is zero for gene `{}`, d_diff is not finite", gene)
            }
            DegeneracyWarning::TooFewRows { rows } => write!(
                f,
                "{} joined row(s), standard deviation is undefined and z-scores are not finite",
                rows
            ),
            DegeneracyWarning::ZeroVariance { column } => {
                write!(f, "{} has zero variance, z-scores are not finite", column)
            }
        }
    }
}

/// Inner-join two runs on `(gene, gene_name)` and compute the raw differences.
///
/// Genes present in only one run are dropped. Rows come back sorted by `(gene, gene_name)`;
/// z-score columns are left as `NaN` until [`standardize`] runs.
pub fn merge_runs(default: &PerGeneDeviance, batch: &PerGeneDeviance) -> Vec<BiasRow> {
    let batch_by_key: HashMap<(&str, &str), &GeneDeviance> = batch
        .entries
        .iter()
        .map(|entry| ((entry.gene.as_str(), entry.gene_name.as_str()), entry))
        .collect();

    let mut rows: Vec<BiasRow> = default
        .entries
        .iter()
        .filter_map(|d| {
            batch_by_key
                .get(&(d.gene.as_str(), d.gene_name.as_str()))
                .map(|b| BiasRow::from_runs(d, b))
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.gene.as_str(), a.gene_name.as_str()).cmp(&(b.gene.as_str(), b.gene_name.as_str()))
    });
    rows
}

/// Fill `nsd_dev` and `nsd_rank` with z-scores computed over all rows.
pub fn standardize(rows: &mut [BiasRow]) {
    let d_diff: Vec<f64> = rows.iter().map(|row| row.d_diff).collect();
    let r_diff: Vec<f64> = rows.iter().map(|row| row.r_diff as f64).collect();

    let nsd_dev = z_scores(&d_diff);
    let nsd_rank = z_scores(&r_diff);

    for ((row, dev), rank) in rows.iter_mut().zip(nsd_dev).zip(nsd_rank) {
        row.nsd_dev = dev;
        row.nsd_rank = rank;
    }
}

/// Collect the conditions that make the joined table produce non-finite values.
pub fn detect_degeneracy(rows: &[BiasRow], zero_tolerance: f64) -> Vec<DegeneracyWarning> {
    let mut warnings: Vec<DegeneracyWarning> = rows
        .iter()
        .filter(|row| row.dev_batch.abs() <= zero_tolerance)
        .map(|row| DegeneracyWarning::ZeroDenominator {
            gene: row.gene.clone(),
        })
        .collect();

    if rows.len() == 1 {
        warnings.push(DegeneracyWarning::TooFewRows { rows: rows.len() });
    } else if rows.len() > 1 {
        let d_diff: Vec<f64> = rows.iter().map(|row| row.d_diff).collect();
        let r_diff: Vec<f64> = rows.iter().map(|row| row.r_diff as f64).collect();
        if sample_sd(&d_diff) == 0.0 {
            warnings.push(DegeneracyWarning::ZeroVariance { column: "d_diff" });
        }
        if sample_sd(&r_diff) == 0.0 {
            warnings.push(DegeneracyWarning::ZeroVariance { column: "r_diff" });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevianceRun;
    use approx::assert_abs_diff_eq;

    fn run(run: DevianceRun, genes: &[(&str, f64, usize)]) -> PerGeneDeviance {
        PerGeneDeviance {
            run,
            entries: genes
                .iter()
                .map(|&(gene, deviance, rank)| GeneDeviance {
                    gene: gene.to_string(),
                    gene_name: gene.to_lowercase(),
                    deviance,
                    rank,
                })
                .collect(),
        }
    }

    #[test]
    fn test_inner_join_drops_one_sided_genes() {
        let default = run(
            DevianceRun::Default,
            &[("G3", 9.0, 1), ("G1", 6.0, 2), ("G2", 3.0, 3)],
        );
        let batch = run(DevianceRun::Batch, &[("G2", 2.0, 2), ("G1", 4.0, 1)]);

        let rows = merge_runs(&default, &batch);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gene, "G1");
        assert_eq!(rows[1].gene, "G2");

        assert_abs_diff_eq!(rows[0].d_diff, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].d_diff, 0.5, epsilon = 1e-12);
        assert_eq!(rows[0].r_diff, -1);
        assert_eq!(rows[1].r_diff, -1);
        assert!(rows[0].nsd_dev.is_nan());
    }

    #[test]
    fn test_join_requires_matching_names() {
        let default = run(DevianceRun::Default, &[("G1", 6.0, 1)]);
        let mut batch = run(DevianceRun::Batch, &[("G1", 4.0, 1)]);
        batch.entries[0].gene_name = "renamed".to_string();

        assert!(merge_runs(&default, &batch).is_empty());
    }

    #[test]
    fn test_standardize() {
        let default = run(
            DevianceRun::Default,
            &[("A", 4.0, 1), ("B", 3.0, 2), ("C", 2.0, 3)],
        );
        let batch = run(
            DevianceRun::Batch,
            &[("A", 1.0, 3), ("B", 2.0, 1), ("C", 2.0, 2)],
        );

        let mut rows = merge_runs(&default, &batch);
        standardize(&mut rows);

        // d_diff = [3, 0.5, 0], mean 7/6
        let sd = sample_sd(&[3.0, 0.5, 0.0]);
        assert_abs_diff_eq!(rows[0].nsd_dev, (3.0 - 7.0 / 6.0) / sd, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[2].nsd_dev, (0.0 - 7.0 / 6.0) / sd, epsilon = 1e-12);

        // r_diff = [2, -1, -1], mean 0, sd sqrt(3)
        assert_abs_diff_eq!(rows[0].nsd_rank, 2.0 / 3.0_f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].nsd_rank, -1.0 / 3.0_f64.sqrt(), epsilon = 1e-12);
        assert!(detect_degeneracy(&rows, 0.0).is_empty());
    }

    #[test]
    fn test_degeneracy_detection() {
        let default = run(DevianceRun::Default, &[("A", 4.0, 1), ("B", 3.0, 2)]);
        let batch = run(DevianceRun::Batch, &[("A", 0.0, 2), ("B", 3.0, 1)]);
        let rows = merge_runs(&default, &batch);

        assert!(rows[0].d_diff.is_infinite());
        let warnings = detect_degeneracy(&rows, 0.0);
        assert_eq!(
            warnings,
            vec![DegeneracyWarning::ZeroDenominator { gene: "A".to_string() }]
        );

        let single = merge_runs(
            &run(DevianceRun::Default, &[("A", 4.0, 1)]),
            &run(DevianceRun::Batch, &[("A", 2.0, 1)]),
        );
        assert_eq!(
            detect_degeneracy(&single, 0.0),
            vec![DegeneracyWarning::TooFewRows { rows: 1 }]
        );
        assert!(detect_degeneracy(&[], 0.0).is_empty());
    }

    #[test]
    fn test_constant_rank_difference_is_flagged() {
        let default = run(DevianceRun::Default, &[("A", 4.0, 1), ("B", 3.0, 2)]);
        let batch = run(DevianceRun::Batch, &[("A", 2.0, 1), ("B", 1.0, 2)]);
        let rows = merge_runs(&default, &batch);

        assert_eq!(
            detect_degeneracy(&rows, 0.0),
            vec![DegeneracyWarning::ZeroVariance { column: "r_diff" }]
        );
    }
}
