use nalgebra_sparse::{CooMatrix, CsrMatrix};
use single_featurebias::input::{COUNTS_ASSAY, GENE_ID_FIELD, GENE_NAME_FIELD};
use single_featurebias::{
    BiasError, CountDeviance, DegeneracyPolicy, DegeneracyWarning, ExpressionContainer,
    FeatureSelectOptions, MetadataTable, feature_select, feature_select_with,
};

#[cfg(test)]
mod container_tests {
    use super::*;

    /// A spatial container that stores counts under a non-default layer and exposes them
    /// through the capability trait only.
    struct SpotContainer {
        raw: CsrMatrix<f64>,
        layer_name: &'static str,
        genes: MetadataTable,
        spots: MetadataTable,
    }

    impl ExpressionContainer for SpotContainer {
        type Counts = CsrMatrix<f64>;

        fn assay(&self, name: &str) -> Option<&CsrMatrix<f64>> {
            if name == self.layer_name {
                Some(&self.raw)
            } else {
                None
            }
        }

        fn row_data(&self) -> &MetadataTable {
            &self.genes
        }

        fn col_data(&self) -> &MetadataTable {
            &self.spots
        }
    }

    fn spot_container(layer_name: &'static str) -> SpotContainer {
        // 4 genes x 4 spots, gene g0 doubles on slide B
        let values = [
            [2.0, 3.0, 6.0, 5.0],
            [4.0, 4.0, 4.0, 5.0],
            [0.0, 1.0, 0.0, 2.0],
            [7.0, 5.0, 6.0, 8.0],
        ];
        let mut coo = CooMatrix::new(4, 4);
        for (i, row) in values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    coo.push(i, j, v);
                }
            }
        }

        SpotContainer {
            raw: CsrMatrix::from(&coo),
            layer_name,
            genes: MetadataTable::new()
                .with_field(GENE_ID_FIELD, ["g0", "g1", "g2", "g3"])
                .with_field(GENE_NAME_FIELD, ["Gfap", "Snap25", "Mbp", "Pcp4"]),
            spots: MetadataTable::new()
                .with_field("slide", ["A", "A", "B", "B"])
                .with_field("subject", ["m1", "m1", "m1", "m1"]),
        }
    }

    #[test]
    fn check_custom_container() {
        let container = spot_container(COUNTS_ASSAY);
        let result = feature_select(&container, "slide", &["g0", "g1", "g2", "g3"]).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.row("g2").unwrap().gene_name, "Mbp");
        for row in &result.rows {
            assert!(row.dev_default.is_finite());
            assert!(row.dev_batch.is_finite());
            assert_eq!(row.r_diff, row.rank_batch as i64 - row.rank_default as i64);
        }
    }

    #[test]
    fn check_missing_counts_layer() {
        let container = spot_container("logcounts");
        let result = feature_select(&container, "slide", &["g0"]);
        assert!(matches!(result, Err(BiasError::Shape(msg)) if msg.contains(COUNTS_ASSAY)));
    }

    #[test]
    fn check_configuration_precedes_shape() {
        // Both the batch field and the counts layer are wrong; the argument error wins.
        let container = spot_container("logcounts");
        let result = feature_select(&container, "donor", &["g0"]);
        assert!(matches!(result, Err(BiasError::Configuration(_))));
    }

    #[test]
    fn check_single_level_batch() {
        // One subject only: modelling it changes nothing, so every d_diff is zero
        let container = spot_container(COUNTS_ASSAY);
        let result = feature_select(&container, "subject", &["g0", "g1", "g3"]).unwrap();

        assert_eq!(result.len(), 3);
        for row in &result.rows {
            assert_eq!(row.dev_default, row.dev_batch);
            assert_eq!(row.d_diff, 0.0);
            assert_eq!(row.r_diff, 0);
        }
        assert_eq!(
            result.warnings,
            vec![
                DegeneracyWarning::ZeroVariance { column: "d_diff" },
                DegeneracyWarning::ZeroVariance { column: "r_diff" },
            ]
        );
        for row in &result.rows {
            assert!(!row.nsd_dev.is_finite());
            assert!(!row.nsd_rank.is_finite());
        }
    }

    #[test]
    fn check_single_level_batch_rejected() {
        let container = spot_container(COUNTS_ASSAY);
        let options = FeatureSelectOptions::new().with_degeneracy(DegeneracyPolicy::Reject);
        let result = feature_select_with(
            &container,
            "subject",
            &["g0", "g1", "g3"],
            &CountDeviance::new(),
            &options,
        );

        match result {
            Err(BiasError::Degenerate(msg)) => {
                assert!(msg.contains("d_diff"));
                assert!(msg.contains("zero variance"));
            }
            other => panic!("expected a degenerate error, got {other:?}"),
        }
    }

    #[test]
    fn check_ragged_gene_metadata() {
        let mut container = spot_container(COUNTS_ASSAY);
        container.genes = container.genes.clone().with_field("biotype", ["protein_coding"]);
        let result = feature_select(&container, "slide", &["g0"]);
        assert!(matches!(result, Err(BiasError::Shape(_))));
    }
}
