//! Read-only access to annotated expression data.
//!
//! The bias workflow never depends on a concrete container type. It only needs a counts
//! layer (genes × samples), gene-level metadata and sample-level metadata, which is what
//! [`ExpressionContainer`] captures. [`Experiment`] is a minimal owned container that
//! satisfies it for both sparse and dense counts.

use std::collections::HashMap;

use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;
use single_utilities::traits::FloatOpsTS;

pub mod subset;

pub use subset::{BatchFactor, FilteredInput, prepare_input};

/// Name of the assay holding raw counts.
pub const COUNTS_ASSAY: &str = "counts";
/// Gene-level field with stable, unique identifiers.
pub const GENE_ID_FIELD: &str = "gene_id";
/// Gene-level field with display names.
pub const GENE_NAME_FIELD: &str = "gene_name";

/// A counts matrix laid out as genes (rows) × samples (columns).
pub trait CountsLayer {
    fn n_genes(&self) -> usize;

    fn n_samples(&self) -> usize;

    /// Densify the given gene rows, in the given order, into a `rows.len() × n_samples` matrix.
    ///
    /// Values that cannot be represented as `f64` become `NaN` so the deviance model can
    /// reject them.
    fn dense_rows(&self, rows: &[usize]) -> Array2<f64>;
}

impl<T> CountsLayer for CsrMatrix<T>
where
    T: FloatOpsTS,
{
    fn n_genes(&self) -> usize {
        self.nrows()
    }

    fn n_samples(&self) -> usize {
        self.ncols()
    }

    fn dense_rows(&self, rows: &[usize]) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((rows.len(), self.ncols()));
        for (out_row, &gene_idx) in rows.iter().enumerate() {
            let row = self.row(gene_idx);
            for (&col, value) in row.col_indices().iter().zip(row.values()) {
                dense[[out_row, col]] = value.to_f64().unwrap_or(f64::NAN);
            }
        }
        dense
    }
}

impl<T> CountsLayer for Array2<T>
where
    T: FloatOpsTS,
{
    fn n_genes(&self) -> usize {
        self.nrows()
    }

    fn n_samples(&self) -> usize {
        self.ncols()
    }

    fn dense_rows(&self, rows: &[usize]) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((rows.len(), self.ncols()));
        for (out_row, &gene_idx) in rows.iter().enumerate() {
            for (col, value) in self.row(gene_idx).iter().enumerate() {
                dense[[out_row, col]] = value.to_f64().unwrap_or(f64::NAN);
            }
        }
        dense
    }
}

/// Ordered set of named string columns, one entry per row.
///
/// Used for both gene-level (`row_data`) and sample-level (`col_data`) annotations. Fields are
/// looked up by exact name; a missing field is reported as `None`, never defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    fields: Vec<(String, Vec<String>)>,
}

impl MetadataTable {
    pub fn new() -> Self {
        MetadataTable { fields: Vec::new() }
    }

    /// Add (or replace) a field
    pub fn with_field<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = values,
            None => self.fields.push((name.to_string(), values)),
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of rows, taken from the first field. A table without fields has no rows.
    pub fn n_rows(&self) -> usize {
        self.fields.first().map_or(0, |(_, values)| values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether all fields have the same length.
    pub fn is_rectangular(&self) -> bool {
        let n = self.n_rows();
        self.fields.iter().all(|(_, values)| values.len() == n)
    }
}

/// Capability set the bias workflow needs from an expression container.
pub trait ExpressionContainer {
    type Counts: CountsLayer;

    /// Look up a named assay layer.
    fn assay(&self, name: &str) -> Option<&Self::Counts>;

    /// Gene-level metadata, one row per counts row.
    fn row_data(&self) -> &MetadataTable;

    /// Sample-level metadata, one row per counts column.
    fn col_data(&self) -> &MetadataTable;
}

/// Owned expression container with named assays and row/column annotations.
///
/// Dimensions are not checked on construction; [`prepare_input`] validates them before use.
#[derive(Debug, Clone)]
pub struct Experiment<M> {
    assays: HashMap<String, M>,
    row_data: MetadataTable,
    col_data: MetadataTable,
}

impl<M> Experiment<M>
where
    M: CountsLayer,
{
    /// Create a container without any assay layers
    pub fn new(row_data: MetadataTable, col_data: MetadataTable) -> Self {
        Experiment {
            assays: HashMap::new(),
            row_data,
            col_data,
        }
    }

    /// Create a container holding `counts` as its counts assay
    pub fn from_counts(counts: M, row_data: MetadataTable, col_data: MetadataTable) -> Self {
        Self::new(row_data, col_data).with_assay(COUNTS_ASSAY, counts)
    }

    pub fn with_assay(mut self, name: &str, layer: M) -> Self {
        self.assays.insert(name.to_string(), layer);
        self
    }

    pub fn assay_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.assays.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<M> ExpressionContainer for Experiment<M>
where
    M: CountsLayer,
{
    type Counts = M;

    fn assay(&self, name: &str) -> Option<&M> {
        self.assays.get(name)
    }

    fn row_data(&self) -> &MetadataTable {
        &self.row_data
    }

    fn col_data(&self) -> &MetadataTable {
        &self.col_data
    }
}
