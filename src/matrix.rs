//! Labeled numeric matrices.
//!
//! An expression matrix carries row identifiers (features, e.g. genes),
//! column identifiers (conditions) and a dense `rows × cols` block of values.
//! Missing values (`null` on the wire) are stored as NaN and rejected by the
//! engines as degenerate input.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense matrix with row and column identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DataMatrix", into = "DataMatrix")]
pub struct LabeledMatrix {
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    values: Array2<f64>,
}

/// Wire form: `{"row_ids": [...], "col_ids": [...], "values": [[...], ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMatrix {
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl LabeledMatrix {
    /// Build from identifiers and an owned value block.
    pub fn new(row_ids: Vec<String>, col_ids: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != row_ids.len() {
            return Err(Error::DimensionMismatch {
                expected: row_ids.len(),
                found: values.nrows(),
            });
        }
        if values.ncols() != col_ids.len() {
            return Err(Error::DimensionMismatch {
                expected: col_ids.len(),
                found: values.ncols(),
            });
        }
        Ok(Self {
            row_ids,
            col_ids,
            values,
        })
    }

    /// Build from row vectors.
    pub fn from_rows(row_ids: Vec<String>, col_ids: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let d = col_ids.len();
        let mut flat = Vec::with_capacity(n * d);
        for row in &rows {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((n, d), flat).map_err(|e| Error::InvalidParameter {
            name: "values",
            message: e.to_string(),
        })?;
        Self::new(row_ids, col_ids, values)
    }

    /// Build from unlabeled rows, naming items `row_<i>` / `col_<j>`.
    pub fn from_unlabeled(rows: Vec<Vec<f64>>) -> Result<Self> {
        let d = rows.first().map_or(0, Vec::len);
        let row_ids = (0..rows.len()).map(|i| format!("row_{i}")).collect();
        let col_ids = (0..d).map(|j| format!("col_{j}")).collect();
        Self::from_rows(row_ids, col_ids, rows)
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Row identifiers.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Column identifiers.
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// View of the value block.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Swap the roles of rows and columns (conditions become items).
    pub fn transposed(&self) -> Self {
        Self {
            row_ids: self.col_ids.clone(),
            col_ids: self.row_ids.clone(),
            values: self.values.t().as_standard_layout().into_owned(),
        }
    }
}

/// Reject empty blocks and non-finite values, naming the first offending row.
pub fn ensure_finite(values: ArrayView2<'_, f64>, row_ids: Option<&[String]>) -> Result<()> {
    if values.ncols() == 0 {
        return Err(Error::degenerate("matrix has no columns"));
    }
    for (i, row) in values.rows().into_iter().enumerate() {
        if row.iter().any(|v| !v.is_finite()) {
            let label = row_ids
                .and_then(|ids| ids.get(i))
                .cloned()
                .unwrap_or_else(|| format!("#{i}"));
            return Err(Error::degenerate(format!(
                "row {label} contains missing or non-finite values"
            )));
        }
    }
    Ok(())
}

impl TryFrom<DataMatrix> for LabeledMatrix {
    type Error = Error;

    fn try_from(raw: DataMatrix) -> Result<Self> {
        let rows = raw
            .values
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        Self::from_rows(raw.row_ids, raw.col_ids, rows)
    }
}

impl From<LabeledMatrix> for DataMatrix {
    fn from(m: LabeledMatrix) -> Self {
        let values = m
            .values
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_finite() { Some(*v) } else { None })
                    .collect()
            })
            .collect();
        Self {
            row_ids: m.row_ids,
            col_ids: m.col_ids,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabeledMatrix {
        LabeledMatrix::from_rows(
            vec!["gene_1".into(), "gene_2".into()],
            vec!["c1".into(), "c2".into(), "c3".into()],
            vec![vec![0.1, 0.2, 0.3], vec![0.3, 0.4, 0.5]],
        )
        .unwrap()
    }

    #[test]
    fn test_transposed_swaps_ids_and_values() {
        let m = sample();
        let t = m.transposed();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.row_ids(), m.col_ids());
        assert_eq!(t.values()[[2, 1]], 0.5);
        assert!(t.values().is_standard_layout());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = LabeledMatrix::from_rows(
            vec!["a".into(), "b".into()],
            vec!["x".into(), "y".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert_eq!(err, Error::DimensionMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn test_null_values_become_non_finite() {
        let json = r#"{
            "row_ids": ["gene_1", "gene_2", "gene_3"],
            "col_ids": ["condition_1", "condition_2"],
            "values": [[0.1, 0.2], [0.3, 0.4], [null, null]]
        }"#;
        let m: LabeledMatrix = serde_json::from_str(json).unwrap();
        assert_eq!(m.nrows(), 3);
        let err = ensure_finite(m.values(), Some(m.row_ids())).unwrap_err();
        assert!(err.to_string().contains("gene_3"));
    }

    #[test]
    fn test_json_shape_mismatch_is_error() {
        let json = r#"{"row_ids": ["a"], "col_ids": ["x", "y"], "values": [[1.0, 2.0], [3.0, 4.0]]}"#;
        assert!(serde_json::from_str::<LabeledMatrix>(json).is_err());
    }
}
