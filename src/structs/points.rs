use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};

/// An ordered cloud of `N` points in `R^d`.
///
/// Each row of the underlying matrix is a point, each column a coordinate.
/// The row order is preserved by every operation in the crate; sorting only
/// ever happens on derived scalar projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    matrix: Array2<f64>,
}

impl PointSet {
    pub fn new(matrix: Array2<f64>) -> Self {
        PointSet { matrix }
    }

    /// Build a point set from row-major coordinates.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let d = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != d) {
            return Err(GswError::DimensionMismatch {
                left: d,
                right: bad.len(),
            });
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((n, d), flat)
            .map_err(|e| GswError::InvalidConfiguration(e.to_string()))?;
        Ok(PointSet { matrix })
    }

    /// Number of points, equal to the number of rows
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    /// Ambient dimension, equal to the number of columns
    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Mutable access for the outer optimizer, which moves the points.
    pub(crate) fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.matrix.view_mut()
    }

    /// Fails with [GswError::DimensionMismatch] if `other` lives in a different space.
    pub fn check_compatible(&self, other: &PointSet) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(GswError::DimensionMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|x| x.is_finite())
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.matrix
    }
}

impl From<Array2<f64>> for PointSet {
    fn from(matrix: Array2<f64>) -> Self {
        PointSet { matrix }
    }
}

impl From<ArrayView2<'_, f64>> for PointSet {
    fn from(view: ArrayView2<'_, f64>) -> Self {
        PointSet {
            matrix: view.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_rows() {
        let points = PointSet::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points.dim(), 2);
        assert_eq!(points.matrix(), &array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_from_rows_ragged() {
        let err = PointSet::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err, GswError::DimensionMismatch { left: 2, right: 1 });
    }

    #[test]
    fn test_check_compatible() {
        let a = PointSet::from(array![[0.0, 0.0]]);
        let b = PointSet::from(array![[0.0, 0.0, 1.0]]);
        assert!(a.check_compatible(&a).is_ok());
        assert_eq!(
            a.check_compatible(&b),
            Err(GswError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_is_finite() {
        let mut points = PointSet::from(array![[0.0, 1.0], [2.0, 3.0]]);
        assert!(points.is_finite());
        points.view_mut()[[1, 0]] = f64::NAN;
        assert!(!points.is_finite());
    }
}
