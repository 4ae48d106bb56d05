use std::fmt::{self, Display};

use log::warn;
use ndarray::{Array2, Axis as NdAxis};

use crate::errors::{MatrixError, Result};
use crate::models::axis::Axis;
use crate::models::frame::{Frame, ID_COLUMN, Value};
use crate::models::selector::{Selector, resolve};
use crate::utils::{build_index_map, duplicate_labels};

///
/// An annotated numeric matrix: a dense 2D value matrix whose rows and
/// columns each carry unique identifiers plus an annotation table.
///
/// The construction invariant, re-established after every transformation:
/// the matrix dimensions match the id vector lengths, and each annotation
/// table has exactly one row per axis id, in axis order, with its `id`
/// column equal to the id vector. Missing cells are `f64::NAN`.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AnnMatrix {
    mat: Array2<f64>,
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    row_meta: Frame,
    col_meta: Frame,
}

impl AnnMatrix {
    ///
    /// Create a new [AnnMatrix] from a matrix, id vectors, and optional
    /// annotation tables.
    ///
    /// Both tables are re-synchronized to axis order: ids absent from a
    /// table get null-filled rows, table rows whose id is not on the axis
    /// are dropped. Duplicate axis ids are tolerated with a warning here
    /// (alignment operators reject them fatally).
    ///
    /// # Arguments:
    /// - mat: the value matrix, one row per row id and one column per column id
    /// - row_ids / col_ids: axis identifier vectors
    /// - row_meta / col_meta: annotation tables keyed by an `id` column
    pub fn new(
        mat: Array2<f64>,
        row_ids: Vec<String>,
        col_ids: Vec<String>,
        row_meta: Option<Frame>,
        col_meta: Option<Frame>,
    ) -> Result<Self> {
        if mat.nrows() != row_ids.len() {
            return Err(MatrixError::ShapeMismatch(format!(
                "matrix has {} rows but {} row ids were given",
                mat.nrows(),
                row_ids.len()
            )));
        }
        if mat.ncols() != col_ids.len() {
            return Err(MatrixError::ShapeMismatch(format!(
                "matrix has {} columns but {} column ids were given",
                mat.ncols(),
                col_ids.len()
            )));
        }

        for (axis, ids) in [(Axis::Row, &row_ids), (Axis::Column, &col_ids)] {
            let duplicates = duplicate_labels(ids);
            if !duplicates.is_empty() {
                warn!("duplicate ids on {} axis: {:?}", axis, duplicates);
            }
        }

        let row_meta = sync_meta(&row_ids, row_meta, Axis::Row)?;
        let col_meta = sync_meta(&col_ids, col_meta, Axis::Column)?;

        Ok(AnnMatrix {
            mat,
            row_ids,
            col_ids,
            row_meta,
            col_meta,
        })
    }

    ///
    /// Create an [AnnMatrix] from parts already in axis order.
    ///
    /// Unlike [AnnMatrix::new] this does no id-based remapping: each table
    /// must already have exactly one row per axis id with its `id` column
    /// equal to the id vector, positionally. Operators that assemble
    /// metadata themselves (merging, aggregation) use this to keep
    /// duplicate-id rows distinct, which an id keyed re-sync cannot.
    ///
    pub fn from_ordered(
        mat: Array2<f64>,
        row_ids: Vec<String>,
        col_ids: Vec<String>,
        row_meta: Frame,
        col_meta: Frame,
    ) -> Result<Self> {
        if mat.nrows() != row_ids.len() || mat.ncols() != col_ids.len() {
            return Err(MatrixError::ShapeMismatch(format!(
                "matrix is {}x{} but {} row and {} column ids were given",
                mat.nrows(),
                mat.ncols(),
                row_ids.len(),
                col_ids.len()
            )));
        }
        for (axis, ids, meta) in [
            (Axis::Row, &row_ids, &row_meta),
            (Axis::Column, &col_ids, &col_meta),
        ] {
            let key_col = meta.require_column(ID_COLUMN)?;
            if key_col.len() != ids.len()
                || !key_col.iter().zip(ids.iter()).all(|(v, id)| v.render() == *id)
            {
                return Err(MatrixError::ShapeMismatch(format!(
                    "{} annotation table is not in axis id order",
                    axis
                )));
            }
        }

        Ok(AnnMatrix {
            mat,
            row_ids,
            col_ids,
            row_meta,
            col_meta,
        })
    }

    pub fn mat(&self) -> &Array2<f64> {
        &self.mat
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    pub fn row_meta(&self) -> &Frame {
        &self.row_meta
    }

    pub fn col_meta(&self) -> &Frame {
        &self.col_meta
    }

    pub fn ids(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Row => &self.row_ids,
            Axis::Column => &self.col_ids,
        }
    }

    pub fn meta(&self, axis: Axis) -> &Frame {
        match axis {
            Axis::Row => &self.row_meta,
            Axis::Column => &self.col_meta,
        }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.mat.nrows(), self.mat.ncols())
    }

    /// Replace the value matrix. The new matrix must match the current
    /// dimensions exactly.
    pub fn set_mat(&mut self, mat: Array2<f64>) -> Result<()> {
        if mat.nrows() != self.row_ids.len() || mat.ncols() != self.col_ids.len() {
            return Err(MatrixError::ShapeMismatch(format!(
                "replacement matrix is {}x{}, object is {}x{}",
                mat.nrows(),
                mat.ncols(),
                self.row_ids.len(),
                self.col_ids.len()
            )));
        }
        self.mat = mat;
        Ok(())
    }

    /// Replace the row annotation table, re-synchronizing it to row order.
    pub fn set_row_meta(&mut self, meta: Frame) -> Result<()> {
        self.row_meta = sync_meta(&self.row_ids, Some(meta), Axis::Row)?;
        Ok(())
    }

    /// Replace the column annotation table, re-synchronizing it to column order.
    pub fn set_col_meta(&mut self, meta: Frame) -> Result<()> {
        self.col_meta = sync_meta(&self.col_ids, Some(meta), Axis::Column)?;
        Ok(())
    }

    ///
    /// Slice the object down to the rows and columns named by the selectors.
    ///
    /// Both axes resolve per selector semantics: unmatched labels drop with
    /// a warning, selector order and multiplicity are preserved, and an
    /// empty resolved axis yields a degenerate but valid object.
    ///
    pub fn subset(&self, rows: &Selector, cols: &Selector) -> Result<AnnMatrix> {
        let (row_ids, row_idx) = resolve(rows, &self.row_ids, Axis::Row)?;
        let (col_ids, col_idx) = resolve(cols, &self.col_ids, Axis::Column)?;

        let mat = self
            .mat
            .select(NdAxis(0), &row_idx)
            .select(NdAxis(1), &col_idx);

        Ok(AnnMatrix {
            mat,
            row_meta: self.row_meta.take(&row_idx),
            col_meta: self.col_meta.take(&col_idx),
            row_ids,
            col_ids,
        })
    }

    /// Transpose: rows and columns swap roles entirely, annotation tables
    /// included.
    pub fn transpose(&self) -> AnnMatrix {
        AnnMatrix {
            mat: self.mat.t().to_owned(),
            row_ids: self.col_ids.clone(),
            col_ids: self.row_ids.clone(),
            row_meta: self.col_meta.clone(),
            col_meta: self.row_meta.clone(),
        }
    }
}

impl Display for AnnMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnnMatrix {}x{} ({} row annotation fields, {} column annotation fields)",
            self.mat.nrows(),
            self.mat.ncols(),
            self.row_meta.n_cols().saturating_sub(1),
            self.col_meta.n_cols().saturating_sub(1),
        )
    }
}

/// Align an annotation table to an axis id vector: one output row per id, in
/// id order, null-filled where the table has no matching row. The table's
/// `id` column is rewritten to the axis ids afterwards so the invariant
/// holds by construction.
fn sync_meta(ids: &[String], meta: Option<Frame>, axis: Axis) -> Result<Frame> {
    let meta = match meta {
        None => return Ok(Frame::id_only(ids)),
        Some(meta) if meta.is_empty() => return Ok(Frame::id_only(ids)),
        Some(meta) => meta,
    };

    let key_col = meta.require_column(ID_COLUMN)?;
    let keys: Vec<String> = key_col.iter().map(|v| v.render()).collect();

    let duplicates = duplicate_labels(&keys);
    if !duplicates.is_empty() {
        warn!(
            "duplicate ids in {} annotation table (first occurrence wins): {:?}",
            axis, duplicates
        );
    }

    let key_map = build_index_map(&keys);
    let indices: Vec<Option<usize>> = ids
        .iter()
        .map(|id| key_map.get(id.as_str()).copied())
        .collect();

    let mut synced = meta.take_opt(&indices);
    synced.set_column(
        ID_COLUMN,
        ids.iter().map(|id| Value::from(id.clone())).collect(),
    )?;
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn ids(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    fn sample() -> AnnMatrix {
        let mat = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut row_meta = Frame::new();
        row_meta.push_column(ID_COLUMN, strs(&["r1", "r2"])).unwrap();
        row_meta.push_column("gene", strs(&["g1", "g2"])).unwrap();
        AnnMatrix::new(
            mat,
            ids(&["r1", "r2"]),
            ids(&["c1", "c2", "c3"]),
            Some(row_meta),
            None,
        )
        .unwrap()
    }

    #[rstest]
    fn test_new_dimension_mismatch() {
        let mat = array![[1.0, 2.0]];
        let result = AnnMatrix::new(mat, ids(&["r1", "r2"]), ids(&["c1", "c2"]), None, None);
        assert!(matches!(result, Err(MatrixError::ShapeMismatch(_))));
    }

    #[rstest]
    fn test_new_defaults_meta_to_id_only() {
        let g = sample();
        assert_eq!(g.col_meta().names(), &[ID_COLUMN]);
        assert_eq!(
            g.col_meta().column(ID_COLUMN).unwrap(),
            &strs(&["c1", "c2", "c3"])[..]
        );
    }

    #[rstest]
    fn test_new_syncs_meta_to_axis_order() {
        let mat = array![[1.0], [2.0]];
        let mut row_meta = Frame::new();
        // reversed order plus an extra id not on the axis
        row_meta
            .push_column(ID_COLUMN, strs(&["r2", "zz", "r1"]))
            .unwrap();
        row_meta
            .push_column("gene", strs(&["g2", "gz", "g1"]))
            .unwrap();

        let g = AnnMatrix::new(mat, ids(&["r1", "r2"]), ids(&["c1"]), Some(row_meta), None)
            .unwrap();
        assert_eq!(
            g.row_meta().column("gene").unwrap(),
            &strs(&["g1", "g2"])[..]
        );
        assert_eq!(
            g.row_meta().column(ID_COLUMN).unwrap(),
            &strs(&["r1", "r2"])[..]
        );
    }

    #[rstest]
    fn test_new_unmatched_id_gets_null_row() {
        let mat = array![[1.0], [2.0]];
        let mut row_meta = Frame::new();
        row_meta.push_column(ID_COLUMN, strs(&["r1"])).unwrap();
        row_meta.push_column("gene", strs(&["g1"])).unwrap();

        let g = AnnMatrix::new(mat, ids(&["r1", "r2"]), ids(&["c1"]), Some(row_meta), None)
            .unwrap();
        assert_eq!(g.row_meta().column("gene").unwrap()[1], Value::Null);
    }

    #[rstest]
    fn test_meta_without_id_column_fails() {
        let mat = array![[1.0]];
        let mut row_meta = Frame::new();
        row_meta.push_column("gene", strs(&["g1"])).unwrap();
        let result = AnnMatrix::new(mat, ids(&["r1"]), ids(&["c1"]), Some(row_meta), None);
        assert!(matches!(result, Err(MatrixError::MissingColumn(_))));
    }

    #[rstest]
    fn test_subset_by_label() {
        let g = sample();
        let sub = g
            .subset(&Selector::labels(["r2"]), &Selector::labels(["c3", "c1"]))
            .unwrap();
        assert_eq!(sub.shape(), (1, 2));
        assert_eq!(sub.mat(), &array![[6.0, 4.0]]);
        assert_eq!(sub.row_ids(), &ids(&["r2"])[..]);
        assert_eq!(sub.col_ids(), &ids(&["c3", "c1"])[..]);
        assert_eq!(
            sub.row_meta().column("gene").unwrap(),
            &strs(&["g2"])[..]
        );
    }

    #[rstest]
    fn test_subset_by_index() {
        let g = sample();
        let sub = g
            .subset(&Selector::indices([1]), &Selector::indices([0, 2]))
            .unwrap();
        assert_eq!(sub.mat(), &array![[4.0, 6.0]]);
    }

    #[rstest]
    fn test_subset_idempotent() {
        let g = sample();
        let rows = Selector::labels(["r1"]);
        let cols = Selector::labels(["c2", "c1"]);
        let once = g.subset(&rows, &cols).unwrap();
        let twice = once.subset(&rows, &cols).unwrap();
        assert_eq!(once, twice);
    }

    #[rstest]
    fn test_subset_degenerate() {
        let g = sample();
        let sub = g
            .subset(&Selector::labels(["nope"]), &Selector::All)
            .unwrap();
        assert_eq!(sub.shape(), (0, 3));
    }

    #[rstest]
    fn test_transpose_involution() {
        let g = sample();
        let back = g.transpose().transpose();
        assert_eq!(g, back);
    }

    #[rstest]
    fn test_transpose_swaps_meta() {
        let g = sample();
        let t = g.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.col_meta().column("gene").unwrap(), g.row_meta().column("gene").unwrap());
        assert_eq!(t.row_ids(), g.col_ids());
    }

    #[rstest]
    fn test_set_mat_shape_check() {
        let mut g = sample();
        assert!(g.set_mat(array![[1.0]]).is_err());
        assert!(g.set_mat(array![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]).is_ok());
    }

    #[rstest]
    fn test_set_row_meta_resyncs() {
        let mut g = sample();
        let mut meta = Frame::new();
        meta.push_column(ID_COLUMN, strs(&["r2"])).unwrap();
        meta.push_column("score", strs(&["high"])).unwrap();
        g.set_row_meta(meta).unwrap();
        assert_eq!(
            g.row_meta().column("score").unwrap(),
            &[Value::Null, Value::from("high")][..]
        );
    }

    #[rstest]
    fn test_display() {
        let g = sample();
        assert_eq!(
            g.to_string(),
            "AnnMatrix 2x3 (1 row annotation fields, 0 column annotation fields)"
        );
    }
}
