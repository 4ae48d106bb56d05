//! Structural transformations of annotated matrices.
//!
//! Everything here is a pure transformation: inputs are borrowed, outputs
//! are freshly constructed objects with their invariants re-established.
//! Column-axis variants are handled by transposing, running the row-axis
//! code path, and transposing back.

use std::path::Path;

use anyhow::Context;
use ndarray::{Array2, concatenate};
use ndarray::Axis as NdAxis;

use annmat_core::errors::{MatrixError, Result};
use annmat_core::models::{AnnMatrix, Axis, Frame, ID_COLUMN, Selector, Value};
use annmat_core::utils::build_index_map;

use crate::align::LabeledMatrix;

/// Transformation operators over [AnnMatrix].
pub trait MatrixTransforms: Sized {
    /// Concatenate two objects along `axis`.
    ///
    /// The orthogonal axis is reconciled first: both matrices are NaN-padded
    /// to the union of its labels (`self`'s labels first, `other`'s new ones
    /// appended), then stacked along `axis` with `self` before `other`.
    /// Metadata on the concatenated axis is row-bound with permissive column
    /// union; metadata on the orthogonal axis is unioned by id with
    /// `self` winning on conflicts. Both inputs need unique labels on both
    /// axes since padding goes through the aligner.
    ///
    /// With `matrix_only`, metadata handling is skipped entirely and the
    /// result carries id-only tables.
    fn merge(&self, other: &Self, axis: Axis, matrix_only: bool) -> Result<Self>;

    /// Merge an annotation table into one axis's metadata.
    ///
    /// `keyfield` names the table column holding axis ids; it is aliased to
    /// `id` before a left-precedence merge keyed on `id`. Axis ids missing
    /// from the table keep null annotation values (with a warning); table
    /// rows for unknown ids are ignored. A table with several rows for one
    /// id fails with [MatrixError::CartesianProduct] since expansion would
    /// desynchronize the metadata from the matrix.
    fn annotate(&self, table: &Frame, axis: Axis, keyfield: &str) -> Result<Self>;

    /// Replace values with their rank along `axis`: `Axis::Row` ranks within
    /// each row, `Axis::Column` within each column. Ties receive the average
    /// of the ranks they span; with `descending`, the largest value gets
    /// rank 1. NaN cells stay NaN and are excluded from ranking.
    fn rank(&self, axis: Axis, descending: bool) -> Result<Self>;

    /// Collapse rows (or columns) sharing a metadata field value into one
    /// aggregate row per value.
    ///
    /// Groups with several members reduce each column through `agg`; the
    /// group's field value becomes the new id, other annotation fields
    /// become the `"|"`-joined distinct member values, and an `n_agg` column
    /// records the group size. Single-member groups pass through with their
    /// id rewritten and `n_agg` of 1. The result is singletons (original
    /// relative order) followed by aggregated groups (discovery order).
    fn aggregate<F: Fn(&[f64]) -> f64>(&self, axis: Axis, field: &str, agg: F) -> Result<Self>;
}

impl MatrixTransforms for AnnMatrix {
    fn merge(&self, other: &Self, axis: Axis, matrix_only: bool) -> Result<Self> {
        match axis {
            Axis::Column => self
                .transpose()
                .merge(&other.transpose(), Axis::Row, matrix_only)
                .map(|merged| merged.transpose()),
            Axis::Row => merge_rows(self, other, matrix_only),
        }
    }

    fn annotate(&self, table: &Frame, axis: Axis, keyfield: &str) -> Result<Self> {
        if !table.has_column(keyfield) {
            return Err(MatrixError::MissingKeyField(keyfield.to_string()));
        }

        let mut keyed = table.clone();
        if keyfield != ID_COLUMN {
            if keyed.has_column(ID_COLUMN) {
                keyed.drop_column(ID_COLUMN);
            }
            keyed.rename_column(keyfield, ID_COLUMN)?;
        }

        let merged = self.meta(axis).left_merge(&keyed, &[ID_COLUMN], false)?;
        let (row_meta, col_meta) = match axis {
            Axis::Row => (merged, self.col_meta().clone()),
            Axis::Column => (self.row_meta().clone(), merged),
        };

        AnnMatrix::from_ordered(
            self.mat().clone(),
            self.row_ids().to_vec(),
            self.col_ids().to_vec(),
            row_meta,
            col_meta,
        )
    }

    fn rank(&self, axis: Axis, descending: bool) -> Result<Self> {
        let mut mat = self.mat().clone();
        match axis {
            Axis::Row => {
                for mut lane in mat.rows_mut() {
                    let ranks = rank_slice(&lane.to_vec(), descending);
                    for (cell, rank) in lane.iter_mut().zip(ranks) {
                        *cell = rank;
                    }
                }
            }
            Axis::Column => {
                for mut lane in mat.columns_mut() {
                    let ranks = rank_slice(&lane.to_vec(), descending);
                    for (cell, rank) in lane.iter_mut().zip(ranks) {
                        *cell = rank;
                    }
                }
            }
        }

        AnnMatrix::from_ordered(
            mat,
            self.row_ids().to_vec(),
            self.col_ids().to_vec(),
            self.row_meta().clone(),
            self.col_meta().clone(),
        )
    }

    fn aggregate<F: Fn(&[f64]) -> f64>(&self, axis: Axis, field: &str, agg: F) -> Result<Self> {
        if axis == Axis::Column {
            return self
                .transpose()
                .aggregate(Axis::Row, field, agg)
                .map(|collapsed| collapsed.transpose());
        }

        let groups = self.row_meta().group_indices(field)?;
        if groups.is_empty() {
            return Ok(self.clone());
        }

        let singles: Vec<(&String, usize)> = groups
            .iter()
            .filter(|(_, members)| members.len() == 1)
            .map(|(key, members)| (key, members[0]))
            .collect();
        let multis: Vec<(&String, &Vec<usize>)> = groups
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(key, members)| (key, members))
            .collect();

        let singles_obj = if singles.is_empty() {
            None
        } else {
            let indices: Vec<usize> = singles.iter().map(|(_, i)| *i).collect();
            let keys: Vec<String> = singles.iter().map(|(key, _)| (*key).clone()).collect();

            let sub = self.subset(&Selector::indices(indices), &Selector::All)?;
            let mut meta = sub.row_meta().clone();
            meta.set_column(
                ID_COLUMN,
                keys.iter().map(|k| Value::from(k.clone())).collect(),
            )?;
            meta.set_column("n_agg", vec![Value::Int(1); keys.len()])?;

            Some(AnnMatrix::from_ordered(
                sub.mat().clone(),
                keys,
                sub.col_ids().to_vec(),
                meta,
                sub.col_meta().clone(),
            )?)
        };

        let multis_obj = if multis.is_empty() {
            None
        } else {
            let n_cols = self.mat().ncols();
            let mut mat = Array2::from_elem((multis.len(), n_cols), f64::NAN);
            for (g, (_, members)) in multis.iter().enumerate() {
                for j in 0..n_cols {
                    let values: Vec<f64> =
                        members.iter().map(|&i| self.mat()[[i, j]]).collect();
                    mat[[g, j]] = agg(&values);
                }
            }

            let keys: Vec<String> = multis.iter().map(|(key, _)| (*key).clone()).collect();
            let mut meta = Frame::new();
            for name in self.row_meta().names() {
                let values: Vec<Value> = if name == ID_COLUMN {
                    keys.iter().map(|k| Value::from(k.clone())).collect()
                } else {
                    let column = self.row_meta().column(name).expect("iterating own names");
                    multis
                        .iter()
                        .map(|(_, members)| {
                            Value::from(joined_distinct(column, members))
                        })
                        .collect()
                };
                meta.push_column(name, values)?;
            }
            meta.set_column(
                "n_agg",
                multis
                    .iter()
                    .map(|(_, members)| Value::Int(members.len() as i64))
                    .collect(),
            )?;

            Some(AnnMatrix::from_ordered(
                mat,
                keys,
                self.col_ids().to_vec(),
                meta,
                self.col_meta().clone(),
            )?)
        };

        match (singles_obj, multis_obj) {
            (Some(singles), Some(multis)) => singles.merge(&multis, Axis::Row, false),
            (Some(singles), None) => Ok(singles),
            (None, Some(multis)) => Ok(multis),
            (None, None) => unreachable!("non-empty partition has at least one group"),
        }
    }
}

/// Load an annotation table from a delimited file and merge it into one
/// axis's metadata. Path-based convenience over [MatrixTransforms::annotate].
pub fn annotate_from_path<P: AsRef<Path>>(
    g: &AnnMatrix,
    path: P,
    axis: Axis,
    keyfield: &str,
) -> anyhow::Result<AnnMatrix> {
    let path = path.as_ref();
    let table = annmat_io::read_frame(path)
        .with_context(|| format!("Failed to read annotation table: {:?}", path))?;
    Ok(g.annotate(&table, axis, keyfield)?)
}

fn merge_rows(first: &AnnMatrix, second: &AnnMatrix, matrix_only: bool) -> Result<AnnMatrix> {
    // reconcile the column axis: union with first's labels leading
    let a = LabeledMatrix::from(first).pad(None, Some(second.col_ids()))?;
    let b = LabeledMatrix::from(second)
        .pad(None, Some(first.col_ids()))?
        .reorder_cols(&a.col_labels)?;

    let mat = concatenate(NdAxis(0), &[a.mat.view(), b.mat.view()])
        .map_err(|e| MatrixError::ShapeMismatch(e.to_string()))?;

    let mut row_ids = first.row_ids().to_vec();
    row_ids.extend(second.row_ids().iter().cloned());
    let col_ids = a.col_labels;

    if matrix_only {
        return AnnMatrix::new(mat, row_ids, col_ids, None, None);
    }

    let row_meta = first.row_meta().vstack(second.row_meta());

    // orthogonal metadata: union by id, first object wins on shared ids
    let known = build_index_map(first.col_ids());
    let second_only: Vec<usize> = second
        .col_ids()
        .iter()
        .enumerate()
        .filter(|(_, id)| !known.contains_key(id.as_str()))
        .map(|(j, _)| j)
        .collect();
    let col_meta = first.col_meta().vstack(&second.col_meta().take(&second_only));

    AnnMatrix::from_ordered(mat, row_ids, col_ids, row_meta, col_meta)
}

/// Average-tie ranks of a single row or column; NaN in, NaN out.
fn rank_slice(values: &[f64], descending: bool) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    order.sort_by(|&a, &b| {
        let cmp = values[a]
            .partial_cmp(&values[b])
            .expect("NaN filtered before sort");
        if descending { cmp.reverse() } else { cmp }
    });

    let mut ranks = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // ranks are 1-based; tied values share the average of their span
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn joined_distinct(column: &[Value], members: &[usize]) -> String {
    let mut distinct: Vec<String> = Vec::new();
    for &i in members {
        let rendered = column[i].render();
        if !distinct.contains(&rendered) {
            distinct.push(rendered);
        }
    }
    distinct.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    use annmat_core::stats::median;
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn ids(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    fn with_row_meta(
        mat: Array2<f64>,
        row_ids: &[&str],
        col_ids: &[&str],
        field: &str,
        values: &[&str],
    ) -> AnnMatrix {
        let mut meta = Frame::new();
        meta.push_column(ID_COLUMN, strs(row_ids)).unwrap();
        meta.push_column(field, strs(values)).unwrap();
        AnnMatrix::new(mat, ids(row_ids), ids(col_ids), Some(meta), None).unwrap()
    }

    #[rstest]
    fn test_merge_rows_disjoint_columns() {
        let g1 = AnnMatrix::new(array![[1.0, 2.0]], ids(&["r1"]), ids(&["c1", "c2"]), None, None)
            .unwrap();
        let g2 = AnnMatrix::new(array![[3.0, 4.0]], ids(&["r2"]), ids(&["c2", "c3"]), None, None)
            .unwrap();

        let merged = g1.merge(&g2, Axis::Row, false).unwrap();
        assert_eq!(merged.row_ids(), &ids(&["r1", "r2"])[..]);
        // first object's columns lead, second's new columns appended
        assert_eq!(merged.col_ids(), &ids(&["c1", "c2", "c3"])[..]);
        assert_eq!(merged.mat()[[0, 0]], 1.0);
        assert_eq!(merged.mat()[[0, 1]], 2.0);
        assert!(merged.mat()[[0, 2]].is_nan());
        assert!(merged.mat()[[1, 0]].is_nan());
        assert_eq!(merged.mat()[[1, 1]], 3.0);
        assert_eq!(merged.mat()[[1, 2]], 4.0);
    }

    #[rstest]
    fn test_merge_row_meta_column_union() {
        let g1 = with_row_meta(array![[1.0]], &["r1"], &["c1"], "gene", &["g1"]);
        let g2 = with_row_meta(array![[2.0]], &["r2"], &["c1"], "target", &["t1"]);

        let merged = g1.merge(&g2, Axis::Row, false).unwrap();
        assert_eq!(
            merged.row_meta().column("gene").unwrap(),
            &[Value::from("g1"), Value::Null][..]
        );
        assert_eq!(
            merged.row_meta().column("target").unwrap(),
            &[Value::Null, Value::from("t1")][..]
        );
    }

    #[rstest]
    fn test_merge_orthogonal_meta_first_wins() {
        let mut col_meta1 = Frame::new();
        col_meta1.push_column(ID_COLUMN, strs(&["c1"])).unwrap();
        col_meta1.push_column("lane", strs(&["L1"])).unwrap();
        let g1 = AnnMatrix::new(
            array![[1.0]],
            ids(&["r1"]),
            ids(&["c1"]),
            None,
            Some(col_meta1),
        )
        .unwrap();

        let mut col_meta2 = Frame::new();
        col_meta2.push_column(ID_COLUMN, strs(&["c1", "c2"])).unwrap();
        col_meta2.push_column("lane", strs(&["CONFLICT", "L2"])).unwrap();
        let g2 = AnnMatrix::new(
            array![[2.0, 3.0]],
            ids(&["r2"]),
            ids(&["c1", "c2"]),
            None,
            Some(col_meta2),
        )
        .unwrap();

        let merged = g1.merge(&g2, Axis::Row, false).unwrap();
        assert_eq!(merged.col_ids(), &ids(&["c1", "c2"])[..]);
        assert_eq!(
            merged.col_meta().column("lane").unwrap(),
            &[Value::from("L1"), Value::from("L2")][..]
        );
    }

    #[rstest]
    fn test_merge_columns_via_transpose() {
        let g1 = AnnMatrix::new(array![[1.0], [2.0]], ids(&["r1", "r2"]), ids(&["c1"]), None, None)
            .unwrap();
        let g2 = AnnMatrix::new(array![[3.0], [4.0]], ids(&["r1", "r2"]), ids(&["c2"]), None, None)
            .unwrap();

        let merged = g1.merge(&g2, Axis::Column, false).unwrap();
        assert_eq!(merged.shape(), (2, 2));
        assert_eq!(merged.col_ids(), &ids(&["c1", "c2"])[..]);
        assert_eq!(merged.mat(), &array![[1.0, 3.0], [2.0, 4.0]]);
    }

    #[rstest]
    fn test_merge_matrix_only() {
        let g1 = with_row_meta(array![[1.0]], &["r1"], &["c1"], "gene", &["g1"]);
        let g2 = with_row_meta(array![[2.0]], &["r2"], &["c1"], "gene", &["g2"]);

        let merged = g1.merge(&g2, Axis::Row, true).unwrap();
        assert_eq!(merged.row_meta().names(), &[ID_COLUMN]);
        assert_eq!(merged.shape(), (2, 1));
    }

    #[rstest]
    fn test_merge_then_subset_recovers_first() {
        let g1 = with_row_meta(
            array![[1.0, 2.0], [3.0, 4.0]],
            &["r1", "r2"],
            &["c1", "c2"],
            "gene",
            &["g1", "g2"],
        );
        let g2 = with_row_meta(
            array![[5.0, 6.0], [7.0, 8.0]],
            &["r3", "r4"],
            &["c1", "c2"],
            "gene",
            &["g3", "g4"],
        );

        let merged = g1.merge(&g2, Axis::Row, false).unwrap();
        let back = merged
            .subset(&Selector::labels(["r1", "r2"]), &Selector::All)
            .unwrap();
        assert_eq!(back, g1);
    }

    #[rstest]
    fn test_annotate_orders_and_warns_partial() {
        let g = with_row_meta(
            array![[1.0], [2.0], [3.0]],
            &["r1", "r2", "r3"],
            &["c1"],
            "gene",
            &["g1", "g2", "g1"],
        );

        let mut table = Frame::new();
        // shuffled order, covers r3 and r1 only, plus an unknown id
        table
            .push_column("probe", strs(&["r3", "zz", "r1"]))
            .unwrap();
        table
            .push_column("pathway", strs(&["p3", "pz", "p1"]))
            .unwrap();

        let annotated = g.annotate(&table, Axis::Row, "probe").unwrap();
        assert_eq!(annotated.row_ids(), g.row_ids());
        assert_eq!(
            annotated.row_meta().column("pathway").unwrap(),
            &[Value::from("p1"), Value::Null, Value::from("p3")][..]
        );
        // existing fields untouched
        assert_eq!(
            annotated.row_meta().column("gene").unwrap(),
            g.row_meta().column("gene").unwrap()
        );
    }

    #[rstest]
    fn test_annotate_missing_keyfield() {
        let g = with_row_meta(array![[1.0]], &["r1"], &["c1"], "gene", &["g1"]);
        let table = Frame::id_only(&ids(&["r1"]));
        assert!(matches!(
            g.annotate(&table, Axis::Row, "probe"),
            Err(MatrixError::MissingKeyField(_))
        ));
    }

    #[rstest]
    fn test_annotate_duplicate_key_fails() {
        let g = with_row_meta(array![[1.0]], &["r1"], &["c1"], "gene", &["g1"]);
        let mut table = Frame::new();
        table.push_column("probe", strs(&["r1", "r1"])).unwrap();
        table.push_column("pathway", strs(&["p1", "p2"])).unwrap();
        assert!(matches!(
            g.annotate(&table, Axis::Row, "probe"),
            Err(MatrixError::CartesianProduct(_))
        ));
    }

    #[rstest]
    fn test_rank_rows_descending_with_ties() {
        let g = AnnMatrix::new(
            array![[3.0, 1.0, 3.0, f64::NAN]],
            ids(&["r1"]),
            ids(&["c1", "c2", "c3", "c4"]),
            None,
            None,
        )
        .unwrap();

        let ranked = g.rank(Axis::Row, true).unwrap();
        // two 3.0s tie for ranks 1 and 2 -> 1.5 each; 1.0 ranks third
        assert_eq!(ranked.mat()[[0, 0]], 1.5);
        assert_eq!(ranked.mat()[[0, 1]], 3.0);
        assert_eq!(ranked.mat()[[0, 2]], 1.5);
        assert!(ranked.mat()[[0, 3]].is_nan());
    }

    #[rstest]
    fn test_rank_columns_ascending() {
        let g = AnnMatrix::new(
            array![[10.0], [30.0], [20.0]],
            ids(&["r1", "r2", "r3"]),
            ids(&["c1"]),
            None,
            None,
        )
        .unwrap();

        let ranked = g.rank(Axis::Column, false).unwrap();
        assert_eq!(ranked.mat(), &array![[1.0], [3.0], [2.0]]);
    }

    #[rstest]
    fn test_aggregate_rows_by_field() {
        // groups: a -> {r1, r2}, b -> {r3} (singleton), c -> {r4, r5}
        let g = with_row_meta(
            array![
                [1.0, 10.0],
                [3.0, 30.0],
                [5.0, 50.0],
                [7.0, 70.0],
                [9.0, 90.0]
            ],
            &["r1", "r2", "r3", "r4", "r5"],
            &["c1", "c2"],
            "gene",
            &["a", "a", "b", "c", "c"],
        );

        let collapsed = g.aggregate(Axis::Row, "gene", median).unwrap();

        // singletons first, then aggregated groups in discovery order
        assert_eq!(collapsed.row_ids(), &ids(&["b", "a", "c"])[..]);
        assert_eq!(collapsed.mat()[[0, 0]], 5.0);
        assert_eq!(collapsed.mat()[[1, 0]], 2.0); // median(1, 3)
        assert_eq!(collapsed.mat()[[1, 1]], 20.0);
        assert_eq!(collapsed.mat()[[2, 0]], 8.0); // median(7, 9)

        let n_agg = collapsed.row_meta().column("n_agg").unwrap();
        assert_eq!(n_agg, &[Value::Int(1), Value::Int(2), Value::Int(2)][..]);
    }

    #[rstest]
    fn test_aggregate_n_agg_totals_source_rows() {
        let g = with_row_meta(
            array![[1.0], [2.0], [3.0], [4.0]],
            &["r1", "r2", "r3", "r4"],
            &["c1"],
            "grp",
            &["x", "x", "x", "y"],
        );

        let collapsed = g.aggregate(Axis::Row, "grp", median).unwrap();
        let total: i64 = collapsed
            .row_meta()
            .column("n_agg")
            .unwrap()
            .iter()
            .map(|v| match v {
                Value::Int(n) => *n,
                _ => panic!("n_agg must be integral"),
            })
            .sum();
        assert_eq!(total as usize, g.shape().0);
    }

    #[rstest]
    fn test_aggregate_joins_distinct_annotations() {
        let mut meta = Frame::new();
        meta.push_column(ID_COLUMN, strs(&["r1", "r2", "r3"])).unwrap();
        meta.push_column("grp", strs(&["a", "a", "a"])).unwrap();
        meta.push_column("note", strs(&["n1", "n2", "n1"])).unwrap();
        let g = AnnMatrix::new(
            array![[1.0], [2.0], [3.0]],
            ids(&["r1", "r2", "r3"]),
            ids(&["c1"]),
            Some(meta),
            None,
        )
        .unwrap();

        let collapsed = g.aggregate(Axis::Row, "grp", median).unwrap();
        assert_eq!(collapsed.row_ids(), &ids(&["a"])[..]);
        assert_eq!(
            collapsed.row_meta().column("note").unwrap(),
            &[Value::from("n1|n2")][..]
        );
        assert_eq!(collapsed.mat()[[0, 0]], 2.0);
    }

    #[rstest]
    fn test_aggregate_columns_via_transpose() {
        let mut col_meta = Frame::new();
        col_meta.push_column(ID_COLUMN, strs(&["c1", "c2", "c3"])).unwrap();
        col_meta.push_column("cond", strs(&["t", "t", "u"])).unwrap();
        let g = AnnMatrix::new(
            array![[1.0, 3.0, 9.0]],
            ids(&["r1"]),
            ids(&["c1", "c2", "c3"]),
            None,
            Some(col_meta),
        )
        .unwrap();

        let collapsed = g.aggregate(Axis::Column, "cond", median).unwrap();
        assert_eq!(collapsed.shape(), (1, 2));
        assert_eq!(collapsed.col_ids(), &ids(&["u", "t"])[..]);
        assert_eq!(collapsed.mat(), &array![[9.0, 2.0]]);
        assert_eq!(
            collapsed.col_meta().column("n_agg").unwrap(),
            &[Value::Int(1), Value::Int(2)][..]
        );
    }

    #[rstest]
    fn test_aggregate_missing_field() {
        let g = with_row_meta(array![[1.0]], &["r1"], &["c1"], "gene", &["g1"]);
        assert!(matches!(
            g.aggregate(Axis::Row, "nope", median),
            Err(MatrixError::MissingColumn(_))
        ));
    }
}
