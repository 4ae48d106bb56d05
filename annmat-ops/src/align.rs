//! Alignment of labeled matrices onto shared label universes.
//!
//! Alignment makes several matrices directly comparable element-wise by
//! padding them onto the union of their labels (missing cells become NaN) or
//! restricting them to the intersection, with a canonical lexicographic
//! ordering in both modes.

use std::collections::BTreeSet;

use log::warn;
use ndarray::{Array2, Array3, Axis as NdAxis, s};

use annmat_core::errors::{MatrixError, Result};
use annmat_core::models::AnnMatrix;
use annmat_core::utils::{build_index_map, duplicate_labels};

/// A numeric matrix with row and column labels but no annotation tables:
/// the aligner's working representation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub mat: Array2<f64>,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// Identifies the slice in stacked output.
    pub name: Option<String>,
}

impl LabeledMatrix {
    pub fn new(mat: Array2<f64>, row_labels: Vec<String>, col_labels: Vec<String>) -> Result<Self> {
        if mat.nrows() != row_labels.len() || mat.ncols() != col_labels.len() {
            return Err(MatrixError::ShapeMismatch(format!(
                "matrix is {}x{} but {} row and {} column labels were given",
                mat.nrows(),
                mat.ncols(),
                row_labels.len(),
                col_labels.len()
            )));
        }
        Ok(LabeledMatrix {
            mat,
            row_labels,
            col_labels,
            name: None,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Alignment requires pairwise-unique labels on both axes.
    fn check_unique(&self) -> Result<()> {
        for (axis, labels) in [("row", &self.row_labels), ("column", &self.col_labels)] {
            if let Some(label) = duplicate_labels(labels).into_iter().next() {
                return Err(MatrixError::DuplicateLabel {
                    axis: axis.to_string(),
                    label,
                });
            }
        }
        Ok(())
    }

    ///
    /// Pad the matrix with NaN rows/columns for every universe label it does
    /// not already carry. Existing cells keep their positions; new labels are
    /// appended in universe order. An absent universe leaves that axis alone.
    ///
    pub fn pad(
        &self,
        row_universe: Option<&[String]>,
        col_universe: Option<&[String]>,
    ) -> Result<LabeledMatrix> {
        self.check_unique()?;

        let mut row_labels = self.row_labels.clone();
        if let Some(universe) = row_universe {
            let present = build_index_map(&self.row_labels);
            row_labels.extend(
                universe
                    .iter()
                    .filter(|l| !present.contains_key(l.as_str()))
                    .cloned(),
            );
        }
        let mut col_labels = self.col_labels.clone();
        if let Some(universe) = col_universe {
            let present = build_index_map(&self.col_labels);
            col_labels.extend(
                universe
                    .iter()
                    .filter(|l| !present.contains_key(l.as_str()))
                    .cloned(),
            );
        }

        let mut mat = Array2::from_elem((row_labels.len(), col_labels.len()), f64::NAN);
        mat.slice_mut(s![..self.mat.nrows(), ..self.mat.ncols()])
            .assign(&self.mat);

        Ok(LabeledMatrix {
            mat,
            row_labels,
            col_labels,
            name: self.name.clone(),
        })
    }

    /// Reorder the column axis only, leaving rows untouched.
    pub fn reorder_cols(&self, col_order: &[String]) -> Result<LabeledMatrix> {
        self.reorder(&self.row_labels, col_order)
    }

    /// Restrict and reorder both axes to the given label orderings. Every
    /// requested label must be present.
    pub fn reorder(&self, row_order: &[String], col_order: &[String]) -> Result<LabeledMatrix> {
        let row_map = build_index_map(&self.row_labels);
        let col_map = build_index_map(&self.col_labels);

        let row_idx = row_order
            .iter()
            .map(|l| {
                row_map.get(l.as_str()).copied().ok_or_else(|| {
                    MatrixError::ShapeMismatch(format!("row label not present: {}", l))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let col_idx = col_order
            .iter()
            .map(|l| {
                col_map.get(l.as_str()).copied().ok_or_else(|| {
                    MatrixError::ShapeMismatch(format!("column label not present: {}", l))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LabeledMatrix {
            mat: self
                .mat
                .select(NdAxis(0), &row_idx)
                .select(NdAxis(1), &col_idx),
            row_labels: row_order.to_vec(),
            col_labels: col_order.to_vec(),
            name: self.name.clone(),
        })
    }
}

impl From<&AnnMatrix> for LabeledMatrix {
    fn from(g: &AnnMatrix) -> Self {
        LabeledMatrix {
            mat: g.mat().clone(),
            row_labels: g.row_ids().to_vec(),
            col_labels: g.col_ids().to_vec(),
            name: None,
        }
    }
}

///
/// Align matrices onto a shared label universe so they become directly
/// comparable element-wise.
///
/// With `pad` set, every matrix is NaN-padded to the union of row labels and
/// the union of column labels; without it, every matrix is restricted to the
/// labels common to all inputs. Both universes are ordered lexicographically.
/// Duplicate labels in any input are fatal.
///
pub fn align(matrices: &[LabeledMatrix], pad: bool) -> Result<Vec<LabeledMatrix>> {
    for m in matrices {
        m.check_unique()?;
    }
    if matrices.is_empty() {
        return Ok(Vec::new());
    }

    let (row_universe, col_universe) = if pad {
        (
            sorted_union(matrices.iter().map(|m| &m.row_labels)),
            sorted_union(matrices.iter().map(|m| &m.col_labels)),
        )
    } else {
        let rows = sorted_intersection(matrices.iter().map(|m| &m.row_labels));
        let cols = sorted_intersection(matrices.iter().map(|m| &m.col_labels));
        if rows.is_empty() || cols.is_empty() {
            warn!("alignment intersection is empty on at least one axis");
        }
        (rows, cols)
    };

    matrices
        .iter()
        .map(|m| {
            let padded = if pad {
                m.pad(Some(&row_universe), Some(&col_universe))?
            } else {
                m.clone()
            };
            padded.reorder(&row_universe, &col_universe)
        })
        .collect()
}

/// Aligned matrices stacked into one 3-axis array, matrix index last.
#[derive(Debug, Clone)]
pub struct AlignedStack {
    /// Shape (rows, columns, matrices).
    pub data: Array3<f64>,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// One name per slice, from [LabeledMatrix::name] or `matrix_<i>`.
    pub names: Vec<String>,
}

/// [align], then stack the same-shape results along a third axis.
pub fn align_stacked(matrices: &[LabeledMatrix], pad: bool) -> Result<AlignedStack> {
    if matrices.is_empty() {
        return Err(MatrixError::ShapeMismatch(
            "cannot stack zero matrices".to_string(),
        ));
    }

    let aligned = align(matrices, pad)?;
    let views: Vec<_> = aligned.iter().map(|m| m.mat.view()).collect();
    let data = ndarray::stack(NdAxis(2), &views)
        .map_err(|e| MatrixError::ShapeMismatch(e.to_string()))?;

    Ok(AlignedStack {
        data,
        row_labels: aligned[0].row_labels.clone(),
        col_labels: aligned[0].col_labels.clone(),
        names: aligned
            .iter()
            .enumerate()
            .map(|(i, m)| m.name.clone().unwrap_or_else(|| format!("matrix_{}", i)))
            .collect(),
    })
}

fn sorted_union<'a, I: Iterator<Item = &'a Vec<String>>>(label_sets: I) -> Vec<String> {
    let mut union: BTreeSet<&String> = BTreeSet::new();
    for labels in label_sets {
        union.extend(labels.iter());
    }
    union.into_iter().cloned().collect()
}

fn sorted_intersection<'a, I: Iterator<Item = &'a Vec<String>>>(label_sets: I) -> Vec<String> {
    let mut sets = label_sets.map(|labels| labels.iter().collect::<BTreeSet<_>>());
    let mut common = match sets.next() {
        Some(first) => first,
        None => return Vec::new(),
    };
    for set in sets {
        common = common.intersection(&set).copied().collect();
    }
    common.into_iter().cloned().collect()
}
