//! Wide-to-long reshaping of annotated matrices.

use log::warn;

use annmat_core::errors::Result;
use annmat_core::models::{AnnMatrix, Frame, ID_COLUMN, Value};
use annmat_core::utils::float_eq;

/// Options for [melt].
#[derive(Debug, Clone)]
pub struct MeltOptions {
    /// Attach row annotation columns to every output row.
    pub keep_row_meta: bool,
    /// Attach column annotation columns to every output row.
    pub keep_col_meta: bool,
    /// For a numerically symmetric matrix, emit only the strict upper
    /// triangle (diagonal excluded).
    pub remove_symmetric_redundancy: bool,
    /// Labels appended to row/column annotation names that collide across
    /// axes. Positional `.row`/`.col` tags are used when unset.
    pub suffixes: Option<(String, String)>,
}

impl Default for MeltOptions {
    fn default() -> Self {
        MeltOptions {
            keep_row_meta: true,
            keep_col_meta: true,
            remove_symmetric_redundancy: false,
            suffixes: None,
        }
    }
}

///
/// Reshape the matrix to long form: one output row per non-missing cell,
/// as `(row_id, col_id, value)` plus the requested annotation columns.
///
/// NaN cells are never emitted. Cells are scanned in row-major order.
///
pub fn melt(g: &AnnMatrix, options: &MeltOptions) -> Result<Frame> {
    let upper_triangle_only = if options.remove_symmetric_redundancy {
        let symmetric = is_symmetric(g);
        if !symmetric {
            warn!("matrix is not symmetric; emitting all cells");
        }
        symmetric
    } else {
        false
    };

    let (n_rows, n_cols) = g.shape();
    let mut cells: Vec<(usize, usize)> = Vec::new();
    for i in 0..n_rows {
        for j in 0..n_cols {
            if g.mat()[[i, j]].is_nan() {
                continue;
            }
            if upper_triangle_only && j <= i {
                continue;
            }
            cells.push((i, j));
        }
    }

    let (row_suffix, col_suffix) = match &options.suffixes {
        Some((row, col)) => (row.clone(), col.clone()),
        None => (".row".to_string(), ".col".to_string()),
    };

    let row_fields: Vec<&String> = if options.keep_row_meta {
        g.row_meta().names().iter().filter(|n| *n != ID_COLUMN).collect()
    } else {
        Vec::new()
    };
    let col_fields: Vec<&String> = if options.keep_col_meta {
        g.col_meta().names().iter().filter(|n| *n != ID_COLUMN).collect()
    } else {
        Vec::new()
    };

    let mut long = Frame::new();
    long.push_column(
        "row_id",
        cells
            .iter()
            .map(|(i, _)| Value::from(g.row_ids()[*i].clone()))
            .collect(),
    )?;
    long.push_column(
        "col_id",
        cells
            .iter()
            .map(|(_, j)| Value::from(g.col_ids()[*j].clone()))
            .collect(),
    )?;
    long.push_column(
        "value",
        cells
            .iter()
            .map(|(i, j)| Value::Num(g.mat()[[*i, *j]]))
            .collect(),
    )?;

    for name in &row_fields {
        let out_name = if col_fields.contains(name) {
            format!("{}{}", name, row_suffix)
        } else {
            (*name).clone()
        };
        let column = g.row_meta().column(name).expect("iterating own names");
        long.push_column(
            &out_name,
            cells.iter().map(|(i, _)| column[*i].clone()).collect(),
        )?;
    }
    for name in &col_fields {
        let out_name = if row_fields.contains(name) {
            format!("{}{}", name, col_suffix)
        } else {
            (*name).clone()
        };
        let column = g.col_meta().column(name).expect("iterating own names");
        long.push_column(
            &out_name,
            cells.iter().map(|(_, j)| column[*j].clone()).collect(),
        )?;
    }

    Ok(long)
}

fn is_symmetric(g: &AnnMatrix) -> bool {
    let (n_rows, n_cols) = g.shape();
    if n_rows != n_cols {
        return false;
    }
    for i in 0..n_rows {
        for j in (i + 1)..n_cols {
            if !float_eq(g.mat()[[i, j]], g.mat()[[j, i]]) {
                return false;
            }
        }
    }
    true
}
