//! Cross-axis extraction: select cells whose row and column annotations
//! agree on a shared field value.

use fxhash::FxHashSet;
use ndarray::Array2;

use annmat_core::errors::Result;
use annmat_core::models::{AnnMatrix, Axis, Frame, ID_COLUMN, Value};

use crate::transform::MatrixTransforms;

/// Options for [extract].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Annotation table merged into row metadata before extraction.
    pub row_annot: Option<Frame>,
    /// Annotation table merged into column metadata before extraction.
    pub col_annot: Option<Frame>,
    pub row_keyfield: String,
    pub col_keyfield: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            row_annot: None,
            col_annot: None,
            row_keyfield: ID_COLUMN.to_string(),
            col_keyfield: ID_COLUMN.to_string(),
        }
    }
}

/// Result bundle of [extract].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Cell selection mask, same shape as the matrix.
    pub mask: Array2<bool>,
    /// Selected (row, column) index pairs, in row-major scan order.
    pub indices: Vec<(usize, usize)>,
    /// Selected matrix values, in the same row-major order as `indices`.
    pub values: Vec<f64>,
    /// One row per selected cell: `row_id`, row annotations (prefixed
    /// `row_`), `col_id`, column annotations (prefixed `col_`), `value`.
    pub table: Frame,
}

///
/// Select every cell whose row's `row_field` value equals its column's
/// `col_field` value, over the values shared by both fields.
///
/// Null annotation values never participate in the match. If annotation
/// tables are supplied in `options`, both axes are annotated first (keyed by
/// the respective keyfield).
///
pub fn extract(
    g: &AnnMatrix,
    row_field: &str,
    col_field: &str,
    options: &ExtractOptions,
) -> Result<Extraction> {
    let mut annotated = g.clone();
    if let Some(table) = &options.row_annot {
        annotated = annotated.annotate(table, Axis::Row, &options.row_keyfield)?;
    }
    if let Some(table) = &options.col_annot {
        annotated = annotated.annotate(table, Axis::Column, &options.col_keyfield)?;
    }

    let row_values = annotated.row_meta().require_column(row_field)?;
    let col_values = annotated.col_meta().require_column(col_field)?;

    let row_set: FxHashSet<String> = row_values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.render())
        .collect();
    let shared: FxHashSet<String> = col_values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.render())
        .filter(|v| row_set.contains(v))
        .collect();

    let (n_rows, n_cols) = annotated.shape();
    let mut mask = Array2::from_elem((n_rows, n_cols), false);
    let mut indices: Vec<(usize, usize)> = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    let rendered_rows: Vec<Option<String>> = row_values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.render()))
        .collect();
    let rendered_cols: Vec<Option<String>> = col_values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.render()))
        .collect();

    for i in 0..n_rows {
        let Some(row_value) = &rendered_rows[i] else {
            continue;
        };
        if !shared.contains(row_value) {
            continue;
        }
        for j in 0..n_cols {
            let Some(col_value) = &rendered_cols[j] else {
                continue;
            };
            if row_value == col_value {
                mask[[i, j]] = true;
                indices.push((i, j));
                values.push(annotated.mat()[[i, j]]);
            }
        }
    }

    let table = build_cell_table(&annotated, &indices, &values)?;

    Ok(Extraction {
        mask,
        indices,
        values,
        table,
    })
}

fn build_cell_table(
    g: &AnnMatrix,
    indices: &[(usize, usize)],
    values: &[f64],
) -> Result<Frame> {
    let mut table = Frame::new();
    table.push_column(
        "row_id",
        indices
            .iter()
            .map(|(i, _)| Value::from(g.row_ids()[*i].clone()))
            .collect(),
    )?;
    for name in g.row_meta().names() {
        if name == ID_COLUMN {
            continue;
        }
        let column = g.row_meta().column(name).expect("iterating own names");
        table.push_column(
            &format!("row_{}", name),
            indices.iter().map(|(i, _)| column[*i].clone()).collect(),
        )?;
    }
    table.push_column(
        "col_id",
        indices
            .iter()
            .map(|(_, j)| Value::from(g.col_ids()[*j].clone()))
            .collect(),
    )?;
    for name in g.col_meta().names() {
        if name == ID_COLUMN {
            continue;
        }
        let column = g.col_meta().column(name).expect("iterating own names");
        table.push_column(
            &format!("col_{}", name),
            indices.iter().map(|(_, j)| column[*j].clone()).collect(),
        )?;
    }
    table.push_column("value", values.iter().map(|v| Value::Num(*v)).collect())?;
    Ok(table)
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

    /// Rows {A,B,C} carry genes {g1,g2,g1}; columns {x,y} carry targets
    /// {g1,g3}. Only (A,x) and (C,x) share a value.
    fn gene_target() -> AnnMatrix {
        let mut row_meta = Frame::new();
        row_meta.push_column(ID_COLUMN, strs(&["A", "B", "C"])).unwrap();
        row_meta.push_column("gene", strs(&["g1", "g2", "g1"])).unwrap();
        let mut col_meta = Frame::new();
        col_meta.push_column(ID_COLUMN, strs(&["x", "y"])).unwrap();
        col_meta.push_column("target", strs(&["g1", "g3"])).unwrap();
        AnnMatrix::new(
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
            ids(&["A", "B", "C"]),
            ids(&["x", "y"]),
            Some(row_meta),
            Some(col_meta),
        )
        .unwrap()
    }

    #[rstest]
    fn test_extract_gene_target() {
        let result = extract(
            &gene_target(),
            "gene",
            "target",
            &ExtractOptions::default(),
        )
        .unwrap();

        assert_eq!(result.indices, vec![(0, 0), (2, 0)]);
        assert_eq!(result.values, vec![1.0, 5.0]);
        assert!(result.mask[[0, 0]]);
        assert!(result.mask[[2, 0]]);
        assert_eq!(result.mask.iter().filter(|&&m| m).count(), 2);
    }

    #[rstest]
    fn test_extract_table_prefixes_annotations() {
        let result = extract(
            &gene_target(),
            "gene",
            "target",
            &ExtractOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.table.names(),
            &["row_id", "row_gene", "col_id", "col_target", "value"]
        );
        assert_eq!(result.table.n_rows(), 2);
        assert_eq!(
            result.table.column("row_id").unwrap(),
            &strs(&["A", "C"])[..]
        );
        assert_eq!(
            result.table.column("value").unwrap(),
            &[Value::Num(1.0), Value::Num(5.0)][..]
        );
    }

    #[rstest]
    fn test_extract_with_external_annotations() {
        let g = AnnMatrix::new(
            array![[1.0, 2.0], [3.0, 4.0]],
            ids(&["A", "B"]),
            ids(&["x", "y"]),
            None,
            None,
        )
        .unwrap();

        let mut row_annot = Frame::new();
        row_annot.push_column("probe", strs(&["A", "B"])).unwrap();
        row_annot.push_column("gene", strs(&["g1", "g2"])).unwrap();
        let mut col_annot = Frame::new();
        col_annot.push_column(ID_COLUMN, strs(&["x", "y"])).unwrap();
        col_annot.push_column("target", strs(&["g2", "g9"])).unwrap();

        let options = ExtractOptions {
            row_annot: Some(row_annot),
            col_annot: Some(col_annot),
            row_keyfield: "probe".to_string(),
            ..ExtractOptions::default()
        };
        let result = extract(&g, "gene", "target", &options).unwrap();
        assert_eq!(result.indices, vec![(1, 0)]);
        assert_eq!(result.values, vec![3.0]);
    }

    #[rstest]
    fn test_extract_missing_field() {
        let result = extract(
            &gene_target(),
            "nope",
            "target",
            &ExtractOptions::default(),
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn test_extract_null_values_never_match() {
        let mut row_meta = Frame::new();
        row_meta.push_column(ID_COLUMN, strs(&["A"])).unwrap();
        row_meta.push_column("gene", vec![Value::Null]).unwrap();
        let mut col_meta = Frame::new();
        col_meta.push_column(ID_COLUMN, strs(&["x"])).unwrap();
        col_meta.push_column("target", vec![Value::Null]).unwrap();
        let g = AnnMatrix::new(
            array![[1.0]],
            ids(&["A"]),
            ids(&["x"]),
            Some(row_meta),
            Some(col_meta),
        )
        .unwrap();

        let result = extract(&g, "gene", "target", &ExtractOptions::default()).unwrap();
        assert!(result.indices.is_empty());
    }
}
