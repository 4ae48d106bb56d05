use std::fmt::{self, Display};

use fxhash::FxHashMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{MatrixError, Result};

/// A single cell of an annotation table.
///
/// Metadata values are loosely typed: an annotation column may hold strings,
/// integers, or floats, and unmatched rows are filled with [Value::Null].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Num(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the cell as a plain string. [Value::Null] renders empty.
    ///
    /// Used for group keys and for the `"|"`-joined annotation summaries in
    /// aggregation, so two cells compare equal exactly when they render equal.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(v) => v.to_string(),
            Value::Num(v) => v.to_string(),
            Value::Str(v) => v.clone(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Num(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// Column name of the key column every annotation table is keyed by.
pub const ID_COLUMN: &str = "id";

/// A minimal column-oriented table: ordered column names mapped to
/// equal-length value vectors.
///
/// This is the relational backing for row/column annotation tables. It
/// supports exactly the operations the matrix operators need: filtering by
/// row indices, row concatenation with permissive column union, left merge
/// by key with left precedence, and group-by partitioning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    cols: FxHashMap<String, Vec<Value>>,
    nrows: usize,
}

impl Frame {
    pub fn new() -> Self {
        Frame::default()
    }

    /// Build an `id`-only table from a list of identifiers. This is the
    /// canonical "empty metadata" shape: no annotation fields, one row per id.
    pub fn id_only(ids: &[String]) -> Self {
        let mut frame = Frame::new();
        frame
            .push_column(ID_COLUMN, ids.iter().map(|id| Value::from(id.clone())).collect())
            .expect("id column on an empty frame");
        frame
    }

    pub fn n_rows(&self) -> usize {
        self.nrows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column names in table order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.cols.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.cols.get(name).map(|c| c.as_slice())
    }

    /// Column lookup that fails with [MatrixError::MissingColumn].
    pub fn require_column(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .ok_or_else(|| MatrixError::MissingColumn(name.to_string()))
    }

    /// Append a new column. Fails if the length disagrees with the current
    /// row count (unless the frame has no columns yet) or the name is taken.
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.cols.contains_key(name) {
            return Err(MatrixError::ShapeMismatch(format!(
                "column already exists: {}",
                name
            )));
        }
        if !self.names.is_empty() && values.len() != self.nrows {
            return Err(MatrixError::ShapeMismatch(format!(
                "column {} has {} rows, table has {}",
                name,
                values.len(),
                self.nrows
            )));
        }
        self.nrows = values.len();
        self.names.push(name.to_string());
        self.cols.insert(name.to_string(), values);
        Ok(())
    }

    /// Replace an existing column, or append it if absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.cols.contains_key(name) {
            if values.len() != self.nrows {
                return Err(MatrixError::ShapeMismatch(format!(
                    "column {} has {} rows, table has {}",
                    name,
                    values.len(),
                    self.nrows
                )));
            }
            self.cols.insert(name.to_string(), values);
            Ok(())
        } else {
            self.push_column(name, values)
        }
    }

    pub fn drop_column(&mut self, name: &str) {
        self.names.retain(|n| n != name);
        self.cols.remove(name);
        if self.names.is_empty() {
            self.nrows = 0;
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let values = self
            .cols
            .remove(from)
            .ok_or_else(|| MatrixError::MissingColumn(from.to_string()))?;
        // renaming onto an existing column replaces it
        if self.cols.contains_key(to) {
            self.names.retain(|n| n != to);
        }
        for name in self.names.iter_mut() {
            if name == from {
                *name = to.to_string();
            }
        }
        self.cols.insert(to.to_string(), values);
        Ok(())
    }

    /// A single row as (name, value) pairs in column order.
    pub fn row(&self, index: usize) -> Vec<(&str, &Value)> {
        self.names
            .iter()
            .map(|name| (name.as_str(), &self.cols[name][index]))
            .collect()
    }

    /// Filter and/or reorder rows by index. Indices may repeat; each
    /// occurrence produces one output row.
    pub fn take(&self, indices: &[usize]) -> Frame {
        self.take_opt(&indices.iter().map(|&i| Some(i)).collect::<Vec<_>>())
    }

    /// Like [Frame::take], but `None` entries produce null-filled rows.
    /// Used when re-synchronizing metadata to an axis with unannotated ids.
    pub fn take_opt(&self, indices: &[Option<usize>]) -> Frame {
        let mut out = Frame::new();
        for name in &self.names {
            let src = &self.cols[name];
            let values = indices
                .iter()
                .map(|idx| match idx {
                    Some(i) => src[*i].clone(),
                    None => Value::Null,
                })
                .collect();
            out.push_column(name, values).expect("columns share length");
        }
        out.nrows = indices.len();
        out
    }

    /// Row-concatenate two tables with permissive column union: columns
    /// missing from either side are null-filled for that side's rows.
    /// Output column order is `self`'s columns followed by `other`-only ones.
    pub fn vstack(&self, other: &Frame) -> Frame {
        let mut names = self.names.clone();
        for name in &other.names {
            if !self.cols.contains_key(name) {
                names.push(name.clone());
            }
        }

        let mut out = Frame::new();
        for name in &names {
            let mut values: Vec<Value> = Vec::with_capacity(self.nrows + other.nrows);
            match self.cols.get(name) {
                Some(col) => values.extend(col.iter().cloned()),
                None => values.extend(std::iter::repeat(Value::Null).take(self.nrows)),
            }
            match other.cols.get(name) {
                Some(col) => values.extend(col.iter().cloned()),
                None => values.extend(std::iter::repeat(Value::Null).take(other.nrows)),
            }
            out.push_column(name, values).expect("columns share length");
        }
        out.nrows = self.nrows + other.nrows;
        out
    }

    /// Left merge with left precedence.
    ///
    /// Every key column in `by` must exist in both tables. Columns present in
    /// both tables (other than the keys) are taken from `self`; `other`'s
    /// conflicting columns are dropped before joining. Every row of `self`
    /// appears in the result in its original position; rows with no match in
    /// `other` get null fills for `other`-only columns and trigger a single
    /// aggregated warning.
    ///
    /// A key of `self` matching several rows of `other` expands to one output
    /// row per match when `allow_many` is set, and fails with
    /// [MatrixError::CartesianProduct] otherwise.
    pub fn left_merge(&self, other: &Frame, by: &[&str], allow_many: bool) -> Result<Frame> {
        for key in by {
            if !self.has_column(key) || !other.has_column(key) {
                return Err(MatrixError::MissingColumn(key.to_string()));
            }
        }

        // columns contributed by the secondary table: not a key, not already
        // present in the primary (left precedence)
        let incoming: Vec<&String> = other
            .names
            .iter()
            .filter(|name| !by.contains(&name.as_str()) && !self.has_column(name))
            .collect();

        // key -> secondary row indices, built once
        let mut key_map: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for i in 0..other.nrows {
            key_map.entry(other.join_key(by, i)).or_default().push(i);
        }

        let mut left_idx: Vec<usize> = Vec::with_capacity(self.nrows);
        let mut right_idx: Vec<Option<usize>> = Vec::with_capacity(self.nrows);
        let mut unmatched: Vec<String> = Vec::new();
        let mut expanded: Vec<String> = Vec::new();

        for i in 0..self.nrows {
            let key = self.join_key(by, i);
            match key_map.get(&key) {
                None => {
                    unmatched.push(key);
                    left_idx.push(i);
                    right_idx.push(None);
                }
                Some(matches) if matches.len() == 1 => {
                    left_idx.push(i);
                    right_idx.push(Some(matches[0]));
                }
                Some(matches) => {
                    if !allow_many {
                        return Err(MatrixError::CartesianProduct(key));
                    }
                    expanded.push(key);
                    for &j in matches {
                        left_idx.push(i);
                        right_idx.push(Some(j));
                    }
                }
            }
        }

        if !unmatched.is_empty() {
            warn!(
                "{} key(s) with no match in secondary table: {:?}",
                unmatched.len(),
                unmatched
            );
        }

        let mut out = self.take(&left_idx);
        for name in incoming {
            let src = &other.cols[name];
            let values = right_idx
                .iter()
                .map(|idx| match idx {
                    Some(j) => src[*j].clone(),
                    None => Value::Null,
                })
                .collect();
            out.push_column(name, values)?;
        }

        Ok(out)
    }

    /// Partition row indices by the rendered value of `field`, in first-seen
    /// order. Null cells group under the empty string.
    pub fn group_indices(&self, field: &str) -> Result<Vec<(String, Vec<usize>)>> {
        let column = self.require_column(field)?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, value) in column.iter().enumerate() {
            let key = value.render();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(i);
        }

        Ok(order
            .into_iter()
            .map(|key| {
                let indices = groups.remove(&key).expect("key recorded on first sight");
                (key, indices)
            })
            .collect())
    }

    fn join_key(&self, by: &[&str], row: usize) -> String {
        by.iter()
            .map(|key| self.cols[*key][row].render())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}
