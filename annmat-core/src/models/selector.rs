use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{MatrixError, Result};
use crate::models::axis::Axis;
use crate::utils::build_index_map;

/// A validated row/column selector.
///
/// User-facing front-ends accept labels or positional indices (possibly as
/// floats); those are parsed once into this variant before any resolution
/// happens, so downstream code never re-inspects selector types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    /// The full axis, in its original order.
    All,
    /// Identifier labels, matched against the axis id vector.
    ByLabel(Vec<String>),
    /// Zero-based positional indices.
    ByIndex(Vec<usize>),
}

impl Selector {
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selector::ByLabel(labels.into_iter().map(|l| l.into()).collect())
    }

    pub fn indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        Selector::ByIndex(indices.into_iter().collect())
    }

    /// Interpret a float sequence as positional indices.
    ///
    /// Each value must be within `f64::EPSILON.sqrt()` of a non-negative
    /// integer; anything else fails with [MatrixError::InvalidSelector].
    pub fn from_floats(values: &[f64]) -> Result<Self> {
        let tolerance = f64::EPSILON.sqrt();
        let mut indices = Vec::with_capacity(values.len());
        for &value in values {
            let rounded = value.round();
            if !value.is_finite() || (value - rounded).abs() > tolerance {
                return Err(MatrixError::InvalidSelector(format!(
                    "non-integral index: {}",
                    value
                )));
            }
            if rounded < 0.0 {
                return Err(MatrixError::InvalidSelector(format!(
                    "negative index: {}",
                    value
                )));
            }
            indices.push(rounded as usize);
        }
        Ok(Selector::ByIndex(indices))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::All
    }
}

/// Resolve a selector against a reference id vector.
///
/// Returns the selected ids and their positions in `reference`, preserving
/// the order and multiplicity implied by the selector. An empty label or
/// index list means the same as [Selector::All]: the full axis in original
/// order. Labels with no match are dropped with a single aggregated
/// warning; out-of-bounds indices are fatal. A zero-length result is
/// allowed but warned as degenerate.
pub fn resolve(
    selector: &Selector,
    reference: &[String],
    axis: Axis,
) -> Result<(Vec<String>, Vec<usize>)> {
    let all = Selector::All;
    let selector = match selector {
        Selector::ByLabel(labels) if labels.is_empty() => &all,
        Selector::ByIndex(positions) if positions.is_empty() => &all,
        other => other,
    };

    let (ids, indices) = match selector {
        Selector::All => (reference.to_vec(), (0..reference.len()).collect()),
        Selector::ByLabel(labels) => {
            let index_map = build_index_map(reference);
            let mut ids = Vec::with_capacity(labels.len());
            let mut indices = Vec::with_capacity(labels.len());
            let mut unmatched: Vec<&String> = Vec::new();
            for label in labels {
                match index_map.get(label.as_str()) {
                    Some(&i) => {
                        ids.push(label.clone());
                        indices.push(i);
                    }
                    None => unmatched.push(label),
                }
            }
            if !unmatched.is_empty() {
                warn!(
                    "{} label(s) not found on {} axis: {:?}",
                    unmatched.len(),
                    axis,
                    unmatched
                );
            }
            (ids, indices)
        }
        Selector::ByIndex(positions) => {
            let mut ids = Vec::with_capacity(positions.len());
            for &i in positions {
                if i >= reference.len() {
                    return Err(MatrixError::InvalidSelector(format!(
                        "index {} out of bounds for {} axis of length {}",
                        i,
                        axis,
                        reference.len()
                    )));
                }
                ids.push(reference[i].clone());
            }
            (ids, positions.clone())
        }
    };

    if ids.is_empty() {
        warn!("selector resolved to an empty {} axis", axis);
    }

    Ok((ids, indices))
}
