//! Core data model for annotated numeric matrices.
//!
//! An annotated matrix couples three structures that must stay mutually
//! consistent: a dense numeric matrix, a row annotation table, and a column
//! annotation table, with unique string identifiers on both axes. This crate
//! owns that model and its invariants:
//!
//! - [models::AnnMatrix]: the central object, re-validated on every
//!   construction and mutation
//! - [models::Frame]: a minimal column-oriented table with the relational
//!   operations the matrix operators need
//! - [models::Selector]: typed row/column selectors and their resolution
//!   against an axis
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use annmat_core::models::{AnnMatrix, Selector};
//!
//! let g = AnnMatrix::new(
//!     array![[1.0, 2.0], [3.0, 4.0]],
//!     vec!["r1".into(), "r2".into()],
//!     vec!["c1".into(), "c2".into()],
//!     None,
//!     None,
//! )
//! .unwrap();
//!
//! let sub = g.subset(&Selector::labels(["r2"]), &Selector::All).unwrap();
//! assert_eq!(sub.shape(), (1, 2));
//! ```

pub mod errors;
pub mod models;
pub mod stats;
pub mod utils;

pub use errors::MatrixError;
