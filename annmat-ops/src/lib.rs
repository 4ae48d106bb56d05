//! Structural operators over annotated matrices.
//!
//! This crate provides the transformation family built on
//! [annmat_core::models::AnnMatrix]:
//!
//! - aligning several labeled matrices onto a shared label universe
//!   (union with NaN padding, or intersection)
//! - merging two objects along an axis with automatic reconciliation of
//!   the orthogonal axis
//! - merging external annotation tables into axis metadata
//! - rank transformation with average tie-breaking
//! - wide-to-long reshaping (melt)
//! - cross-axis extraction of cells whose row and column annotations agree
//! - group-wise aggregation of rows or columns by an annotation field
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use annmat_core::models::{AnnMatrix, Axis};
//! use annmat_core::stats::median;
//! use annmat_ops::MatrixTransforms;
//!
//! let g1 = AnnMatrix::new(
//!     array![[1.0]],
//!     vec!["r1".into()],
//!     vec!["c1".into()],
//!     None,
//!     None,
//! )
//! .unwrap();
//! let g2 = AnnMatrix::new(
//!     array![[2.0]],
//!     vec!["r2".into()],
//!     vec!["c1".into()],
//!     None,
//!     None,
//! )
//! .unwrap();
//!
//! let merged = g1.merge(&g2, Axis::Row, false).unwrap();
//! assert_eq!(merged.shape(), (2, 1));
//! ```

pub mod align;
pub mod extract;
pub mod melt;
pub mod transform;

// re-exports
pub use align::{AlignedStack, LabeledMatrix, align, align_stacked};
pub use extract::{ExtractOptions, Extraction, extract};
pub use melt::{MeltOptions, melt};
pub use transform::{MatrixTransforms, annotate_from_path};
