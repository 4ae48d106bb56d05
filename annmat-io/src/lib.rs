//! # Input/Output boundary for annotated matrices.
//!
//! The matrix core treats persistence as a collaborator: anything that can
//! load and store an object behind the [MatrixStore] trait works. This crate
//! defines that boundary plus [TsvDirStore], a plain tab-separated directory
//! store (gz-aware in both directions) that exercises the full round-trip
//! contract in tests.
//!
pub mod error;
pub mod store;
pub mod tsv;

// re-expose core functions
pub use error::*;
pub use store::*;
pub use tsv::{TsvDirStore, read_frame};
