use std::path::Path;

use annmat_core::models::{AnnMatrix, Selector};

use crate::error::Result;

/// The persistence boundary the matrix core depends on.
///
/// Implementations must round-trip an object exactly: ids, axis order,
/// metadata columns, and non-missing values (within float tolerance) all
/// survive `store` followed by `load`. Selectors follow the usual
/// resolution semantics and may be pushed down to the storage layer for
/// partial reads.
pub trait MatrixStore {
    ///
    /// Load a stored object, optionally restricted to the selected rows and
    /// columns. With `matrix_only`, annotation tables are skipped and the
    /// result carries id-only metadata.
    ///
    fn load<T: AsRef<Path>>(
        &self,
        path: T,
        rows: &Selector,
        cols: &Selector,
        matrix_only: bool,
    ) -> Result<AnnMatrix>;

    ///
    /// Persist the matrix, both id vectors, and both annotation tables.
    ///
    fn store<T: AsRef<Path>>(&self, path: T, g: &AnnMatrix) -> Result<()>;
}
