pub mod axis;
pub mod frame;
pub mod matrix;
pub mod selector;

// re-export for cleaner imports
pub use self::axis::Axis;
pub use self::frame::{Frame, ID_COLUMN, Value};
pub use self::matrix::AnnMatrix;
pub use self::selector::{Selector, resolve};
