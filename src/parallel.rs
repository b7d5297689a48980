//! Parallel iteration abstraction.
//!
//! Engine loops over grid cells or variable pairs are embarrassingly
//! parallel. This module provides conditional parallel/sequential
//! iteration based on the `parallel` feature flag: on native targets with
//! the feature enabled, rayon drives the loop; otherwise the same code
//! compiles to a sequential iterator.
//!
//! # Usage
//!
//! ```ignore
//! use crate::iter_maybe_parallel;
//!
//! let per_cell: Vec<_> = iter_maybe_parallel!(0..ncells)
//!     .map(|cell| scan_runs(cell))
//!     .collect();
//! ```

/// Macro for conditionally parallel iteration over ranges and collections.
///
/// When the `parallel` feature is enabled, uses `into_par_iter()`.
/// Otherwise, uses `into_iter()` for sequential execution.
#[macro_export]
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

// Re-export at module level
pub use iter_maybe_parallel;
