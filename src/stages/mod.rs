//! The nine pipeline stages, in execution order:
//!
//! 1. `join`: attach date blocks and categories to transactions
//! 2. `features`: per-transaction revenue, price bucket, category group
//! 3. `catalog`: dense shop×item×month grid
//! 4. `missing`: defaults for test-only pairs
//! 5. `fill`: causal price fill and invariant categories
//! 6. `window`: lag rows for train targets and the predict month
//! 7. `trend`: lag-window summaries
//! 8. `calendar`: month-level calendar features
//! 9. `split`: train/validation/test partition
//!
//! Each stage consumes the previous stage's output type, so they cannot be
//! reordered by accident.

pub mod calendar;
pub mod catalog;
pub mod features;
pub mod fill;
pub mod join;
pub mod missing;
pub mod split;
pub mod trend;
pub mod window;
