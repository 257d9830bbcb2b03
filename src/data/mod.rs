//! Input data sources other than user-provided CSV files.

pub mod sample;

pub use sample::*;
