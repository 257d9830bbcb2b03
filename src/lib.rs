//! `demand-grid` library crate.
//!
//! The binary (`dg`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - stages are reusable from other front-ends (notebooks, services)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod stages;
