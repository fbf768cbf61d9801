//! `brent-regimes` library crate.
//!
//! The binary (`regimes`) is a thin wrapper around this library so that:
//!
//! - every pipeline stage is testable without spawning processes
//! - the dashboard payload can be served by something other than the CLI
//! - the model code stays independent of file formats

pub mod app;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod impact;
pub mod io;
pub mod logging;
pub mod math;
pub mod preprocess;
pub mod report;
