//! Reporting utilities: plain-text stage summaries for the terminal.

pub mod format;

pub use format::*;
