//! Numerical utilities: descriptive statistics, least squares, ADF test.

pub mod adf;
pub mod describe;
pub mod ols;

pub use adf::*;
pub use describe::*;
pub use ols::*;
