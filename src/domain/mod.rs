//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - price/return observations and curated events
//! - model outputs (`ChangePointEstimate`, `EventImpact`) and non-fatal outcomes
//! - stage configurations (`ModelConfig`, `AssociationConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
