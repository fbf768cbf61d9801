//! Data acquisition: FRED download, curated events, synthetic series.

pub mod events;
pub mod fred;
pub mod synthetic;

pub use events::curated_events;
pub use fred::{FredClient, FredObservation, SERIES_BRENT};
pub use synthetic::{Regime, simulate_prices};
