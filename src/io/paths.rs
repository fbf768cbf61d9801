//! Artifact locations under the data directory.

use std::path::{Path, PathBuf};

pub const RAW_PRICES: &str = "brent_prices.csv";
pub const PROCESSED: &str = "processed_data.csv";
pub const CHANGE_POINTS: &str = "change_points.csv";
pub const EVENT_IMPACTS: &str = "event_impacts.csv";
pub const EVENTS: &str = "events.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn raw_prices(&self) -> PathBuf {
        self.dir.join(RAW_PRICES)
    }

    pub fn processed(&self) -> PathBuf {
        self.dir.join(PROCESSED)
    }

    pub fn change_points(&self) -> PathBuf {
        self.dir.join(CHANGE_POINTS)
    }

    pub fn event_impacts(&self) -> PathBuf {
        self.dir.join(EVENT_IMPACTS)
    }

    /// Optional override of the built-in event list.
    pub fn events(&self) -> PathBuf {
        self.dir.join(EVENTS)
    }
}
