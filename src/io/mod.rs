//! Input/output helpers.
//!
//! - raw price and event-list ingest (`raw`, `events`)
//! - stage artifacts: processed series, change points, event impacts
//! - JSON manifests next to every artifact (`manifest`)
//! - atomic writes so a failed stage never leaves a partial file (`atomic`)

pub mod atomic;
pub mod change_points;
pub mod events;
pub mod impacts;
pub mod manifest;
pub mod paths;
pub mod processed;
pub mod raw;
pub mod table;

pub use atomic::write_atomic;
pub use change_points::{ChangePointRow, read_change_points, write_change_points};
pub use events::{ensure_unique_names, read_events};
pub use impacts::{EventImpactRow, read_impacts, write_impacts};
pub use manifest::{Manifest, UpstreamRef, manifest_path, publish, read_manifest, write_manifest};
pub use paths::ArtifactPaths;
pub use processed::{ProcessedRow, processed_rows, read_processed, write_processed};
pub use raw::{read_raw_prices, write_raw_prices};
