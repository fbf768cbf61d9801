//! Serving payload for the presentation layer.
//!
//! Builds the JSON document a read-only endpoint would return: `prices`,
//! `events`, `changePoints` and `meta`. Field names follow the artifact
//! column vocabulary exactly. Every artifact also gets a status so a missing
//! or out-of-date artifact is never confused with an empty result.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::io::manifest::Manifest;
use crate::io::paths::{CHANGE_POINTS, EVENT_IMPACTS, PROCESSED, RAW_PRICES};
use crate::io::{
    ArtifactPaths, EventImpactRow, ProcessedRow, processed_rows, read_change_points, read_impacts, read_manifest,
    read_processed,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Ok,
    Missing,
    /// Built from an upstream artifact that has since been regenerated.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangePointRef {
    #[serde(rename = "Change_Point")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBlock {
    pub prices: ArtifactStatus,
    pub change_points: ArtifactStatus,
    pub events: ArtifactStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub prices_count: usize,
    pub events_count: usize,
    pub change_points_count: usize,
    pub generated_at: DateTime<Utc>,
    pub status: StatusBlock,
    /// True when any change point failed its convergence check.
    pub convergence_warning: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub prices: Vec<ProcessedRow>,
    pub events: Vec<EventImpactRow>,
    #[serde(rename = "changePoints")]
    pub change_points: Vec<ChangePointRef>,
    pub meta: Meta,
}

/// Status of one artifact given its upstream's manifest and status.
fn artifact_status(
    artifact: &Path,
    manifest: Option<&Manifest>,
    upstream_name: &str,
    upstream: Option<&Manifest>,
    upstream_status: ArtifactStatus,
    warnings: &mut Vec<String>,
) -> ArtifactStatus {
    if !artifact.exists() {
        return ArtifactStatus::Missing;
    }
    if upstream_status == ArtifactStatus::Stale {
        return ArtifactStatus::Stale;
    }
    let Some(manifest) = manifest else {
        warnings.push(format!("{} has no manifest; freshness unknown", artifact.display()));
        return ArtifactStatus::Ok;
    };
    match (manifest.upstream_generated_at(upstream_name), upstream) {
        (Some(recorded), Some(current)) if recorded != current.generated_at => ArtifactStatus::Stale,
        (Some(_), None) if upstream_status == ArtifactStatus::Missing => {
            warnings.push(format!(
                "{} was built from {upstream_name}, which is no longer present",
                artifact.display()
            ));
            ArtifactStatus::Ok
        }
        // Upstream replaced without a manifest: it no longer matches what was recorded.
        (Some(_), None) => ArtifactStatus::Stale,
        _ => ArtifactStatus::Ok,
    }
}

/// Read whatever artifacts exist and assemble the payload.
pub fn build_payload(paths: &ArtifactPaths) -> Result<DashboardPayload, AppError> {
    let mut warnings = Vec::new();

    let raw_path = paths.raw_prices();
    let processed_path = paths.processed();
    let cp_path = paths.change_points();
    let impacts_path = paths.event_impacts();

    let raw_manifest = read_manifest(&raw_path)?;
    let processed_manifest = read_manifest(&processed_path)?;
    let cp_manifest = read_manifest(&cp_path)?;
    let impacts_manifest = read_manifest(&impacts_path)?;

    // Raw input is not served; it only anchors the processed series' freshness.
    let raw_status = if raw_path.exists() {
        ArtifactStatus::Ok
    } else {
        ArtifactStatus::Missing
    };
    let prices_status = artifact_status(
        &processed_path,
        processed_manifest.as_ref(),
        RAW_PRICES,
        raw_manifest.as_ref(),
        raw_status,
        &mut warnings,
    );
    let cp_status = artifact_status(
        &cp_path,
        cp_manifest.as_ref(),
        PROCESSED,
        processed_manifest.as_ref(),
        prices_status,
        &mut warnings,
    );
    let events_status = artifact_status(
        &impacts_path,
        impacts_manifest.as_ref(),
        CHANGE_POINTS,
        cp_manifest.as_ref(),
        cp_status,
        &mut warnings,
    );

    let prices = if prices_status == ArtifactStatus::Missing {
        Vec::new()
    } else {
        let (p, r) = read_processed(&processed_path)?;
        processed_rows(&p, &r)
    };
    let estimates = if cp_status == ArtifactStatus::Missing {
        Vec::new()
    } else {
        read_change_points(&cp_path)?
    };
    let events = if events_status == ArtifactStatus::Missing {
        Vec::new()
    } else {
        read_impacts(&impacts_path)?
    };

    for (name, status) in [
        (PROCESSED, prices_status),
        (CHANGE_POINTS, cp_status),
        (EVENT_IMPACTS, events_status),
    ] {
        match status {
            ArtifactStatus::Ok => {}
            ArtifactStatus::Missing => warnings.push(format!("{name} is missing; run the pipeline")),
            ArtifactStatus::Stale => {
                warn!(artifact = name, "artifact is stale");
                warnings.push(format!("{name} is stale; re-run from this stage"))
            }
        }
    }

    let convergence_warning = estimates.iter().any(|e| !e.convergence.converged)
        || cp_manifest.as_ref().is_some_and(|m| !m.warnings.is_empty());

    let meta = Meta {
        prices_count: prices.len(),
        events_count: events.len(),
        change_points_count: estimates.len(),
        generated_at: Utc::now(),
        status: StatusBlock {
            prices: prices_status,
            change_points: cp_status,
            events: events_status,
        },
        convergence_warning,
        warnings,
    };
    debug!(
        prices = meta.prices_count,
        events = meta.events_count,
        change_points = meta.change_points_count,
        "dashboard payload assembled"
    );

    Ok(DashboardPayload {
        prices,
        events,
        change_points: estimates.iter().map(|e| ChangePointRef { date: e.date }).collect(),
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangePointEstimate, ConvergenceSummary, PriceObservation};
    use crate::io::{Manifest, write_change_points, write_impacts, write_manifest, write_processed};
    use crate::preprocess::log_returns;

    fn prices() -> Vec<PriceObservation> {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..5)
            .map(|i| PriceObservation {
                date: d0 + chrono::Days::new(i),
                price: 50.0 + i as f64,
            })
            .collect()
    }

    fn estimate() -> ChangePointEstimate {
        let date = NaiveDate::from_ymd_opt(2020, 1, 3).unwrap();
        ChangePointEstimate {
            index: 1,
            date,
            ci_low: 1,
            ci_high: 2,
            ci_low_date: date,
            ci_high_date: date,
            probability: 0.9,
            posterior_mean_pre: 0.0,
            posterior_mean_post: 0.01,
            posterior_std_pre: 0.01,
            posterior_std_post: 0.02,
            convergence: ConvergenceSummary {
                max_r_hat: Some(1.2),
                min_ess: 50.0,
                converged: false,
            },
        }
    }

    #[test]
    fn missing_artifacts_are_reported_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let payload = build_payload(&ArtifactPaths::new(dir.path())).unwrap();
        assert!(payload.prices.is_empty());
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Missing);
        assert_eq!(payload.meta.status.events, ArtifactStatus::Missing);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("changePoints").is_some());
        assert_eq!(json["meta"]["status"]["change_points"], "missing");
    }

    #[test]
    fn regenerated_upstream_marks_downstream_stale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let p = prices();
        let r = log_returns(&p);

        write_processed(&paths.processed(), &p, &r).unwrap();
        let processed_v1 = Manifest::new(PROCESSED, p.len());
        write_manifest(&paths.processed(), &processed_v1).unwrap();

        write_change_points(&paths.change_points(), &[estimate()]).unwrap();
        write_manifest(
            &paths.change_points(),
            &Manifest::new(CHANGE_POINTS, 1).with_upstream(&processed_v1),
        )
        .unwrap();
        write_impacts(&paths.event_impacts(), &[]).unwrap();

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Ok);
        assert_eq!(payload.meta.prices_count, 5);
        assert_eq!(payload.meta.change_points_count, 1);
        assert_eq!(payload.meta.events_count, 0);
        assert_eq!(payload.meta.status.events, ArtifactStatus::Ok);
        assert!(payload.meta.convergence_warning);

        // Re-running preprocessing invalidates the change points.
        let mut processed_v2 = Manifest::new(PROCESSED, p.len());
        processed_v2.generated_at = processed_v1.generated_at + chrono::Duration::seconds(5);
        write_manifest(&paths.processed(), &processed_v2).unwrap();

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Stale);
        assert_eq!(payload.change_points.len(), 1);
    }

    #[test]
    fn payload_uses_artifact_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let p = prices();
        write_processed(&paths.processed(), &p, &log_returns(&p)).unwrap();

        let json = serde_json::to_value(build_payload(&paths).unwrap()).unwrap();
        let first = &json["prices"][0];
        assert_eq!(first["Date"], "2020-01-01");
        assert_eq!(first["Price"], 50.0);
        assert!(first["Log_Return"].is_null());
        assert!(json["prices"][1]["Log_Return"].is_f64());
    }

    #[test]
    fn deleted_upstream_does_not_invalidate_derived_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let p = prices();

        std::fs::write(paths.raw_prices(), "Date,Price\n").unwrap();
        let raw = Manifest::new(RAW_PRICES, 0);
        write_manifest(&paths.raw_prices(), &raw).unwrap();
        write_processed(&paths.processed(), &p, &log_returns(&p)).unwrap();
        write_manifest(&paths.processed(), &Manifest::new(PROCESSED, p.len()).with_upstream(&raw)).unwrap();

        std::fs::remove_file(paths.raw_prices()).unwrap();
        std::fs::remove_file(crate::io::manifest_path(&paths.raw_prices())).unwrap();

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert!(payload.meta.warnings.iter().any(|w| w.contains("no longer present")));
    }

    #[test]
    fn upstream_without_manifest_marks_downstream_stale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let p = prices();

        write_processed(&paths.processed(), &p, &log_returns(&p)).unwrap();
        let processed = Manifest::new(PROCESSED, p.len());
        write_change_points(&paths.change_points(), &[estimate()]).unwrap();
        write_manifest(&paths.change_points(), &Manifest::new(CHANGE_POINTS, 1).with_upstream(&processed)).unwrap();

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Stale);
    }
}
