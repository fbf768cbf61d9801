//! Stage runners shared by the individual subcommands and `regimes run`.
//!
//! Every stage follows the same shape:
//! read upstream artifact -> compute -> write artifact + manifest
//!
//! Artifacts are only written once the computation has succeeded, so a failed
//! stage leaves whatever the previous successful run produced in place.

use std::path::Path;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::data::{FredClient, Regime, SERIES_BRENT, curated_events, simulate_prices};
use crate::domain::{AssociationConfig, Event, ModelConfig};
use crate::error::AppError;
use crate::fit::{ChangePointRun, fit_change_point};
use crate::impact::{Association, associate_events};
use crate::io::{
    ArtifactPaths, Manifest, publish, read_change_points, read_events, read_manifest, read_processed,
    read_raw_prices, write_change_points, write_impacts, write_processed, write_raw_prices,
};
use crate::io::paths::{CHANGE_POINTS, EVENT_IMPACTS, PROCESSED, RAW_PRICES};
use crate::preprocess::{Preprocessed, SeriesSummary, Stationarity, preprocess, stationarity, summarize};

/// Everything `regimes preprocess` reports.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub preprocessed: Preprocessed,
    pub summary: SeriesSummary,
    pub stationarity: Stationarity,
}

/// Where the event list for an association run came from.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    File(String),
    Curated,
}

fn require_input(path: &Path, producer: &str) -> Result<(), AppError> {
    if path.exists() {
        return Ok(());
    }
    Err(AppError::io(
        path,
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input missing; run `regimes {producer}` first"),
        ),
    ))
}

fn manifest_with_upstream(mut manifest: Manifest, upstream: &[Option<Manifest>]) -> Manifest {
    for m in upstream.iter().flatten() {
        manifest = manifest.with_upstream(m);
    }
    manifest
}

/// Download Brent spot prices from FRED into the raw price file.
pub fn run_fetch(paths: &ArtifactPaths, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<usize, AppError> {
    let client = FredClient::from_env()?;
    let observations = client.fetch_series(SERIES_BRENT, start, end)?;
    let missing = observations.iter().filter(|o| o.price.is_none()).count();
    let rows: Vec<(String, String)> = observations.iter().map(|o| o.to_raw()).collect();

    let path = paths.raw_prices();
    let manifest = Manifest::new(RAW_PRICES, rows.len()).with_details(json!({
        "source": "fred",
        "series_id": SERIES_BRENT,
        "start": start,
        "end": end,
        "missing_values": missing,
    }));
    publish(&path, &manifest, |p| write_raw_prices(p, &rows))?;

    info!(rows = rows.len(), missing, path = %path.display(), "wrote raw prices");
    Ok(rows.len())
}

/// Write a synthetic raw price file; the manifest records the true switch indices.
pub fn run_simulate(
    paths: &ArtifactPaths,
    regimes: &[Regime],
    start: NaiveDate,
    start_price: f64,
    seed: u64,
) -> Result<usize, AppError> {
    let prices = simulate_prices(regimes, start, start_price, seed)?;
    let rows: Vec<(String, String)> = prices
        .iter()
        .map(|p| (p.date.format("%Y-%m-%d").to_string(), p.price.to_string()))
        .collect();

    let switches: Vec<usize> = regimes
        .iter()
        .scan(0usize, |acc, r| {
            *acc += r.len;
            Some(*acc)
        })
        .take(regimes.len().saturating_sub(1))
        .collect();

    let path = paths.raw_prices();
    let manifest = Manifest::new(RAW_PRICES, rows.len()).with_details(json!({
        "source": "synthetic",
        "seed": seed,
        "regimes": regimes
            .iter()
            .map(|r| json!({ "len": r.len, "mu": r.mu, "sigma": r.sigma }))
            .collect::<Vec<_>>(),
        "true_change_indices": switches,
    }));
    publish(&path, &manifest, |p| write_raw_prices(p, &rows))?;

    info!(rows = rows.len(), seed, ?switches, path = %path.display(), "wrote synthetic prices");
    Ok(rows.len())
}

/// Clean the raw price file and write the processed series.
pub fn run_preprocess(paths: &ArtifactPaths) -> Result<PreprocessOutput, AppError> {
    let raw_path = paths.raw_prices();
    require_input(&raw_path, "fetch")?;
    let raw_manifest = read_manifest(&raw_path)?;
    let records = read_raw_prices(&raw_path)?;

    let preprocessed = preprocess(&records)?;
    for d in &preprocessed.dropped {
        warn!(line = d.line, reason = %d.reason, "dropped raw row");
    }
    if preprocessed.duplicates > 0 {
        warn!(count = preprocessed.duplicates, "discarded duplicate dates");
    }

    let summary = summarize(&preprocessed.prices, &preprocessed.returns)
        .ok_or_else(|| AppError::data("no prices survived preprocessing"))?;
    let stationarity = stationarity(&preprocessed.prices, &preprocessed.returns);

    let path = paths.processed();
    let warnings = preprocessed
        .dropped
        .iter()
        .map(|d| format!("line {}: {}", d.line, d.reason));
    let manifest = manifest_with_upstream(Manifest::new(PROCESSED, preprocessed.prices.len()), &[raw_manifest])
        .with_warnings(warnings)
        .with_details(json!({
            "rows_read": preprocessed.rows_read,
            "dropped": preprocessed.dropped.len(),
            "duplicates": preprocessed.duplicates,
            "summary": &summary,
            "stationarity": &stationarity,
        }));
    publish(&path, &manifest, |p| {
        write_processed(p, &preprocessed.prices, &preprocessed.returns).map(|_| ())
    })?;

    info!(
        prices = preprocessed.prices.len(),
        returns = preprocessed.returns.len(),
        dropped = preprocessed.dropped.len(),
        path = %path.display(),
        "wrote processed series"
    );
    Ok(PreprocessOutput {
        preprocessed,
        summary,
        stationarity,
    })
}

/// Fit the change-point model to the processed returns.
///
/// Convergence problems are recorded in the manifest and logged; they do not
/// fail the stage. A sampler failure writes nothing.
pub fn run_detect(paths: &ArtifactPaths, config: &ModelConfig) -> Result<ChangePointRun, AppError> {
    let processed_path = paths.processed();
    require_input(&processed_path, "preprocess")?;
    let processed_manifest = read_manifest(&processed_path)?;
    let (_, returns) = read_processed(&processed_path)?;

    let run = fit_change_point(&returns, config)?;
    let warnings = run.warnings();
    for w in &warnings {
        warn!(date = %w.change_point_date, "{}", w.message);
    }

    let path = paths.change_points();
    let fits = run
        .fits
        .iter()
        .map(|f| -> Result<serde_json::Value, AppError> {
            let diagnostics = serde_json::to_value(&f.diagnostics).map_err(|e| AppError::json(&path, e))?;
            Ok(json!({
                "index": f.estimate.index,
                "date": f.estimate.date,
                "log_gain": f.log_gain,
                "acceptance": f.acceptance,
                "diagnostics": diagnostics,
            }))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let estimates = run.estimates();
    let manifest = manifest_with_upstream(Manifest::new(CHANGE_POINTS, estimates.len()), &[
        processed_manifest,
    ])
    .with_warnings(warnings.iter().map(|w| w.to_string()))
    .with_details(json!({
        "model": {
            "draws": config.draws,
            "warmup": config.warmup,
            "chains": config.chains,
            "seed": config.seed,
            "change_points": config.change_points,
            "credible_mass": config.credible_mass,
            "min_segment": config.min_segment,
            "mu_prior_sd": config.mu_prior_sd,
            "sigma_prior_sd": config.sigma_prior_sd,
        },
        "analysed": { "start": run.analysed.0, "end": run.analysed.1 },
        "fits": fits,
    }));
    publish(&path, &manifest, |p| write_change_points(p, &estimates))?;

    info!(
        change_points = estimates.len(),
        unconverged = warnings.len(),
        path = %path.display(),
        "wrote change points"
    );
    Ok(run)
}

fn load_events(paths: &ArtifactPaths, override_path: Option<&Path>) -> Result<(Vec<Event>, EventSource), AppError> {
    if let Some(path) = override_path {
        return Ok((read_events(path)?, EventSource::File(path.display().to_string())));
    }
    let default = paths.events();
    if default.exists() {
        return Ok((read_events(&default)?, EventSource::File(default.display().to_string())));
    }
    Ok((curated_events()?, EventSource::Curated))
}

/// Match change points to events and write the impact table.
pub fn run_associate(
    paths: &ArtifactPaths,
    config: &AssociationConfig,
    events_path: Option<&Path>,
) -> Result<Association, AppError> {
    config.validate()?;
    let cp_path = paths.change_points();
    let processed_path = paths.processed();
    require_input(&cp_path, "detect")?;
    require_input(&processed_path, "preprocess")?;

    let cp_manifest = read_manifest(&cp_path)?;
    let processed_manifest = read_manifest(&processed_path)?;
    let change_points = read_change_points(&cp_path)?;
    let (prices, returns) = read_processed(&processed_path)?;
    let (events, source) = load_events(paths, events_path)?;
    info!(events = events.len(), source = ?source, "loaded events");

    let association = associate_events(&change_points, &events, &returns, &prices, config)?;
    for s in &association.skipped {
        warn!(event = %s.event, reason = %s.reason, "skipped event");
    }

    let path = paths.event_impacts();
    let source = match &source {
        EventSource::File(p) => p.clone(),
        EventSource::Curated => "built-in".to_string(),
    };
    let manifest = manifest_with_upstream(Manifest::new(EVENT_IMPACTS, association.impacts.len()), &[
        cp_manifest,
        processed_manifest,
    ])
    .with_warnings(association.skipped.iter().map(|s| s.to_string()))
    .with_details(json!({
        "window_days": config.window_days,
        "min_window_obs": config.min_window_obs,
        "events_source": source,
        "events": events.len(),
        "unmatched": association.unmatched,
        "skipped": association.skipped.len(),
    }));
    publish(&path, &manifest, |p| write_impacts(p, &association.impacts))?;

    info!(
        impacts = association.impacts.len(),
        skipped = association.skipped.len(),
        unmatched = association.unmatched,
        path = %path.display(),
        "wrote event impacts"
    );
    Ok(association)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{ArtifactStatus, build_payload};
    use crate::io::manifest_path;

    fn quick_model() -> ModelConfig {
        ModelConfig {
            draws: 300,
            warmup: 300,
            chains: 2,
            ..ModelConfig::default()
        }
    }

    fn regimes() -> Vec<Regime> {
        vec![
            Regime {
                len: 300,
                mu: 0.0,
                sigma: 0.01,
            },
            Regime {
                len: 300,
                mu: 0.004,
                sigma: 0.03,
            },
        ]
    }

    #[test]
    fn full_pipeline_on_synthetic_prices() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();

        let rows = run_simulate(&paths, &regimes(), start, 60.0, 7).unwrap();
        assert_eq!(rows, 601);
        let raw = read_manifest(&paths.raw_prices()).unwrap().unwrap();
        assert_eq!(raw.details["true_change_indices"], json!([300]));

        let pre = run_preprocess(&paths).unwrap();
        assert_eq!(pre.preprocessed.returns.len(), 600);
        assert!(pre.preprocessed.dropped.is_empty());

        let run = run_detect(&paths, &quick_model()).unwrap();
        assert_eq!(run.fits.len(), 1);
        let found = run.fits[0].estimate.index;
        assert!(found.abs_diff(300) <= 10, "found {found}");

        let switch_date = pre.preprocessed.returns[300].date;
        std::fs::write(
            paths.events(),
            format!("Event,Date,Category\nShock,{switch_date},supply\nLong ago,1990-01-01,other\n"),
        )
        .unwrap();
        let association = run_associate(&paths, &AssociationConfig::default(), None).unwrap();
        assert_eq!(association.impacts.len(), 1);
        assert_eq!(association.unmatched, 1);
        let impact = &association.impacts[0];
        assert_eq!(impact.event.name, "Shock");
        assert!(impact.volatility_change_pct > 50.0);

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.events, ArtifactStatus::Ok);
        assert_eq!(payload.prices.len(), 601);
        assert_eq!(payload.events.len(), 1);
    }

    #[test]
    fn detect_requires_processed_series() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let err = run_detect(&paths, &quick_model()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!paths.change_points().exists());
    }

    #[test]
    fn failed_detect_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        run_simulate(&paths, &regimes(), start, 60.0, 7).unwrap();
        run_preprocess(&paths).unwrap();
        run_detect(&paths, &quick_model()).unwrap();
        let before = std::fs::read_to_string(paths.change_points()).unwrap();

        let bad = ModelConfig {
            chains: 0,
            ..quick_model()
        };
        assert_eq!(run_detect(&paths, &bad).unwrap_err().exit_code(), 2);
        assert_eq!(std::fs::read_to_string(paths.change_points()).unwrap(), before);
    }

    #[test]
    fn rerunning_preprocess_marks_downstream_stale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        run_simulate(&paths, &regimes(), start, 60.0, 7).unwrap();
        run_preprocess(&paths).unwrap();
        run_detect(&paths, &quick_model()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        run_preprocess(&paths).unwrap();

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Stale);
    }

    #[test]
    fn curated_events_are_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let (events, source) = load_events(&paths, None).unwrap();
        assert_eq!(source, EventSource::Curated);
        assert!(!events.is_empty());
    }

    /// Processed series whose returns overflow every chain's likelihood.
    fn write_overflowing_series(paths: &ArtifactPaths) {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut csv = format!("Date,Price,Log_Return\n{d0},50.0,\n");
        for i in 1..=200u64 {
            let date = d0 + chrono::Days::new(i);
            let r = if i % 2 == 0 { "1e200" } else { "-1e200" };
            csv.push_str(&format!("{date},50.0,{r}\n"));
        }
        std::fs::write(paths.processed(), csv).unwrap();
    }

    #[test]
    fn sampler_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        write_overflowing_series(&paths);
        let err = run_detect(&paths, &quick_model()).unwrap_err();
        assert!(matches!(err, AppError::ModelFit(_)), "{err}");
        assert_eq!(err.exit_code(), 4);
        assert!(!paths.change_points().exists());
        assert!(!manifest_path(&paths.change_points()).exists());

        // With an earlier successful run, both files stay as they were.
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        run_simulate(&paths, &regimes(), start, 60.0, 7).unwrap();
        run_preprocess(&paths).unwrap();
        run_detect(&paths, &quick_model()).unwrap();
        let artifact = std::fs::read_to_string(paths.change_points()).unwrap();
        let manifest = std::fs::read_to_string(manifest_path(&paths.change_points())).unwrap();

        write_overflowing_series(&paths);
        assert_eq!(run_detect(&paths, &quick_model()).unwrap_err().exit_code(), 4);
        assert_eq!(std::fs::read_to_string(paths.change_points()).unwrap(), artifact);
        assert_eq!(std::fs::read_to_string(manifest_path(&paths.change_points())).unwrap(), manifest);
    }

    #[test]
    fn interrupted_publish_never_pairs_new_artifact_with_old_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        run_simulate(&paths, &regimes(), start, 60.0, 7).unwrap();
        run_preprocess(&paths).unwrap();
        run_detect(&paths, &quick_model()).unwrap();

        // Block the manifest's temporary file so only the artifact lands.
        let mut blocker = manifest_path(&paths.processed()).into_os_string();
        blocker.push(".tmp");
        std::fs::create_dir(&blocker).unwrap();
        assert!(run_preprocess(&paths).is_err());
        assert!(read_manifest(&paths.processed()).unwrap().is_none());

        let payload = build_payload(&paths).unwrap();
        assert_eq!(payload.meta.status.prices, ArtifactStatus::Ok);
        assert_eq!(payload.meta.status.change_points, ArtifactStatus::Stale);
    }
}
