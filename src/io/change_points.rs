//! `change_points.csv`: one row per estimate, sorted by index.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ChangePointEstimate, ConvergenceSummary};
use crate::error::{AppError, DataError};
use crate::io::atomic::write_atomic;
use crate::io::processed::row_error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointRow {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Change_Point")]
    pub change_point: NaiveDate,
    #[serde(rename = "CI_Low_Index")]
    pub ci_low_index: usize,
    #[serde(rename = "CI_High_Index")]
    pub ci_high_index: usize,
    #[serde(rename = "CI_Low_Date")]
    pub ci_low_date: NaiveDate,
    #[serde(rename = "CI_High_Date")]
    pub ci_high_date: NaiveDate,
    #[serde(rename = "Probability")]
    pub probability: f64,
    #[serde(rename = "Mean_Pre")]
    pub mean_pre: f64,
    #[serde(rename = "Mean_Post")]
    pub mean_post: f64,
    #[serde(rename = "Std_Pre")]
    pub std_pre: f64,
    #[serde(rename = "Std_Post")]
    pub std_post: f64,
    /// Empty with a single chain; `inf` when constant chains disagree.
    #[serde(rename = "Max_R_Hat")]
    pub max_r_hat: Option<f64>,
    #[serde(rename = "Min_Ess")]
    pub min_ess: f64,
    #[serde(rename = "Converged")]
    pub converged: bool,
}

impl From<&ChangePointEstimate> for ChangePointRow {
    fn from(e: &ChangePointEstimate) -> Self {
        Self {
            index: e.index,
            change_point: e.date,
            ci_low_index: e.ci_low,
            ci_high_index: e.ci_high,
            ci_low_date: e.ci_low_date,
            ci_high_date: e.ci_high_date,
            probability: e.probability,
            mean_pre: e.posterior_mean_pre,
            mean_post: e.posterior_mean_post,
            std_pre: e.posterior_std_pre,
            std_post: e.posterior_std_post,
            max_r_hat: e.convergence.max_r_hat,
            min_ess: e.convergence.min_ess,
            converged: e.convergence.converged,
        }
    }
}

impl From<ChangePointRow> for ChangePointEstimate {
    fn from(r: ChangePointRow) -> Self {
        Self {
            index: r.index,
            date: r.change_point,
            ci_low: r.ci_low_index,
            ci_high: r.ci_high_index,
            ci_low_date: r.ci_low_date,
            ci_high_date: r.ci_high_date,
            probability: r.probability,
            posterior_mean_pre: r.mean_pre,
            posterior_mean_post: r.mean_post,
            posterior_std_pre: r.std_pre,
            posterior_std_post: r.std_post,
            convergence: ConvergenceSummary {
                max_r_hat: r.max_r_hat,
                min_ess: r.min_ess,
                converged: r.converged,
            },
        }
    }
}

pub fn write_change_points(path: &Path, estimates: &[ChangePointEstimate]) -> Result<(), AppError> {
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        if estimates.is_empty() {
            // Keep the header so an empty result is still self-describing.
            writer
                .write_record(HEADER)
                .map_err(|e| AppError::csv(path, e))?;
        }
        for e in estimates {
            writer
                .serialize(ChangePointRow::from(e))
                .map_err(|e| AppError::csv(path, e))?;
        }
        writer.flush().map_err(|e| AppError::io(path, e))
    })
}

const HEADER: [&str; 14] = [
    "Index",
    "Change_Point",
    "CI_Low_Index",
    "CI_High_Index",
    "CI_Low_Date",
    "CI_High_Date",
    "Probability",
    "Mean_Pre",
    "Mean_Post",
    "Std_Pre",
    "Std_Post",
    "Max_R_Hat",
    "Min_Ess",
    "Converged",
];

/// Load estimates; indices must be strictly increasing.
pub fn read_change_points(path: &Path) -> Result<Vec<ChangePointEstimate>, AppError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| AppError::csv(path, e))?;
    let mut out: Vec<ChangePointEstimate> = Vec::new();
    for result in reader.deserialize::<ChangePointRow>() {
        let row = result.map_err(|e| row_error(&e))?;
        if let Some(prev) = out.last() {
            if row.index <= prev.index {
                return Err(DataError::new(format!("index {} is not after {}", row.index, prev.index))
                    .at_line(out.len() + 2)
                    .in_column("Index")
                    .into());
            }
        }
        out.push(row.into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(index: usize, day: u32) -> ChangePointEstimate {
        let date = NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        ChangePointEstimate {
            index,
            date,
            ci_low: index - 2,
            ci_high: index + 3,
            ci_low_date: date - chrono::Days::new(2),
            ci_high_date: date + chrono::Days::new(3),
            probability: 0.62,
            posterior_mean_pre: 0.0004,
            posterior_mean_post: -0.0031,
            posterior_std_pre: 0.018,
            posterior_std_post: 0.052,
            convergence: ConvergenceSummary {
                max_r_hat: Some(1.004),
                min_ess: 812.5,
                converged: true,
            },
        }
    }

    #[test]
    fn estimates_survive_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change_points.csv");
        let estimates = vec![estimate(100, 9), estimate(110, 19)];
        write_change_points(&path, &estimates).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(&HEADER.join(",")));
        assert_eq!(read_change_points(&path).unwrap(), estimates);
    }

    #[test]
    fn empty_result_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change_points.csv");
        write_change_points(&path, &[]).unwrap();
        assert!(read_change_points(&path).unwrap().is_empty());
    }

    #[test]
    fn single_chain_r_hat_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change_points.csv");
        let mut e = estimate(100, 9);
        e.convergence.max_r_hat = None;
        write_change_points(&path, &[e.clone()]).unwrap();
        assert_eq!(read_change_points(&path).unwrap(), vec![e]);
    }
}
