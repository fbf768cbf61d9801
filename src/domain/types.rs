//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during fitting and association
//! - written to the CSV artifacts
//! - reloaded by a later stage without re-running earlier ones

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day's closing price (USD/barrel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub price: f64,
}

/// `ln(price_t / price_{t-1})`, dated on the later observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnObservation {
    pub date: NaiveDate,
    pub log_return: f64,
}

/// Tag attached to each curated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Geopolitical,
    OpecDecision,
    EconomicCrisis,
    Pandemic,
    SupplyDisruption,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Geopolitical,
        EventCategory::OpecDecision,
        EventCategory::EconomicCrisis,
        EventCategory::Pandemic,
        EventCategory::SupplyDisruption,
        EventCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Geopolitical => "geopolitical",
            EventCategory::OpecDecision => "opec_decision",
            EventCategory::EconomicCrisis => "economic_crisis",
            EventCategory::Pandemic => "pandemic",
            EventCategory::SupplyDisruption => "supply_disruption",
            EventCategory::Other => "other",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .or(match normalized.as_str() {
                "opec" => Some(EventCategory::OpecDecision),
                "crisis" | "economic" => Some(EventCategory::EconomicCrisis),
                "supply" => Some(EventCategory::SupplyDisruption),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown event category '{s}'."))
    }
}

/// A dated real-world event from the curated list.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub event_date: NaiveDate,
    pub category: EventCategory,
}

/// Compact convergence summary carried with each estimate (and persisted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSummary {
    /// Largest R-hat across parameters; `None` when fewer than two chains survived.
    pub max_r_hat: Option<f64>,
    pub min_ess: f64,
    pub converged: bool,
}

/// Posterior summary of one switch index.
///
/// `posterior_std_pre` / `posterior_std_post` are posterior means of the regime
/// volatilities σ₁ / σ₂ conditioned on τ = τ̂ (not the spread of μ).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePointEstimate {
    /// Index into the return series (first observation of the new regime).
    pub index: usize,
    pub date: NaiveDate,
    /// Inclusive index bounds of the narrowest credible interval.
    pub ci_low: usize,
    pub ci_high: usize,
    pub ci_low_date: NaiveDate,
    pub ci_high_date: NaiveDate,
    /// Posterior mass at `index`.
    pub probability: f64,
    pub posterior_mean_pre: f64,
    pub posterior_mean_post: f64,
    pub posterior_std_pre: f64,
    pub posterior_std_post: f64,
    pub convergence: ConvergenceSummary,
}

/// Non-fatal flag raised when a fit did not meet the convergence thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceWarning {
    pub change_point_date: NaiveDate,
    pub message: String,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change point {}: {}", self.change_point_date, self.message)
    }
}

/// Before/after statistics for one pair of windows around a centre date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowImpact {
    pub pre_price: f64,
    pub post_price: f64,
    pub price_change_pct: f64,
    pub pre_volatility: f64,
    pub post_volatility: f64,
    pub volatility_change_pct: f64,
}

/// One matched (event, change point) pair with its impact metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct EventImpact {
    pub event: Event,
    pub change_point_date: NaiveDate,
    /// `change_point_date - event_date` in days (signed).
    pub days_difference: i64,
    pub pre_event_price: f64,
    pub post_event_price: f64,
    pub price_change_pct: f64,
    pub pre_event_volatility: f64,
    pub post_event_volatility: f64,
    pub volatility_change_pct: f64,
    /// Same statistics centred on the change point, when its windows are populated.
    pub change_point_window: Option<WindowImpact>,
}

/// Why an otherwise matched event produced no `EventImpact`.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    ThinWindow {
        side: WindowSide,
        prices: usize,
        returns: usize,
        required: usize,
    },
    ZeroPreVolatility,
    /// A percentage change came out non-finite.
    UndefinedChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSide {
    Pre,
    Post,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ThinWindow {
                side,
                prices,
                returns,
                required,
            } => {
                let side = match side {
                    WindowSide::Pre => "pre-event",
                    WindowSide::Post => "post-event",
                };
                write!(
                    f,
                    "{side} window has {prices} prices / {returns} returns (need {required})"
                )
            }
            SkipReason::ZeroPreVolatility => f.write_str("pre-event volatility is zero"),
            SkipReason::UndefinedChange => f.write_str("percentage change is undefined"),
        }
    }
}

/// A matched event that was left out of the impact table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationSkipped {
    pub event: String,
    pub event_date: NaiveDate,
    pub change_point_date: NaiveDate,
    pub reason: SkipReason,
}

impl fmt::Display for AssociationSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.event, self.event_date, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_loose_spellings() {
        assert_eq!("OPEC Decision".parse::<EventCategory>().unwrap(), EventCategory::OpecDecision);
        assert_eq!("opec".parse::<EventCategory>().unwrap(), EventCategory::OpecDecision);
        assert_eq!("economic-crisis".parse::<EventCategory>().unwrap(), EventCategory::EconomicCrisis);
        assert_eq!(" Pandemic ".parse::<EventCategory>().unwrap(), EventCategory::Pandemic);
        assert!("weather".parse::<EventCategory>().is_err());
    }

    #[test]
    fn skip_reason_is_readable() {
        let reason = SkipReason::ThinWindow {
            side: WindowSide::Post,
            prices: 1,
            returns: 1,
            required: 3,
        };
        assert_eq!(reason.to_string(), "post-event window has 1 prices / 1 returns (need 3)");
    }
}
