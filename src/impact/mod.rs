//! Event association and impact metrics.
//!
//! For every event the nearest change point within `window_days` is matched
//! (ties go to the earlier change point). Several events may match the same
//! change point; each produces its own row.
//!
//! Window policy:
//!
//! - pre-window `[event − W, event)`, post-window `[event, event + W)`
//! - price = mean of prices dated inside the window
//! - volatility = sample standard deviation of log returns dated inside it
//! - windows are truncated at the ends of the series; a window with fewer
//!   than `min_window_obs` prices or returns skips the event

use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use crate::domain::{
    AssociationConfig, AssociationSkipped, ChangePointEstimate, Event, EventImpact, PriceObservation,
    ReturnObservation, SkipReason, WindowImpact, WindowSide,
};
use crate::error::AppError;
use crate::math::{mean, pct_change, sample_std};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// Ordered by `(event_date, event name)`.
    pub impacts: Vec<EventImpact>,
    /// Matched events whose windows were too thin to measure.
    pub skipped: Vec<AssociationSkipped>,
    /// Events with no change point inside the tolerance window.
    pub unmatched: usize,
}

/// Match events to change points and measure the price/volatility shift.
pub fn associate_events(
    change_points: &[ChangePointEstimate],
    events: &[Event],
    returns: &[ReturnObservation],
    prices: &[PriceObservation],
    config: &AssociationConfig,
) -> Result<Association, AppError> {
    config.validate()?;

    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by(|a, b| a.event_date.cmp(&b.event_date).then_with(|| a.name.cmp(&b.name)));

    let mut out = Association::default();
    for event in ordered {
        let Some(cp) = nearest_change_point(change_points, event.event_date, config.window_days) else {
            out.unmatched += 1;
            continue;
        };

        match window_impact(event.event_date, returns, prices, config) {
            Ok(w) => {
                let change_point_window = window_impact(cp.date, returns, prices, config).ok();
                out.impacts.push(EventImpact {
                    event: event.clone(),
                    change_point_date: cp.date,
                    days_difference: (cp.date - event.event_date).num_days(),
                    pre_event_price: w.pre_price,
                    post_event_price: w.post_price,
                    price_change_pct: w.price_change_pct,
                    pre_event_volatility: w.pre_volatility,
                    post_event_volatility: w.post_volatility,
                    volatility_change_pct: w.volatility_change_pct,
                    change_point_window,
                });
            }
            Err(reason) => {
                let skipped = AssociationSkipped {
                    event: event.name.clone(),
                    event_date: event.event_date,
                    change_point_date: cp.date,
                    reason,
                };
                info!(%skipped, "event skipped");
                out.skipped.push(skipped);
            }
        }
    }

    debug!(
        matched = out.impacts.len(),
        skipped = out.skipped.len(),
        unmatched = out.unmatched,
        "association complete"
    );
    Ok(out)
}

/// Change point closest to `date` within `window_days`; earlier wins ties.
pub fn nearest_change_point(
    change_points: &[ChangePointEstimate],
    date: NaiveDate,
    window_days: i64,
) -> Option<&ChangePointEstimate> {
    change_points
        .iter()
        .map(|cp| ((cp.date - date).num_days().abs(), cp))
        .filter(|(d, _)| *d <= window_days)
        .min_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.date.cmp(&b.date)))
        .map(|(_, cp)| cp)
}

/// Pre/post statistics around `anchor`.
pub fn window_impact(
    anchor: NaiveDate,
    returns: &[ReturnObservation],
    prices: &[PriceObservation],
    config: &AssociationConfig,
) -> Result<WindowImpact, SkipReason> {
    let days = Days::new(config.window_days.unsigned_abs());
    let from = anchor.checked_sub_days(days).unwrap_or(NaiveDate::MIN);
    let to = anchor.checked_add_days(days).unwrap_or(NaiveDate::MAX);

    let pre = side(WindowSide::Pre, from, anchor, returns, prices, config.min_window_obs)?;
    let post = side(WindowSide::Post, anchor, to, returns, prices, config.min_window_obs)?;

    if pre.volatility == 0.0 {
        return Err(SkipReason::ZeroPreVolatility);
    }
    let price_change_pct = pct_change(pre.price, post.price).ok_or(SkipReason::UndefinedChange)?;
    let volatility_change_pct = pct_change(pre.volatility, post.volatility).ok_or(SkipReason::UndefinedChange)?;

    Ok(WindowImpact {
        pre_price: pre.price,
        post_price: post.price,
        price_change_pct,
        pre_volatility: pre.volatility,
        post_volatility: post.volatility,
        volatility_change_pct,
    })
}

struct SideStats {
    price: f64,
    volatility: f64,
}

/// Statistics over `[from, to)`; both series are sorted by date.
fn side(
    which: WindowSide,
    from: NaiveDate,
    to: NaiveDate,
    returns: &[ReturnObservation],
    prices: &[PriceObservation],
    required: usize,
) -> Result<SideStats, SkipReason> {
    let p = slice_by_date(prices, from, to, |o| o.date);
    let r = slice_by_date(returns, from, to, |o| o.date);

    let thin = || SkipReason::ThinWindow {
        side: which,
        prices: p.len(),
        returns: r.len(),
        required,
    };
    if p.len() < required || r.len() < required {
        return Err(thin());
    }

    let price_values: Vec<f64> = p.iter().map(|o| o.price).collect();
    let return_values: Vec<f64> = r.iter().map(|o| o.log_return).collect();
    let price = mean(&price_values).ok_or_else(thin)?;
    let volatility = sample_std(&return_values).ok_or_else(thin)?;
    Ok(SideStats { price, volatility })
}

fn slice_by_date<T>(items: &[T], from: NaiveDate, to: NaiveDate, date: impl Fn(&T) -> NaiveDate) -> &[T] {
    let lo = items.partition_point(|o| date(o) < from);
    let hi = items.partition_point(|o| date(o) < to);
    &items[lo..hi.max(lo)]
}
