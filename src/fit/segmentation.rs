//! Binary segmentation for a fixed number of switch points.
//!
//! Each round fits every eligible segment, accepts the split with the largest
//! log-likelihood gain, and replaces that segment with its two halves. Fits
//! of untouched segments are reused across rounds. The first fit (whole
//! series) is fatal on error; a failing sub-segment is only marked ineligible.

use tracing::warn;

use crate::error::AppError;

/// One accepted split, in global indices.
pub trait Split {
    /// Global switch index.
    fn index(&self) -> usize;
    /// Log-likelihood gain of splitting the parent segment here.
    fn gain(&self) -> f64;
}

#[derive(Debug)]
struct Segment<F> {
    start: usize,
    end: usize,
    fit: Option<F>,
    eligible: bool,
}

/// Locate up to `k` switch points in `[0, n)`.
///
/// `fit(start, end)` fits one segment and returns a split with a global index
/// strictly inside `(start, end)`. Returned splits are sorted by index.
pub fn binary_segmentation<F, Fit>(n: usize, k: usize, min_len: usize, mut fit: Fit) -> Result<Vec<F>, AppError>
where
    F: Split,
    Fit: FnMut(usize, usize) -> Result<F, AppError>,
{
    let mut segments = vec![Segment {
        start: 0,
        end: n,
        fit: None,
        eligible: n >= min_len,
    }];
    let mut accepted: Vec<F> = Vec::with_capacity(k);
    let mut first = true;

    while accepted.len() < k {
        for seg in segments.iter_mut().filter(|s| s.eligible && s.fit.is_none()) {
            match fit(seg.start, seg.end) {
                Ok(f) => seg.fit = Some(f),
                Err(err) if first => return Err(err),
                Err(err) => {
                    warn!(start = seg.start, end = seg.end, error = %err, "segment fit failed; skipping");
                    seg.eligible = false;
                }
            }
        }
        first = false;

        let best = segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.fit.as_ref().map(|f| (i, f.gain())))
            .fold(None, |best: Option<(usize, f64)>, (i, g)| match best {
                Some((_, bg)) if bg >= g => best,
                _ => Some((i, g)),
            });
        let Some((i, _)) = best else {
            break;
        };

        let seg = segments.remove(i);
        let Some(split) = seg.fit else {
            break;
        };
        let at = split.index();
        let left = Segment {
            start: seg.start,
            end: at,
            fit: None,
            eligible: at - seg.start >= min_len,
        };
        let right = Segment {
            start: at,
            end: seg.end,
            fit: None,
            eligible: seg.end - at >= min_len,
        };
        segments.insert(i, right);
        segments.insert(i, left);
        accepted.push(split);
    }

    accepted.sort_by_key(|s| s.index());
    accepted.dedup_by_key(|s| s.index());
    Ok(accepted)
}
