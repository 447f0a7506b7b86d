//! Numeric helpers shared by detection and scoring
//!
//! Trailing windows either end at the bar in question (`trailing_mean`) or stop just
//! before it (`lookback`). Every helper returns `None` or `false` when its window is
//! incomplete instead of guessing.

use std::ops::Range;

use crate::{
    params::SessionParams,
    time::{CandleTime, SECONDS_PER_DAY},
    OHLCExt, OHLC,
};

/// Mean of `value` over the `period` bars ending at `index` (inclusive).
#[inline]
pub fn trailing_mean<T, F>(bars: &[T], index: usize, period: usize, value: F) -> Option<f64>
where
    F: Fn(&T) -> f64,
{
    if period == 0 || index >= bars.len() || index + 1 < period {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    let mean = window.iter().map(value).sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

/// Simple moving average of closes ending at `index`
#[inline]
pub fn sma_close<T: OHLC>(bars: &[T], index: usize, period: usize) -> Option<f64> {
    trailing_mean(bars, index, period, |b| b.close())
}

/// Average absolute body ending at `index`
#[inline]
pub fn avg_body<T: OHLC>(bars: &[T], index: usize, period: usize) -> Option<f64> {
    trailing_mean(bars, index, period, |b| b.body())
}

/// Indices of the `len` bars strictly before `index`, clamped at 0
#[inline]
pub fn lookback(index: usize, len: usize) -> Range<usize> {
    index.saturating_sub(len)..index
}

/// Lowest low in `range`, `None` when the range is empty
pub fn lowest_low<T: OHLC>(bars: &[T], range: Range<usize>) -> Option<f64> {
    bars.get(range)?.iter().map(|b| b.low()).reduce(f64::min)
}

/// Highest high in `range`, `None` when the range is empty
pub fn highest_high<T: OHLC>(bars: &[T], range: Range<usize>) -> Option<f64> {
    bars.get(range)?.iter().map(|b| b.high()).reduce(f64::max)
}

/// `price` lies within `tolerance` (relative) of `level`
#[inline]
pub fn within_tolerance(price: f64, level: f64, tolerance: f64) -> bool {
    (price - level).abs() <= level.abs() * tolerance
}

/// Local minute of day for epoch seconds shifted by a fixed offset.
///
/// `None` when the shifted timestamp leaves the `i64` range.
#[inline]
pub fn minute_of_day(epoch_secs: i64, utc_offset_minutes: i32) -> Option<u16> {
    let local = epoch_secs.checked_add(i64::from(utc_offset_minutes) * 60)?;
    Some((local.rem_euclid(SECONDS_PER_DAY) / 60) as u16)
}

/// Whether `time` falls inside one of the configured session windows.
///
/// Dates and epoch values under the intraday threshold never match.
pub fn in_session(time: CandleTime, session: &SessionParams) -> bool {
    let Some(secs) = time.intraday_seconds(session.intraday_threshold) else {
        return false;
    };
    minute_of_day(secs, session.utc_offset_minutes)
        .is_some_and(|minute| session.windows.iter().any(|w| w.contains(minute)))
}
