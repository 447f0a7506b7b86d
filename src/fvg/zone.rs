//! Gap zone detection
//!
//! A fair value gap is the price range skipped between the first and third candle of
//! a three-candle run. Bullish: `low[i] > high[i-2]`, the zone spans
//! `[high[i-2], low[i]]`. Bearish: `high[i] < low[i-2]`, the zone spans
//! `[high[i], low[i-2]]`.

use crate::{params::ConfluenceParams, time::CandleTime, Direction, MarketContext, OHLCExt, OHLC};

/// Lifecycle of a zone within one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ZoneState {
    Open,
    /// Filled by the candle at `index`; inert afterwards
    Mitigated { index: usize },
}

/// A detected fair value gap. `top > bottom` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct GapZone {
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub formation_time: CandleTime,
    pub formation_index: usize,
    state: ZoneState,
}

impl GapZone {
    /// Zone from the candle triplet ending at `index`, ignoring any gating.
    pub fn from_triplet<T: OHLC>(bars: &[T], index: usize) -> Option<Self> {
        let first = bars.get(index.checked_sub(2)?)?;
        let third = bars.get(index)?;

        let (direction, top, bottom) = if third.low() > first.high() {
            (Direction::Bullish, third.low(), first.high())
        } else if third.high() < first.low() {
            (Direction::Bearish, first.low(), third.high())
        } else {
            return None;
        };

        Some(Self {
            direction,
            top,
            bottom,
            formation_time: third.time(),
            formation_index: index,
            state: ZoneState::Open,
        })
    }

    #[inline]
    pub fn state(&self) -> ZoneState {
        self.state
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == ZoneState::Open
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Edge where resting orders are expected: the bottom of a bullish zone, the top
    /// of a bearish one
    #[inline]
    pub fn edge(&self) -> f64 {
        match self.direction {
            Direction::Bullish => self.bottom,
            Direction::Bearish => self.top,
        }
    }

    /// Price condition only: the bar's low (bullish) or high (bearish) is inside
    /// `[bottom, top]`.
    #[inline]
    pub fn touched_by<T: OHLC>(&self, bar: &T) -> bool {
        let probe = match self.direction {
            Direction::Bullish => bar.low(),
            Direction::Bearish => bar.high(),
        };
        (self.bottom..=self.top).contains(&probe)
    }

    /// The bar at `index` fills this zone: the zone is open, the bar comes after the
    /// formation candle, and it trades back inside.
    #[inline]
    pub fn is_mitigated_by<T: OHLC>(&self, bar: &T, index: usize) -> bool {
        self.is_open() && index > self.formation_index && self.touched_by(bar)
    }

    /// Open -> Mitigated. Returns `false` if the zone was already mitigated.
    pub fn mark_mitigated(&mut self, index: usize) -> bool {
        if !self.is_open() {
            return false;
        }
        self.state = ZoneState::Mitigated { index };
        true
    }
}

/// Zone detector: raw gap check plus optional trend and displacement gates
#[derive(Debug, Clone, Copy)]
pub struct ZoneDetector<'a> {
    params: &'a ConfluenceParams,
}

impl<'a> ZoneDetector<'a> {
    pub fn new(params: &'a ConfluenceParams) -> Self {
        Self { params }
    }

    /// Zone formed by the triplet ending at `index`, if it passes the gates.
    pub fn detect_at<T: OHLC>(
        &self,
        bars: &[T],
        contexts: &[MarketContext],
        index: usize,
    ) -> Option<GapZone> {
        let zone = GapZone::from_triplet(bars, index)?;
        if !self.params.strict {
            return Some(zone);
        }

        let close = bars[index].close();
        let sma = contexts.get(index)?.trend_sma?;
        let trend_aligned = match zone.direction {
            Direction::Bullish => close > sma,
            Direction::Bearish => close < sma,
        };
        if !trend_aligned {
            return None;
        }

        self.has_displacement(bars, contexts, index - 1).then_some(zone)
    }

    /// Body of the bar at `middle` beats the average body ending there by the
    /// displacement factor
    fn has_displacement<T: OHLC>(&self, bars: &[T], contexts: &[MarketContext], middle: usize) -> bool {
        let Some(avg) = contexts.get(middle).and_then(|c| c.avg_body) else {
            return false;
        };
        bars[middle].body() > avg * self.params.displacement_factor.get()
    }
}

/// Every zone in `bars`, in formation order.
///
/// Detection-only view of a pass: zones are returned open, as formed. Histories
/// shorter than the minimum length yield nothing.
pub fn detect_zones<T: OHLC>(
    bars: &[T],
    contexts: &[MarketContext],
    params: &ConfluenceParams,
) -> Vec<GapZone> {
    if bars.len() < params.min_bars() {
        return Vec::new();
    }
    let detector = ZoneDetector::new(params);
    (2..bars.len())
        .filter_map(|i| detector.detect_at(bars, contexts, i))
        .collect()
}
