//! Mitigation tracking and composite confluence scoring
//!
//! When a candle first trades back into an open zone the zone is consumed and the
//! candle is scored against seven pass/fail criteria. Each criterion contributes its
//! full weight or nothing; the weights sum to 100.
//!
//! | Criterion | Weight |
//! |-----------|--------|
//! | Market structure (close vs trend SMA) | 20 |
//! | Session overlap (New York windows) | 15 |
//! | Order block at the zone edge | 20 |
//! | Fair value gap present | 15 |
//! | Liquidity sweep before formation | 15 |
//! | Discount / premium positioning | 10 |
//! | Rejection wick | 5 |

use crate::{
    fvg::{helpers, GapZone},
    params::ConfluenceParams,
    time::CandleTime,
    Direction, MarketContext, OHLCExt, Side, OHLC,
};

// ============================================================
// CRITERIA
// ============================================================

/// One confluence criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    MarketStructure,
    Session,
    OrderBlock,
    FairValueGap,
    LiquiditySweep,
    DiscountPremium,
    Rejection,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::MarketStructure,
        Criterion::Session,
        Criterion::OrderBlock,
        Criterion::FairValueGap,
        Criterion::LiquiditySweep,
        Criterion::DiscountPremium,
        Criterion::Rejection,
    ];

    /// Points awarded when the criterion passes
    pub const fn weight(self) -> u8 {
        match self {
            Criterion::MarketStructure => 20,
            Criterion::Session => 15,
            Criterion::OrderBlock => 20,
            Criterion::FairValueGap => 15,
            Criterion::LiquiditySweep => 15,
            Criterion::DiscountPremium => 10,
            Criterion::Rejection => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Criterion::MarketStructure => "Market structure",
            Criterion::Session => "Session overlap",
            Criterion::OrderBlock => "Order block",
            Criterion::FairValueGap => "Fair value gap",
            Criterion::LiquiditySweep => "Liquidity sweep",
            Criterion::DiscountPremium => "Discount/premium",
            Criterion::Rejection => "Rejection wick",
        }
    }
}

/// Outcome of one criterion: `score` is either 0 or `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CriterionScore {
    pub score: u8,
    pub max: u8,
    pub passed: bool,
}

impl CriterionScore {
    #[inline]
    pub fn evaluate(criterion: Criterion, passed: bool) -> Self {
        let max = criterion.weight();
        Self {
            score: if passed { max } else { 0 },
            max,
            passed,
        }
    }
}

/// Per-criterion scores for one mitigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub market_structure: CriterionScore,
    pub session: CriterionScore,
    pub order_block: CriterionScore,
    pub fair_value_gap: CriterionScore,
    pub liquidity_sweep: CriterionScore,
    pub discount_premium: CriterionScore,
    pub rejection: CriterionScore,
}

impl ScoreBreakdown {
    pub fn get(&self, criterion: Criterion) -> CriterionScore {
        match criterion {
            Criterion::MarketStructure => self.market_structure,
            Criterion::Session => self.session,
            Criterion::OrderBlock => self.order_block,
            Criterion::FairValueGap => self.fair_value_gap,
            Criterion::LiquiditySweep => self.liquidity_sweep,
            Criterion::DiscountPremium => self.discount_premium,
            Criterion::Rejection => self.rejection,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, CriterionScore)> + '_ {
        Criterion::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Sum of awarded points, 0..=100
    pub fn total(&self) -> u8 {
        self.iter().map(|(_, s)| s.score).sum()
    }

    pub fn passed_count(&self) -> usize {
        self.iter().filter(|(_, s)| s.passed).count()
    }
}

// ============================================================
// SIGNAL
// ============================================================

/// Scored entry emitted when a zone is mitigated with enough confluence
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Time of the mitigating candle
    pub time: CandleTime,
    pub direction: Side,
    pub total_score: u8,
    pub breakdown: ScoreBreakdown,
    pub formation_time: CandleTime,
    pub zone_top: f64,
    pub zone_bottom: f64,
    /// Close of the mitigating candle
    pub price: f64,
}

/// First touch of an open zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mitigation {
    pub index: usize,
    pub breakdown: ScoreBreakdown,
    pub total_score: u8,
}

// ============================================================
// SCORER
// ============================================================

/// Mitigation check and composite scoring
#[derive(Debug, Clone, Copy)]
pub struct MitigationScorer<'a> {
    params: &'a ConfluenceParams,
}

impl<'a> MitigationScorer<'a> {
    pub fn new(params: &'a ConfluenceParams) -> Self {
        Self { params }
    }

    /// If the bar at `index` fills `zone`, consume the zone and score the fill.
    ///
    /// Returns `None` for zones that are already mitigated, for the formation candle
    /// itself, and for bars that stay outside the zone.
    pub fn check<T: OHLC>(
        &self,
        bars: &[T],
        contexts: &[MarketContext],
        zone: &mut GapZone,
        index: usize,
    ) -> Option<Mitigation> {
        let bar = bars.get(index)?;
        if !zone.is_mitigated_by(bar, index) || !zone.mark_mitigated(index) {
            return None;
        }

        let breakdown = self.score(bars, contexts, zone, index);
        Some(Mitigation {
            index,
            total_score: breakdown.total(),
            breakdown,
        })
    }

    /// Signal for a mitigation that clears the minimum score
    pub fn signal<T: OHLC>(&self, bars: &[T], zone: &GapZone, mitigation: &Mitigation) -> Option<Signal> {
        if mitigation.total_score < self.params.min_score {
            return None;
        }
        let bar = bars.get(mitigation.index)?;
        Some(Signal {
            time: bar.time(),
            direction: zone.direction.side(),
            total_score: mitigation.total_score,
            breakdown: mitigation.breakdown,
            formation_time: zone.formation_time,
            zone_top: zone.top,
            zone_bottom: zone.bottom,
            price: bar.close(),
        })
    }

    /// Evaluate all seven criteria for `zone` filled at `index`
    pub fn score<T: OHLC>(
        &self,
        bars: &[T],
        contexts: &[MarketContext],
        zone: &GapZone,
        index: usize,
    ) -> ScoreBreakdown {
        let bullish = zone.direction.is_bullish();
        ScoreBreakdown {
            market_structure: CriterionScore::evaluate(
                Criterion::MarketStructure,
                self.market_structure(bars, contexts, zone.direction, index),
            ),
            session: CriterionScore::evaluate(
                Criterion::Session,
                bars.get(index)
                    .is_some_and(|b| helpers::in_session(b.time(), &self.params.session)),
            ),
            order_block: CriterionScore::evaluate(
                Criterion::OrderBlock,
                self.order_block(bars, zone, index),
            ),
            fair_value_gap: CriterionScore::evaluate(Criterion::FairValueGap, true),
            liquidity_sweep: CriterionScore::evaluate(
                Criterion::LiquiditySweep,
                self.liquidity_sweep(bars, zone),
            ),
            discount_premium: CriterionScore::evaluate(
                Criterion::DiscountPremium,
                self.discount_premium(bars, bullish, index),
            ),
            rejection: CriterionScore::evaluate(
                Criterion::Rejection,
                bars.get(index).is_some_and(|b| self.rejection(b, bullish)),
            ),
        }
    }

    /// Close on the trend side of the SMA at the mitigation bar
    fn market_structure<T: OHLC>(
        &self,
        bars: &[T],
        contexts: &[MarketContext],
        direction: Direction,
        index: usize,
    ) -> bool {
        let (Some(bar), Some(sma)) = (bars.get(index), contexts.get(index).and_then(|c| c.trend_sma)) else {
            return false;
        };
        match direction {
            Direction::Bullish => bar.close() > sma,
            Direction::Bearish => bar.close() < sma,
        }
    }

    /// A recent low (long) or high (short) sits on the zone edge
    fn order_block<T: OHLC>(&self, bars: &[T], zone: &GapZone, index: usize) -> bool {
        let window = helpers::lookback(index, self.params.order_block_lookback.get());
        let Some(recent) = bars.get(window) else {
            return false;
        };
        let edge = zone.edge();
        let tolerance = self.params.order_block_tolerance.get();
        recent.iter().any(|b| {
            let probe = match zone.direction {
                Direction::Bullish => b.low(),
                Direction::Bearish => b.high(),
            };
            helpers::within_tolerance(probe, edge, tolerance)
        })
    }

    /// The candle before the formation candle ran the stops beyond the prior swing
    fn liquidity_sweep<T: OHLC>(&self, bars: &[T], zone: &GapZone) -> bool {
        let Some(sweep_index) = zone.formation_index.checked_sub(1) else {
            return false;
        };
        let Some(sweep) = bars.get(sweep_index) else {
            return false;
        };
        let window = helpers::lookback(sweep_index, self.params.sweep_lookback.get());
        let penetration = self.params.sweep_tolerance.get();

        match zone.direction {
            Direction::Bullish => helpers::lowest_low(bars, window)
                .is_some_and(|swing_low| sweep.low() < swing_low - swing_low.abs() * penetration),
            Direction::Bearish => helpers::highest_high(bars, window)
                .is_some_and(|swing_high| sweep.high() > swing_high + swing_high.abs() * penetration),
        }
    }

    /// Close below the dealing-range midpoint for longs, above it for shorts
    fn discount_premium<T: OHLC>(&self, bars: &[T], bullish: bool, index: usize) -> bool {
        let window = helpers::lookback(index, self.params.range_lookback.get());
        let (Some(high), Some(low), Some(bar)) = (
            helpers::highest_high(bars, window.clone()),
            helpers::lowest_low(bars, window),
            bars.get(index),
        ) else {
            return false;
        };
        let mid = (high + low) / 2.0;
        if bullish {
            bar.close() < mid
        } else {
            bar.close() > mid
        }
    }

    /// Wick against the trade direction longer than the configured share of the body
    fn rejection<T: OHLC>(&self, bar: &T, bullish: bool) -> bool {
        if bar.range() <= f64::EPSILON {
            return false;
        }
        let wick = if bullish { bar.lower_wick() } else { bar.upper_wick() };
        wick > bar.body() * self.params.rejection_wick_ratio.get()
    }
}
