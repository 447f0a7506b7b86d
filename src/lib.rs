//! # fvg-confluence - Fair Value Gap detection with confluence scoring
//!
//! Scans an ascending OHLC candle history for three-candle fair value gaps, tracks
//! each gap until price first returns into it, scores that mitigation against seven
//! confluence criteria and emits chart markers plus scored trade signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use fvg_confluence::prelude::*;
//!
//! // Candles straight from a history endpoint
//! let json = r#"[
//!     {"time": 1704153600, "open": 100.0, "high": 101.0, "low": 99.5, "close": 100.5},
//!     {"time": 1704154500, "open": 100.5, "high": 102.0, "low": 100.2, "close": 101.8}
//! ]"#;
//! let candles: Vec<Candle> = serde_json::from_str(json).unwrap();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let analysis = engine.analyze(&candles).unwrap();
//!
//! // Fewer candles than the trend period: nothing to report
//! assert!(analysis.markers.is_empty());
//! assert!(analysis.signals.is_empty());
//! ```
//!
//! Bring your own bar type by implementing [`OHLC`]:
//!
//! ```rust
//! use fvg_confluence::prelude::*;
//!
//! struct Bar { t: i64, o: f64, h: f64, l: f64, c: f64 }
//!
//! impl OHLC for Bar {
//!     fn time(&self) -> CandleTime { CandleTime::Epoch(self.t) }
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//! }
//!
//! let engine = EngineBuilder::new().min_score(70).build().unwrap();
//! let bars: Vec<Bar> = vec![];
//! let analysis = engine.analyze(&bars).unwrap();
//! assert!(analysis.recent_signals(5).is_empty());
//! ```

pub mod fvg;
pub mod params;
pub mod time;

pub mod prelude {
    pub use crate::{
        // Phases
        fvg::*,
        // Parameters
        params::{ConfluenceParams, ParamMeta, ParamType, SessionParams, SessionWindow},
        // Time
        time::CandleTime,
        // Parallel
        analyze_parallel,
        // Output
        Analysis,
        // Data
        Candle,
        // Context
        ContextProvider,
        DefaultContextProvider,
        Direction,
        // Engine
        EngineBuilder,
        EngineConfig,
        // Errors
        ConfluenceError,
        Factor,
        FvgEngine,
        MarketContext,
        OHLCExt,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        ScanStats,
        Side,
        OHLC,
    };
}

use fvg::{ChartMarker, GapZone, MitigationScorer, Signal, ZoneDetector};
use params::ConfluenceParams;
use time::CandleTime;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ConfluenceError>;

/// Errors raised by parameter validation and optional input validation
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfluenceError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Candle at index {index} is not later than its predecessor")]
    Unordered { index: usize },

    #[error("Invalid candle time: {0:?}")]
    InvalidTime(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in 0.0..=1.0, used for tolerance bands
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(ConfluenceError::InvalidValue("Ratio must be finite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfluenceError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Lookback length in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ConfluenceError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Positive finite multiplier (displacement factor, wick/body ratio)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Factor(f64);

impl Factor {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfluenceError::InvalidValue("Factor must be finite and > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

macro_rules! impl_validated_serde {
    ($($ty:ident($inner:ty)),* $(,)?) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                    serde::Serialize::serialize(&self.0, s)
                }
            }

            impl<'de> serde::Deserialize<'de> for $ty {
                fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                    let value = <$inner as serde::Deserialize>::deserialize(d)?;
                    $ty::new(value).map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

impl_validated_serde!(Ratio(f64), Period(usize), Factor(f64));

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core candle trait
pub trait OHLC {
    fn time(&self) -> CandleTime;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

/// Computed candle geometry
pub trait OHLCExt: OHLC {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate price consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(ConfluenceError::InvalidCandle {
                index: 0,
                reason: "NaN price",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(ConfluenceError::InvalidCandle {
                index: 0,
                reason: "infinite price",
            });
        }
        if self.high() < self.low() {
            return Err(ConfluenceError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLC> OHLCExt for T {}

/// Normalized candle as delivered by a history provider
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub time: CandleTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Carried through for callers, ignored by detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    pub fn new(time: impl Into<CandleTime>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time: time.into(),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }
}

impl OHLC for Candle {
    #[inline]
    fn time(&self) -> CandleTime {
        self.time
    }

    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }
}

// ============================================================
// DIRECTION
// ============================================================

/// Direction of a gap zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// Trade side taken when a zone of this direction is mitigated
    #[inline]
    pub fn side(self) -> Side {
        match self {
            Direction::Bullish => Side::Long,
            Direction::Bearish => Side::Short,
        }
    }
}

/// Trade side of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Per-bar values shared by detection and scoring.
///
/// `None` means the value is still warming up; every filter that depends on it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketContext {
    /// Simple moving average of closes over `trend_period` bars ending here
    pub trend_sma: Option<f64>,
    /// Mean absolute body over `displacement_period` bars ending here
    pub avg_body: Option<f64>,
}

/// Provider of market context - precomputes context for all bars
pub trait ContextProvider: Send + Sync {
    fn compute_all<T: OHLC>(&self, bars: &[T], params: &ConfluenceParams) -> Vec<MarketContext>;
}

/// Simple moving averages over the configured periods
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextProvider;

impl ContextProvider for DefaultContextProvider {
    fn compute_all<T: OHLC>(&self, bars: &[T], params: &ConfluenceParams) -> Vec<MarketContext> {
        let trend_period = params.trend_period.get();
        let body_period = params.displacement_period.get();

        (0..bars.len())
            .map(|i| MarketContext {
                trend_sma: fvg::helpers::sma_close(bars, i, trend_period),
                avg_body: fvg::helpers::avg_body(bars, i, body_period),
            })
            .collect()
    }
}

// ============================================================
// ANALYSIS OUTPUT
// ============================================================

/// Counters for one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub bars: usize,
    pub zones_formed: usize,
    pub zones_mitigated: usize,
    pub signals: usize,
}

/// Result of one pass: markers and signals, each ascending by time
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Analysis {
    pub markers: Vec<ChartMarker>,
    pub signals: Vec<Signal>,
    pub stats: ScanStats,
}

impl Analysis {
    /// The latest `n` signals, oldest first
    pub fn recent_signals(&self, n: usize) -> &[Signal] {
        &self.signals[self.signals.len().saturating_sub(n)..]
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.signals.is_empty()
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Engine configuration outside the detection parameters
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Reject non-finite prices, `high < low` and non-ascending times
    pub validate_data: bool,
}

/// Fair value gap detection and scoring engine
#[derive(Debug, Clone)]
pub struct FvgEngine<C: ContextProvider = DefaultContextProvider> {
    params: ConfluenceParams,
    context_provider: C,
    config: EngineConfig,
}

impl<C: ContextProvider> FvgEngine<C> {
    #[inline]
    pub fn params(&self) -> &ConfluenceParams {
        &self.params
    }

    /// Bars required before any zone can form
    #[inline]
    pub fn min_bars(&self) -> usize {
        self.params.min_bars()
    }

    /// Precompute contexts for all bars
    #[inline]
    pub fn compute_contexts<T: OHLC>(&self, bars: &[T]) -> Vec<MarketContext> {
        self.context_provider.compute_all(bars, &self.params)
    }

    /// Run detection and scoring over the whole history.
    ///
    /// Histories shorter than [`min_bars`](Self::min_bars) yield an empty analysis.
    pub fn analyze<T: OHLC>(&self, bars: &[T]) -> Result<Analysis> {
        if self.config.validate_data {
            validate_bars(bars).inspect_err(|e| tracing::warn!("rejected candle batch: {e}"))?;
        }

        if bars.len() < self.min_bars() {
            tracing::debug!(
                bars = bars.len(),
                required = self.min_bars(),
                "history too short for detection"
            );
            return Ok(Analysis {
                stats: ScanStats {
                    bars: bars.len(),
                    ..ScanStats::default()
                },
                ..Analysis::default()
            });
        }

        let contexts = self.compute_contexts(bars);
        Ok(self.analyze_with_contexts(bars, &contexts))
    }

    /// Single forward pass over `bars` with precomputed contexts.
    ///
    /// At each index open zones are checked for mitigation first, then the index is
    /// checked for a new zone, so a zone never meets its own formation candle. One
    /// candle may fill several zones; each is scored on its own. Filled zones are
    /// dropped before the next candle, so only open zones are ever walked.
    pub fn analyze_with_contexts<T: OHLC>(&self, bars: &[T], contexts: &[MarketContext]) -> Analysis {
        let detector = ZoneDetector::new(&self.params);
        let scorer = MitigationScorer::new(&self.params);

        let mut zones: Vec<GapZone> = Vec::new();
        let mut markers = Vec::new();
        let mut signals = Vec::new();
        let mut stats = ScanStats {
            bars: bars.len(),
            ..ScanStats::default()
        };

        if bars.len() < self.min_bars() {
            return Analysis {
                stats,
                ..Analysis::default()
            };
        }

        for index in 2..bars.len() {
            for zone in zones.iter_mut() {
                let Some(mitigation) = scorer.check(bars, contexts, zone, index) else {
                    continue;
                };
                stats.zones_mitigated += 1;

                match scorer.signal(bars, zone, &mitigation) {
                    Some(signal) => {
                        tracing::debug!(
                            index,
                            side = signal.direction.as_str(),
                            score = signal.total_score,
                            "fair value gap mitigated with confluence"
                        );
                        markers.push(ChartMarker::entry(&signal));
                        signals.push(signal);
                        stats.signals += 1;
                    }
                    None => tracing::trace!(
                        index,
                        formed_at = zone.formation_index,
                        score = mitigation.total_score,
                        "mitigation below score threshold"
                    ),
                }
            }

            zones.retain(GapZone::is_open);

            if let Some(zone) = detector.detect_at(bars, contexts, index) {
                tracing::debug!(
                    index,
                    direction = ?zone.direction,
                    top = zone.top,
                    bottom = zone.bottom,
                    "fair value gap formed"
                );
                markers.push(ChartMarker::formation(&zone));
                zones.push(zone);
                stats.zones_formed += 1;
            }
        }

        markers.sort_by_key(|m| m.time.sort_key());
        signals.sort_by_key(|s| s.time.sort_key());

        tracing::debug!(
            bars = stats.bars,
            zones = stats.zones_formed,
            mitigated = stats.zones_mitigated,
            signals = stats.signals,
            "analysis complete"
        );

        Analysis {
            markers,
            signals,
            stats,
        }
    }
}

fn validate_bars<T: OHLC>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            ConfluenceError::InvalidCandle { reason, .. } => {
                ConfluenceError::InvalidCandle { index: i, reason }
            }
            other => other,
        })?;
        if i > 0 && bar.time().sort_key() <= bars[i - 1].time().sort_key() {
            return Err(ConfluenceError::Unordered { index: i });
        }
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating FvgEngine instances
pub struct EngineBuilder<C: ContextProvider = DefaultContextProvider> {
    params: ConfluenceParams,
    context_provider: C,
    config: EngineConfig,
}

impl Default for EngineBuilder<DefaultContextProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<DefaultContextProvider> {
    pub fn new() -> Self {
        Self {
            params: ConfluenceParams::default(),
            context_provider: DefaultContextProvider,
            config: EngineConfig::default(),
        }
    }
}

impl<C: ContextProvider> EngineBuilder<C> {
    /// Change context provider
    pub fn context_provider<C2: ContextProvider>(self, provider: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            params: self.params,
            context_provider: provider,
            config: self.config,
        }
    }

    /// Replace all detection parameters
    pub fn params(mut self, params: ConfluenceParams) -> Self {
        self.params = params;
        self
    }

    /// Enable/disable trend and displacement gating
    pub fn strict(mut self, strict: bool) -> Self {
        self.params.strict = strict;
        self
    }

    /// Set the minimum composite score for signals
    pub fn min_score(mut self, score: u8) -> Self {
        self.params.min_score = score;
        self
    }

    /// Enable/disable input validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<FvgEngine<C>> {
        self.params.validate()?;
        Ok(FvgEngine {
            params: self.params,
            context_provider: self.context_provider,
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::{iter::Either, prelude::*};

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub analysis: Analysis,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: ConfluenceError,
}

/// Run one independent pass per instrument on the rayon pool.
///
/// Instruments whose candles fail validation (only possible with
/// [`EngineConfig::validate_data`]) land in the second vector tagged with their
/// symbol; they never abort the other passes. Neither vector keeps input order.
pub fn analyze_parallel<'a, T, I, C>(
    engine: &FvgEngine<C>,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    C: ContextProvider + Sync,
{
    instruments
        .into_par_iter()
        .partition_map(|(symbol, bars)| match engine.analyze(bars) {
            Ok(analysis) => Either::Left(ScanResult {
                symbol: symbol.to_string(),
                analysis,
            }),
            Err(error) => {
                tracing::warn!(symbol, %error, "instrument skipped");
                Either::Right(ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
            }
        })
}

/// Default engine with DefaultContextProvider
pub type DefaultEngine = FvgEngine<DefaultContextProvider>;

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(1_704_153_600 + i as i64 * 900, 100.0, 101.0, 99.0, 100.5))
            .collect()
    }

    /// Loose-mode history with one bullish gap at index 52 that index 55 fills
    fn gap_then_fill() -> Vec<Candle> {
        let mut bars = flat_bars(56);
        bars[51] = Candle::new(bars[51].time, 100.5, 103.0, 100.4, 102.8);
        bars[52] = Candle::new(bars[52].time, 102.8, 104.0, 102.0, 103.5);
        bars[53] = Candle::new(bars[53].time, 103.5, 104.2, 103.0, 103.8);
        bars[54] = Candle::new(bars[54].time, 103.8, 104.0, 102.9, 103.0);
        bars[55] = Candle::new(bars[55].time, 103.0, 103.2, 101.5, 101.8);
        bars
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_and_factor_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(0).is_err());
        assert!(Factor::new(1.5).is_ok());
        assert!(Factor::new(0.0).is_err());
        assert!(Factor::new(f64::NAN).is_err());
    }

    #[test]
    fn test_ohlc_ext() {
        let bar = Candle::new(0_i64, 100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.upper_wick(), 5.0);
        assert_eq!(bar.lower_wick(), 10.0);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
    }

    #[test]
    fn test_direction_side() {
        assert_eq!(Direction::Bullish.side(), Side::Long);
        assert_eq!(Direction::Bearish.side(), Side::Short);
        assert_eq!(serde_json::to_string(&Side::Long).unwrap(), "\"LONG\"");
    }

    #[test]
    fn test_engine_builder_rejects_bad_params() {
        assert!(EngineBuilder::new().build().is_ok());
        assert!(EngineBuilder::new().min_score(101).build().is_err());
    }

    #[test]
    fn test_empty_scan() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars: Vec<Candle> = vec![];
        let analysis = engine.analyze(&bars).unwrap();
        assert!(analysis.is_empty());
        assert_eq!(analysis.stats.bars, 0);
    }

    #[test]
    fn test_short_history_is_empty() {
        let engine = EngineBuilder::new().strict(false).build().unwrap();
        let mut bars = gap_then_fill();
        bars.drain(..7);
        assert_eq!(bars.len(), 49);
        assert!(engine.analyze(&bars).unwrap().is_empty());
    }

    #[test]
    fn test_loose_mode_forms_and_mitigates() {
        let engine = EngineBuilder::new().strict(false).min_score(0).build().unwrap();
        let analysis = engine.analyze(&gap_then_fill()).unwrap();

        assert_eq!(analysis.stats.zones_formed, 1);
        assert_eq!(analysis.stats.zones_mitigated, 1);
        assert_eq!(analysis.signals.len(), 1);
        assert_eq!(analysis.signals[0].direction, Side::Long);
        assert_eq!(analysis.signals[0].time, CandleTime::Epoch(1_704_153_600 + 55 * 900));
        assert_eq!(analysis.markers.len(), 2);
    }

    #[test]
    fn test_open_zones_survive_pruning_of_filled_ones() {
        let gap_and_fill = [
            (100.5, 103.0, 100.4, 102.8),
            (102.8, 104.0, 102.0, 103.5),
            (103.5, 104.2, 103.0, 103.8),
            (103.8, 104.0, 102.9, 103.0),
            (103.0, 103.2, 101.5, 101.8),
        ];
        let mut ohlc = vec![(100.0, 101.0, 99.0, 100.5); 51];
        ohlc.extend(gap_and_fill);
        ohlc.extend([(101.8, 102.2, 100.6, 100.8), (100.8, 101.2, 99.5, 100.5)]);
        ohlc.extend([(100.0, 101.0, 99.0, 100.5); 2]);
        ohlc.extend(gap_and_fill);
        ohlc.push((101.8, 102.2, 100.6, 100.8));
        let bars: Vec<Candle> = ohlc
            .into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c))| Candle::new(1_704_153_600 + i as i64 * 900, o, h, l, c))
            .collect();

        let engine = EngineBuilder::new().strict(false).min_score(0).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();

        assert_eq!(analysis.stats.zones_formed, 5);
        assert_eq!(analysis.stats.zones_mitigated, 3);
        // The bearish zone from index 56 outlives two filled bullish zones
        let filled: Vec<(i64, i64)> = analysis
            .signals
            .iter()
            .map(|s| (s.time.sort_key(), s.formation_time.sort_key()))
            .collect();
        let at = |i: i64| 1_704_153_600 + i * 900;
        assert_eq!(filled, vec![(at(55), at(52)), (at(64), at(61)), (at(65), at(56))]);
        assert_eq!(analysis.signals[2].direction, Side::Short);
    }

    #[test]
    fn test_strict_mode_filters_weak_gap() {
        // Trend agrees, but the middle candle has no body to speak of
        let engine = EngineBuilder::new().build().unwrap();
        let mut bars = flat_bars(56);
        bars[51] = Candle::new(bars[51].time, 100.5, 101.0, 99.0, 100.5);
        bars[52] = Candle::new(bars[52].time, 101.2, 101.6, 101.1, 101.5);
        let analysis = engine.analyze(&bars).unwrap();
        assert_eq!(analysis.stats.zones_formed, 0);
    }

    #[test]
    fn test_validate_data() {
        let engine = EngineBuilder::new().validate_data(true).build().unwrap();

        let mut bars = flat_bars(5);
        bars[3].high = 98.0;
        match engine.analyze(&bars) {
            Err(ConfluenceError::InvalidCandle { index, .. }) => assert_eq!(index, 3),
            other => panic!("expected InvalidCandle, got {other:?}"),
        }

        let mut bars = flat_bars(5);
        bars[4].time = bars[2].time;
        assert!(matches!(engine.analyze(&bars), Err(ConfluenceError::Unordered { index: 4 })));
    }

    #[test]
    fn test_recent_signals() {
        let engine = EngineBuilder::new().strict(false).min_score(0).build().unwrap();
        let analysis = engine.analyze(&gap_then_fill()).unwrap();
        assert_eq!(analysis.recent_signals(3).len(), 1);
        assert_eq!(analysis.recent_signals(0).len(), 0);
    }

    #[test]
    fn test_custom_context_provider() {
        struct NoTrend;

        impl ContextProvider for NoTrend {
            fn compute_all<T: OHLC>(&self, bars: &[T], _params: &ConfluenceParams) -> Vec<MarketContext> {
                vec![MarketContext::default(); bars.len()]
            }
        }

        let engine = EngineBuilder::new().context_provider(NoTrend).build().unwrap();
        let analysis = engine.analyze(&gap_then_fill()).unwrap();
        assert_eq!(analysis.stats.zones_formed, 0);
    }

    #[test]
    fn test_compute_contexts_warmup() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars = flat_bars(60);
        let contexts = engine.compute_contexts(&bars);
        assert_eq!(contexts.len(), 60);
        assert!(contexts[48].trend_sma.is_none());
        assert_eq!(contexts[49].trend_sma, Some(100.5));
        assert!(contexts[12].avg_body.is_none());
        assert_eq!(contexts[13].avg_body, Some(0.5));
    }

    #[test]
    fn test_parallel_scan() {
        let engine = EngineBuilder::new().strict(false).min_score(0).build().unwrap();

        let bars1 = gap_then_fill();
        let bars2 = flat_bars(60);

        let instruments: Vec<(&str, &[Candle])> = vec![("EURUSD", bars1.as_slice()), ("XAUUSD", bars2.as_slice())];

        let (results, errors) = analyze_parallel(&engine, instruments);
        assert_eq!(results.len(), 2);
        assert!(errors.is_empty());
        let eurusd = results.iter().find(|r| r.symbol == "EURUSD").unwrap();
        assert_eq!(eurusd.analysis.signals.len(), 1);
    }

    #[test]
    fn test_parallel_scan_reports_errors() {
        let engine = EngineBuilder::new().validate_data(true).build().unwrap();
        let mut broken = flat_bars(5);
        broken[1].close = f64::NAN;
        let fine = flat_bars(5);

        let instruments: Vec<(&str, &[Candle])> = vec![("BAD", broken.as_slice()), ("OK", fine.as_slice())];
        let (results, errors) = analyze_parallel(&engine, instruments);
        assert_eq!(results.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol, "BAD");
        assert!(matches!(errors[0].error, ConfluenceError::InvalidCandle { index: 1, .. }));
        assert_eq!(results[0].symbol, "OK");
    }
}
