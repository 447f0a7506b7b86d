//! Engine parameters and their metadata
//!
//! Every threshold the detector and scorer use lives in [`ConfluenceParams`]. The
//! struct deserializes with defaults for missing fields, so a partial JSON document
//! is a valid configuration.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use fvg_confluence::params::ConfluenceParams;
//!
//! let mut overrides = HashMap::new();
//! overrides.insert("order_block_tolerance", 0.005);
//! let params = ConfluenceParams::with_params(&overrides).unwrap();
//! assert_eq!(params.order_block_tolerance.get(), 0.005);
//!
//! for meta in ConfluenceParams::param_meta() {
//!     println!("{}: {:?} (default: {})", meta.name, meta.param_type, meta.default);
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::{ConfluenceError, Factor, Period, Ratio, Result};

// ============================================================
// PARAMETER METADATA
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Positive bar count
  Period,
  /// Positive multiplier
  Factor,
  /// Integer score on the 0..=100 scale
  Score,
}

/// Metadata for a single numeric parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Accepted range (min, max), inclusive
  pub range: (f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  const fn new(
    name: &'static str,
    param_type: ParamType,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(ConfluenceError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period | ParamType::Score if value.fract() != 0.0 => {
        Err(ConfluenceError::InvalidValue("Period and score parameters must be integers"))
      },
      _ => Ok(()),
    }
  }
}

static PARAM_META: [ParamMeta; 10] = [
  ParamMeta::new(
    "trend_period",
    ParamType::Period,
    50.0,
    (2.0, 500.0),
    "SMA period for trend alignment; also the minimum history length",
  ),
  ParamMeta::new(
    "displacement_period",
    ParamType::Period,
    14.0,
    (1.0, 200.0),
    "Bars averaged when judging the middle candle's body",
  ),
  ParamMeta::new(
    "displacement_factor",
    ParamType::Factor,
    1.5,
    (0.1, 10.0),
    "Middle candle body must exceed this multiple of the average body",
  ),
  ParamMeta::new(
    "order_block_lookback",
    ParamType::Period,
    20.0,
    (1.0, 500.0),
    "Bars before mitigation searched for a wick at the zone edge",
  ),
  ParamMeta::new(
    "order_block_tolerance",
    ParamType::Ratio,
    0.003,
    (0.0, 0.05),
    "Relative distance from the zone edge that still counts as an order block",
  ),
  ParamMeta::new(
    "sweep_lookback",
    ParamType::Period,
    10.0,
    (1.0, 200.0),
    "Bars whose extreme the pre-formation candle must break",
  ),
  ParamMeta::new(
    "sweep_tolerance",
    ParamType::Ratio,
    0.0,
    (0.0, 0.05),
    "Minimum relative penetration beyond the swing extreme",
  ),
  ParamMeta::new(
    "range_lookback",
    ParamType::Period,
    40.0,
    (2.0, 1000.0),
    "Bars forming the dealing range for discount/premium",
  ),
  ParamMeta::new(
    "rejection_wick_ratio",
    ParamType::Factor,
    0.5,
    (0.05, 10.0),
    "Opposite wick must exceed this multiple of the body",
  ),
  ParamMeta::new(
    "min_score",
    ParamType::Score,
    60.0,
    (0.0, 100.0),
    "Minimum composite score for a mitigation to become a signal",
  ),
];

// ============================================================
// SESSION WINDOWS
// ============================================================

/// Half-open intraday window `[start, end)` in local wall-clock minutes.
///
/// Serialized as `{"start": "08:30", "end": "11:00"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
  start: u16,
  end: u16,
}

impl SessionWindow {
  /// Create a window from `(hour, minute)` pairs. `(24, 0)` is accepted as an end.
  pub fn new(start: (u16, u16), end: (u16, u16)) -> Result<Self> {
    let window = Self { start: to_minutes(start)?, end: to_minutes(end)? };
    if window.start >= window.end {
      return Err(ConfluenceError::InvalidConfig(format!(
        "session window {window} must start before it ends"
      )));
    }
    Ok(window)
  }

  const fn new_const(start: u16, end: u16) -> Self {
    Self { start, end }
  }

  #[inline]
  pub fn start_minute(&self) -> u16 {
    self.start
  }

  #[inline]
  pub fn end_minute(&self) -> u16 {
    self.end
  }

  #[inline]
  pub fn contains(&self, minute_of_day: u16) -> bool {
    (self.start..self.end).contains(&minute_of_day)
  }
}

fn to_minutes((hour, minute): (u16, u16)) -> Result<u16> {
  if minute >= 60 || hour > 24 || (hour == 24 && minute != 0) {
    return Err(ConfluenceError::InvalidConfig(format!("invalid time of day {hour:02}:{minute:02}")));
  }
  Ok(hour * 60 + minute)
}

fn parse_hhmm(s: &str) -> Result<u16> {
  let invalid = || ConfluenceError::InvalidConfig(format!("expected HH:MM, got {s:?}"));
  let (h, m) = s.split_once(':').ok_or_else(invalid)?;
  let hour = h.trim().parse::<u16>().map_err(|_| invalid())?;
  let minute = m.trim().parse::<u16>().map_err(|_| invalid())?;
  to_minutes((hour, minute))
}

impl fmt::Display for SessionWindow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:02}:{:02}-{:02}:{:02}",
      self.start / 60,
      self.start % 60,
      self.end / 60,
      self.end % 60
    )
  }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SessionWindowRepr {
  start: String,
  end: String,
}

impl serde::Serialize for SessionWindow {
  fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
    let repr = SessionWindowRepr {
      start: format!("{:02}:{:02}", self.start / 60, self.start % 60),
      end: format!("{:02}:{:02}", self.end / 60, self.end % 60),
    };
    serde::Serialize::serialize(&repr, s)
  }
}

impl<'de> serde::Deserialize<'de> for SessionWindow {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
    let repr = <SessionWindowRepr as serde::Deserialize>::deserialize(d)?;
    let start = parse_hhmm(&repr.start).map_err(serde::de::Error::custom)?;
    let end = parse_hhmm(&repr.end).map_err(serde::de::Error::custom)?;
    SessionWindow::new((start / 60, start % 60), (end / 60, end % 60)).map_err(serde::de::Error::custom)
  }
}

/// Session-overlap settings.
///
/// Windows are expressed in exchange-local time and converted with a fixed UTC
/// offset; daylight saving is not applied.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionParams {
  /// Local time = UTC + offset. New York winter time is -300.
  pub utc_offset_minutes: i32,
  /// Epoch values below this are not intraday timestamps.
  pub intraday_threshold: i64,
  pub windows: Vec<SessionWindow>,
}

impl Default for SessionParams {
  fn default() -> Self {
    Self {
      utc_offset_minutes: -300,
      intraday_threshold: 1_000_000_000,
      windows: vec![
        // New York morning 08:30-11:00
        SessionWindow::new_const(510, 660),
        // New York afternoon 13:30-16:00
        SessionWindow::new_const(810, 960),
      ],
    }
  }
}

impl SessionParams {
  pub fn validate(&self) -> Result<()> {
    if !(-14 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
      return Err(ConfluenceError::OutOfRange {
        field: "utc_offset_minutes",
        value: self.utc_offset_minutes as f64,
        min: -840.0,
        max: 840.0,
      });
    }
    for window in &self.windows {
      if window.start >= window.end || window.end > 24 * 60 {
        return Err(ConfluenceError::InvalidConfig(format!("invalid session window {window}")));
      }
    }
    Ok(())
  }
}

// ============================================================
// ENGINE PARAMETERS
// ============================================================

/// All tunables of zone detection and confluence scoring
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConfluenceParams {
  /// Require trend alignment and displacement before a gap becomes a zone
  pub strict: bool,
  pub trend_period: Period,
  pub displacement_period: Period,
  pub displacement_factor: Factor,
  pub order_block_lookback: Period,
  pub order_block_tolerance: Ratio,
  pub sweep_lookback: Period,
  pub sweep_tolerance: Ratio,
  pub range_lookback: Period,
  pub rejection_wick_ratio: Factor,
  pub min_score: u8,
  pub session: SessionParams,
}

impl Default for ConfluenceParams {
  fn default() -> Self {
    Self {
      strict: true,
      trend_period: Period::new_const(50),
      displacement_period: Period::new_const(14),
      displacement_factor: Factor::new_const(1.5),
      order_block_lookback: Period::new_const(20),
      order_block_tolerance: Ratio::new_const(0.003),
      sweep_lookback: Period::new_const(10),
      sweep_tolerance: Ratio::new_const(0.0),
      range_lookback: Period::new_const(40),
      rejection_wick_ratio: Factor::new_const(0.5),
      min_score: 60,
      session: SessionParams::default(),
    }
  }
}

impl ConfluenceParams {
  /// Metadata for every numeric parameter
  pub fn param_meta() -> &'static [ParamMeta] {
    &PARAM_META
  }

  /// Build parameters from numeric overrides; missing keys keep their defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    if let Some(unknown) = params.keys().find(|k| !PARAM_META.iter().any(|m| m.name == **k)) {
      return Err(ConfluenceError::InvalidConfig(format!("unknown parameter {unknown:?}")));
    }

    let value = |name: &str| -> Result<f64> {
      let meta = meta_for(name)?;
      let value = params.get(name).copied().unwrap_or(meta.default);
      meta.validate(value)?;
      Ok(value)
    };

    let built = Self {
      trend_period: Period::new(value("trend_period")? as usize)?,
      displacement_period: Period::new(value("displacement_period")? as usize)?,
      displacement_factor: Factor::new(value("displacement_factor")?)?,
      order_block_lookback: Period::new(value("order_block_lookback")? as usize)?,
      order_block_tolerance: Ratio::new(value("order_block_tolerance")?)?,
      sweep_lookback: Period::new(value("sweep_lookback")? as usize)?,
      sweep_tolerance: Ratio::new(value("sweep_tolerance")?)?,
      range_lookback: Period::new(value("range_lookback")? as usize)?,
      rejection_wick_ratio: Factor::new(value("rejection_wick_ratio")?)?,
      min_score: value("min_score")? as u8,
      ..Self::default()
    };
    built.validate()?;
    Ok(built)
  }

  /// Check cross-field constraints and metadata ranges
  pub fn validate(&self) -> Result<()> {
    let checks = [
      ("trend_period", self.trend_period.get() as f64),
      ("displacement_period", self.displacement_period.get() as f64),
      ("displacement_factor", self.displacement_factor.get()),
      ("order_block_lookback", self.order_block_lookback.get() as f64),
      ("order_block_tolerance", self.order_block_tolerance.get()),
      ("sweep_lookback", self.sweep_lookback.get() as f64),
      ("sweep_tolerance", self.sweep_tolerance.get()),
      ("range_lookback", self.range_lookback.get() as f64),
      ("rejection_wick_ratio", self.rejection_wick_ratio.get()),
      ("min_score", self.min_score as f64),
    ];
    for (name, value) in checks {
      meta_for(name)?.validate(value)?;
    }
    self.session.validate()
  }

  /// Bars required before detection runs at all
  #[inline]
  pub fn min_bars(&self) -> usize {
    self.trend_period.get().max(3)
  }
}

fn meta_for(name: &str) -> Result<&'static ParamMeta> {
  PARAM_META
    .iter()
    .find(|m| m.name == name)
    .ok_or_else(|| ConfluenceError::InvalidConfig(format!("unknown parameter {name:?}")))
}

// ============================================================
// TESTS
// ============================================================
