//! Chart annotations for formed zones and scored entries

use crate::{
    fvg::{GapZone, Signal},
    time::CandleTime,
    Direction, Side,
};

pub const BULLISH_COLOR: &str = "#26a69a";
pub const BEARISH_COLOR: &str = "#ef5350";
pub const LONG_COLOR: &str = "#2196f3";
pub const SHORT_COLOR: &str = "#ff9800";

/// Entries scoring at least this get the heavier marker weight
pub const STRONG_SIGNAL_SCORE: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerAnchor {
    AboveBar,
    BelowBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
    Circle,
    Square,
}

/// Marker in the shape charting front ends consume
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChartMarker {
    pub time: CandleTime,
    pub anchor: MarkerAnchor,
    pub color: String,
    pub shape: MarkerShape,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
}

impl ChartMarker {
    /// Marker on the third candle of a newly formed zone
    pub fn formation(zone: &GapZone) -> Self {
        let (anchor, color, label) = match zone.direction {
            Direction::Bullish => (MarkerAnchor::BelowBar, BULLISH_COLOR, "FVG+"),
            Direction::Bearish => (MarkerAnchor::AboveBar, BEARISH_COLOR, "FVG-"),
        };
        Self {
            time: zone.formation_time,
            anchor,
            color: color.to_string(),
            shape: MarkerShape::Circle,
            label: label.to_string(),
            weight: None,
        }
    }

    /// Marker on the mitigating candle of a signal
    pub fn entry(signal: &Signal) -> Self {
        let (anchor, color, shape) = match signal.direction {
            Side::Long => (MarkerAnchor::BelowBar, LONG_COLOR, MarkerShape::ArrowUp),
            Side::Short => (MarkerAnchor::AboveBar, SHORT_COLOR, MarkerShape::ArrowDown),
        };
        let weight = if signal.total_score >= STRONG_SIGNAL_SCORE { 2 } else { 1 };
        Self {
            time: signal.time,
            anchor,
            color: color.to_string(),
            shape,
            label: format!("{} {}", signal.direction.as_str(), signal.total_score),
            weight: Some(weight),
        }
    }

    #[inline]
    pub fn is_entry(&self) -> bool {
        self.weight.is_some()
    }
}
