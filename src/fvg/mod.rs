//! Fair value gap detection and confluence scoring
//!
//! The pass is split into two phases that the engine runs in one forward loop:
//!
//! - [`ZoneDetector`]: finds three-candle gaps and promotes them to [`GapZone`]s.
//! - [`MitigationScorer`]: watches open zones for the first candle that trades back
//!   into them and scores that candle against seven confluence criteria.
//!
//! Both phases are usable on their own for callers that drive the loop themselves.

pub mod helpers;
pub mod marker;
pub mod scoring;
pub mod zone;

pub use marker::*;
pub use scoring::*;
pub use zone::*;
