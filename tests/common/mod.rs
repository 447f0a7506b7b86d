//! Candle fixtures shared by the integration tests.

#![allow(dead_code)]

use fvg_confluence::prelude::*;

/// 2024-01-02 00:15 UTC; with 15 minute bars index 55 lands on 09:00 New York
pub const T0: i64 = 1_704_154_500;
pub const STEP: i64 = 900;

/// Route engine logs to the test harness. `RUST_LOG=fvg_confluence=trace` shows every
/// mitigation, scored or not.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .compact()
        .try_init();
}

pub fn at(i: usize) -> i64 {
    T0 + i as i64 * STEP
}

/// Slow grind higher: every candle opens 0.1 above the last, no gaps anywhere
pub fn drift(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let o = 100.0 + i as f64 * 0.1;
            let c = o + 0.1;
            Candle::new(at(i), o, c + 0.2, o - 0.2, c)
        })
        .collect()
}

/// Knobs for the long setup. Every knob on gives a full 100 point long at index 55.
#[derive(Debug, Clone, Copy)]
pub struct LongSetup {
    /// Mitigation during the New York morning
    pub in_session: bool,
    /// A low resting on the zone bottom at index 50
    pub order_block: bool,
    /// Candle 51 takes out the lows of the previous ten
    pub sweep: bool,
    /// Candle 55 trades back into the zone
    pub mitigate: bool,
    pub len: usize,
}

impl Default for LongSetup {
    fn default() -> Self {
        Self {
            in_session: true,
            order_block: true,
            sweep: true,
            mitigate: true,
            len: 60,
        }
    }
}

impl LongSetup {
    /// Bullish gap [105.3, 106.0] formed at index 52
    pub fn build(self) -> Vec<Candle> {
        let mut bars = drift(51);
        if self.order_block {
            bars[50].low = 105.0;
        }

        let sweep_low = if self.sweep { 103.5 } else { 104.9 };
        bars.push(Candle::new(at(51), 105.1, 107.1, sweep_low, 107.0));
        bars.push(Candle::new(at(52), 107.0, 107.6, 106.0, 107.5));
        bars.push(Candle::new(at(53), 107.5, 107.9, 107.0, 107.7));
        bars.push(Candle::new(at(54), 107.7, 110.0, 106.8, 107.0));
        if self.mitigate {
            bars.push(Candle::new(at(55), 105.65, 107.2, 105.5, 105.6));
        } else {
            bars.push(Candle::new(at(55), 107.0, 107.5, 106.5, 107.2));
        }
        for i in 56..self.len {
            bars.push(Candle::new(at(i), 106.5, 106.9, 106.2, 106.6));
        }

        if !self.in_session {
            // 05:00 New York
            for bar in &mut bars {
                if let CandleTime::Epoch(t) = bar.time {
                    bar.time = CandleTime::Epoch(t - 4 * 3_600);
                }
            }
        }
        bars
    }
}

/// Price reflection around 105: highs become lows, bullish becomes bearish
pub fn mirror(bars: &[Candle]) -> Vec<Candle> {
    bars.iter()
        .map(|b| Candle::new(b.time, 210.0 - b.open, 210.0 - b.low, 210.0 - b.high, 210.0 - b.close))
        .collect()
}

/// Same candles stamped with consecutive calendar dates
pub fn as_daily(bars: &[Candle]) -> Vec<Candle> {
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    bars.iter()
        .enumerate()
        .map(|(i, b)| Candle {
            time: CandleTime::Date(start + chrono::Days::new(i as u64)),
            ..*b
        })
        .collect()
}
