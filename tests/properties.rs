//! Property tests: invariants that must hold for any candle history.

mod common;

use std::collections::HashSet;

use common::at;
use fvg_confluence::prelude::*;
use proptest::prelude::*;

/// Random walk with jumps large enough to open gaps regularly
fn candles(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-3.0f64..3.0, -2.0f64..2.0, 0.0f64..1.5, 0.0f64..1.5), 0..max_len).prop_map(
        |steps| {
            let mut price = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (jump, body, up, down))| {
                    let open = price + jump;
                    let close = open + body;
                    price = close;
                    Candle::new(at(i), open, open.max(close) + up, open.min(close) - down, close)
                })
                .collect()
        },
    )
}

fn params() -> impl Strategy<Value = ConfluenceParams> {
    (any::<bool>(), 0u8..=100, 5usize..60).prop_map(|(strict, min_score, trend)| ConfluenceParams {
        strict,
        min_score,
        trend_period: Period::new(trend).unwrap(),
        ..Default::default()
    })
}

fn sorted_by_time<'a>(times: impl Iterator<Item = &'a CandleTime>) -> bool {
    let keys: Vec<i64> = times.map(|t| t.sort_key()).collect();
    keys.windows(2).all(|w| w[0] <= w[1])
}

proptest! {
    #[test]
    fn prop_deterministic(bars in candles(200), params in params()) {
        let engine = EngineBuilder::new().params(params).build().unwrap();
        let first = engine.analyze(&bars).unwrap();
        let second = engine.analyze(&bars).unwrap();
        prop_assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_outputs_ascending(bars in candles(200), params in params()) {
        let engine = EngineBuilder::new().params(params).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();
        prop_assert!(sorted_by_time(analysis.markers.iter().map(|m| &m.time)));
        prop_assert!(sorted_by_time(analysis.signals.iter().map(|s| &s.time)));
    }

    #[test]
    fn prop_threshold_gate(bars in candles(200), params in params()) {
        let min_score = params.min_score;
        let engine = EngineBuilder::new().params(params).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();

        for signal in &analysis.signals {
            prop_assert!(signal.total_score >= min_score);
            prop_assert!(signal.total_score <= 100);
            prop_assert_eq!(signal.total_score, signal.breakdown.total());
            for (criterion, score) in signal.breakdown.iter() {
                prop_assert_eq!(score.max, criterion.weight());
                prop_assert!(score.score == 0 || score.score == score.max);
                prop_assert_eq!(score.passed, score.score == score.max);
            }
            prop_assert!(signal.breakdown.fair_value_gap.passed);
        }
    }

    #[test]
    fn prop_one_entry_per_zone(bars in candles(200), params in params()) {
        let engine = EngineBuilder::new().params(params).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();
        let stats = analysis.stats;

        let formations: HashSet<CandleTime> = analysis.signals.iter().map(|s| s.formation_time).collect();
        prop_assert_eq!(formations.len(), analysis.signals.len());

        prop_assert!(stats.zones_mitigated <= stats.zones_formed);
        prop_assert!(stats.signals <= stats.zones_mitigated);
        prop_assert_eq!(stats.signals, analysis.signals.len());
        prop_assert_eq!(analysis.markers.len(), stats.zones_formed + stats.signals);
        prop_assert_eq!(analysis.markers.iter().filter(|m| m.is_entry()).count(), stats.signals);
    }

    #[test]
    fn prop_signals_follow_formation(bars in candles(200)) {
        let engine = EngineBuilder::new().strict(false).min_score(0).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();

        for signal in &analysis.signals {
            prop_assert!(signal.time.sort_key() > signal.formation_time.sort_key());
            prop_assert!(signal.zone_top > signal.zone_bottom);
        }
        // Zero threshold: every mitigation signals
        prop_assert_eq!(analysis.stats.signals, analysis.stats.zones_mitigated);
    }

    #[test]
    fn prop_short_history_is_empty(bars in candles(50)) {
        let engine = EngineBuilder::new().strict(false).build().unwrap();
        let analysis = engine.analyze(&bars).unwrap();
        prop_assert!(analysis.is_empty());
        prop_assert_eq!(analysis.stats.bars, bars.len());
    }

    #[test]
    fn prop_strict_is_a_subset_of_loose(bars in candles(200)) {
        let strict = EngineBuilder::new().min_score(0).build().unwrap();
        let loose = EngineBuilder::new().strict(false).min_score(0).build().unwrap();

        let strict_zones: HashSet<i64> = strict.analyze(&bars).unwrap().markers.iter()
            .filter(|m| !m.is_entry())
            .map(|m| m.time.sort_key())
            .collect();
        let loose_zones: HashSet<i64> = loose.analyze(&bars).unwrap().markers.iter()
            .filter(|m| !m.is_entry())
            .map(|m| m.time.sort_key())
            .collect();
        prop_assert!(strict_zones.is_subset(&loose_zones));
    }
}

#[test]
fn test_weights_sum_to_100() {
    let total: u32 = Criterion::ALL.iter().map(|c| u32::from(c.weight())).sum();
    assert_eq!(total, 100);
}
