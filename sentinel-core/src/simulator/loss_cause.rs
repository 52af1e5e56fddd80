//! Loss-cause tagging for losing trades.

use std::collections::BTreeSet;

use crate::domain::{Candle, ExitReason, LossTag, Signal};

use super::SimulatorConfig;

/// Tag a losing trade from its pre-trade context and forward window.
///
/// `context` ends with the entry candle. `forward` is the evaluated horizon,
/// including any candles after the exit.
pub fn classify_loss(
    signal: &Signal,
    context: &[Candle],
    forward: &[Candle],
    exit_reason: ExitReason,
    bars_to_exit: usize,
    config: &SimulatorConfig,
) -> BTreeSet<LossTag> {
    let mut tags = BTreeSet::new();
    let sign = signal.direction.sign();

    let start = context.len().saturating_sub(config.context_bars);
    let past = &context[start..];

    if let (Some(first), Some(last)) = (past.first(), past.last()) {
        if past.len() >= 2 {
            let past_move = (last.close - first.close) * sign;
            if past_move < 0.0 {
                tags.insert(LossTag::TrendContinuation);
            }

            let high = past.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let low = past.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let mean_close = past.iter().map(|c| c.close).sum::<f64>() / past.len() as f64;
            let span_pct = (high - low) / mean_close * 100.0;
            if mean_close > 0.0 && span_pct < config.range_compression_pct {
                tags.insert(LossTag::RangeWhipsaw);
            }
        }

        if last.volatility_pct() > config.volatility_stop_pct {
            tags.insert(LossTag::VolatilityStop);
        }
    }

    if exit_reason == ExitReason::StopLossHit && forward.len() > bars_to_exit {
        if let Some(final_candle) = forward.last() {
            if (final_candle.close - signal.entry_price) * sign > 0.0 {
                tags.insert(LossTag::StopHunt);
            }
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, Timeframe};
    use chrono::TimeZone;

    fn candles(rows: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                timestamp: base + chrono::TimeDelta::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn stop_tags(context: &[Candle], forward: &[Candle]) -> BTreeSet<LossTag> {
        let config = SimulatorConfig::default();
        classify_loss(&long_signal(), context, forward, ExitReason::StopLossHit, 1, &config)
    }

    fn long_signal() -> Signal {
        Signal {
            symbol: "ETHUSDT".into(),
            timeframe: Timeframe::H1,
            direction: Direction::Long,
            confidence: 60.0,
            entry_price: 100.0,
            stop_loss: 98.0,
            take_profit: 103.0,
            reasoning: vec![],
            source_analyst: "test".into(),
            generated_at: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap(),
        }
    }

    #[test]
    fn falling_knife_is_trend_continuation() {
        let context = candles(&[
            (110.0, 111.0, 107.0, 108.0),
            (108.0, 109.0, 104.0, 105.0),
            (105.0, 106.0, 101.0, 102.0),
            (102.0, 103.0, 99.5, 100.0),
        ]);
        let tags = stop_tags(&context, &[]);
        assert!(tags.contains(&LossTag::TrendContinuation));
        assert!(!tags.contains(&LossTag::RangeWhipsaw));
    }

    #[test]
    fn compressed_range_is_whipsaw() {
        let context = candles(&[
            (100.0, 100.4, 99.8, 100.2),
            (100.2, 100.5, 99.9, 100.3),
            (100.3, 100.6, 99.9, 100.4),
        ]);
        let tags = stop_tags(&context, &[]);
        assert_eq!(tags, BTreeSet::from([LossTag::RangeWhipsaw]));
    }

    #[test]
    fn wide_entry_candle_is_volatility_stop() {
        let context = candles(&[(100.0, 101.0, 99.0, 100.5), (100.5, 104.0, 99.0, 101.0)]);
        let tags = stop_tags(&context, &[]);
        assert!(tags.contains(&LossTag::VolatilityStop));
    }

    #[test]
    fn recovery_after_stop_is_stop_hunt() {
        let forward = candles(&[(100.0, 100.5, 97.5, 98.5), (98.5, 101.5, 98.0, 101.0)]);
        let tags = stop_tags(&[], &forward);
        assert_eq!(tags, BTreeSet::from([LossTag::StopHunt]));

        // No candles after the exit: nothing to judge.
        let tags = stop_tags(&[], &forward[..1]);
        assert!(tags.is_empty());
    }
}
