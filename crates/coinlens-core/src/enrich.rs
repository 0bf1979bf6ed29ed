//! Kline series enrichment.
//!
//! Derives the indicator columns from a raw bar sequence. Every derived
//! value is a function of the bars up to and including its own index only;
//! nothing here looks ahead.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EnrichError;
use crate::{Interval, RawBar, Token};

/// Trailing window length shared by the volume-diff and OBV moving averages.
const MA_WINDOW: usize = 3;

/// One bar extended with its derived indicator values.
///
/// `net_profit` is undefined (NaN) on the first bar of a series; `obv_ma`
/// is undefined until three observations have accumulated. `volume_diff_ma`
/// emits from the first bar. The asymmetry is intended behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    #[serde(flatten)]
    pub raw: RawBar,
    /// Percentage change of close vs. the previous close.
    pub net_profit: f64,
    /// Percentage range within the bar: `100 * (high / open - 1)`.
    pub max_profit: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub volume_diff: f64,
    pub volume_diff_ma: f64,
    /// On-balance-volume running total in quote units.
    pub obv: f64,
    pub obv_ma: f64,
}

impl EnrichedBar {
    /// True when every derived column carries a finite value.
    ///
    /// The leading bars of a freshly enriched series fail this (undefined
    /// `net_profit` / `obv_ma`), which is what keeps partially computed
    /// rows out of incremental merges.
    pub fn has_complete_derived(&self) -> bool {
        self.net_profit.is_finite()
            && self.max_profit.is_finite()
            && self.buy_volume.is_finite()
            && self.sell_volume.is_finite()
            && self.volume_diff.is_finite()
            && self.volume_diff_ma.is_finite()
            && self.obv.is_finite()
            && self.obv_ma.is_finite()
    }
}

/// A time-ordered enriched bar sequence for one token and interval.
///
/// Built once from raw bars and treated as immutable afterwards; the only
/// sanctioned way to combine series is [`EnrichedSeries::merge_incremental`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSeries {
    token: Token,
    interval: Interval,
    rows: Vec<EnrichedBar>,
}

impl EnrichedSeries {
    /// Enrich a raw bar sequence.
    ///
    /// Fails fast on empty input and on any timestamp that is not strictly
    /// greater than its predecessor; no silent-NaN fallback.
    pub fn enrich(
        token: Token,
        interval: Interval,
        raw: Vec<RawBar>,
    ) -> Result<Self, EnrichError> {
        if raw.is_empty() {
            return Err(EnrichError::EmptyInput);
        }
        check_strictly_increasing(&raw, |bar| bar.ts)?;

        let n = raw.len();

        let mut net_profit = vec![f64::NAN; n];
        for i in 1..n {
            net_profit[i] = 100.0 * (raw[i].close / raw[i - 1].close - 1.0);
        }

        let volume_diff: Vec<f64> = raw
            .iter()
            .map(|bar| {
                let buy = bar.taker_quote_volume;
                let sell = bar.quote_volume - bar.taker_quote_volume;
                buy - sell
            })
            .collect();
        let volume_diff_ma = trailing_mean(&volume_diff, MA_WINDOW, 1);

        // Running total: the first bar has no prior reference and
        // contributes zero.
        let mut obv = vec![0.0; n];
        for i in 1..n {
            let sign = if net_profit[i] > 0.0 {
                1.0
            } else if net_profit[i] < 0.0 {
                -1.0
            } else {
                0.0
            };
            obv[i] = obv[i - 1] + sign * raw[i].quote_volume;
        }
        let obv_ma = trailing_mean(&obv, MA_WINDOW, MA_WINDOW);

        let rows = raw
            .into_iter()
            .enumerate()
            .map(|(i, bar)| {
                let buy_volume = bar.taker_quote_volume;
                let sell_volume = bar.quote_volume - bar.taker_quote_volume;
                EnrichedBar {
                    max_profit: 100.0 * (bar.high / bar.open - 1.0),
                    net_profit: net_profit[i],
                    buy_volume,
                    sell_volume,
                    volume_diff: volume_diff[i],
                    volume_diff_ma: volume_diff_ma[i],
                    obv: obv[i],
                    obv_ma: obv_ma[i],
                    raw: bar,
                }
            })
            .collect();

        Ok(Self {
            token,
            interval,
            rows,
        })
    }

    /// Reassemble a series from previously persisted rows.
    ///
    /// Unlike [`EnrichedSeries::enrich`] this accepts an empty row set (a
    /// freshly created store file has none) but still requires strict time
    /// order.
    pub fn from_rows(
        token: Token,
        interval: Interval,
        rows: Vec<EnrichedBar>,
    ) -> Result<Self, EnrichError> {
        check_strictly_increasing(&rows, |row| row.raw.ts)?;
        Ok(Self {
            token,
            interval,
            rows,
        })
    }

    /// Merge freshly enriched data into previously persisted data.
    ///
    /// Incoming rows with any undefined derived value are dropped, then
    /// only rows with timestamps absent from `existing` are appended;
    /// existing rows are never replaced. The result stays time-sorted.
    pub fn merge_incremental(existing: &Self, incoming: &Self) -> Result<Self, EnrichError> {
        if existing.token != incoming.token || existing.interval != incoming.interval {
            return Err(EnrichError::SeriesMismatch {
                expected: format!("{} {}", existing.token, existing.interval),
                found: format!("{} {}", incoming.token, incoming.interval),
            });
        }

        let known: BTreeSet<_> = existing.rows.iter().map(|row| row.raw.ts).collect();
        let fresh: Vec<EnrichedBar> = incoming
            .rows
            .iter()
            .filter(|row| row.has_complete_derived() && !known.contains(&row.raw.ts))
            .cloned()
            .collect();

        debug!(
            token = %existing.token,
            existing = existing.rows.len(),
            incoming = incoming.rows.len(),
            appended = fresh.len(),
            "incremental merge"
        );

        let mut rows = existing.rows.clone();
        rows.extend(fresh);
        rows.sort_by_key(|row| row.raw.ts);

        Ok(Self {
            token: existing.token.clone(),
            interval: existing.interval,
            rows,
        })
    }

    /// The series minus its most recent bar.
    ///
    /// The last interval is typically still in progress, so its closing
    /// values are unreliable; exports persist this view.
    pub fn without_last_bar(&self) -> Self {
        let end = self.rows.len().saturating_sub(1);
        Self {
            token: self.token.clone(),
            interval: self.interval,
            rows: self.rows[..end].to_vec(),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn rows(&self) -> &[EnrichedBar] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn check_strictly_increasing<T>(
    items: &[T],
    ts: impl Fn(&T) -> crate::UtcDateTime,
) -> Result<(), EnrichError> {
    for index in 1..items.len() {
        match ts(&items[index]).cmp(&ts(&items[index - 1])) {
            Ordering::Greater => {}
            Ordering::Equal => return Err(EnrichError::DuplicateTimestamp { index }),
            Ordering::Less => return Err(EnrichError::OutOfOrder { index }),
        }
    }
    Ok(())
}

/// Trailing simple moving average over at most `window` observations,
/// emitting NaN until `min_periods` observations are available.
fn trailing_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let tail = &values[start..=i];
            if tail.len() < min_periods {
                f64::NAN
            } else {
                tail.iter().sum::<f64>() / tail.len() as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtcDateTime;

    fn token() -> Token {
        Token::parse("BTCUSDT").expect("token")
    }

    fn ts(hour: u8) -> UtcDateTime {
        UtcDateTime::parse(&format!("2024-01-01T{hour:02}:00:00Z")).expect("timestamp")
    }

    fn bar(hour: u8, close: f64, quote_volume: f64, taker_quote_volume: f64) -> RawBar {
        let high = close.max(100.0) + 5.0;
        let low = close.min(100.0) - 5.0;
        RawBar::new(
            ts(hour),
            100.0,
            high,
            low,
            close,
            quote_volume / 100.0,
            quote_volume,
            10,
            taker_quote_volume / 100.0,
            taker_quote_volume,
        )
        .expect("bar")
    }

    fn series(bars: Vec<RawBar>) -> EnrichedSeries {
        EnrichedSeries::enrich(token(), Interval::OneHour, bars).expect("series")
    }

    #[test]
    fn preserves_length_and_timestamps() {
        let raw = vec![
            bar(0, 100.0, 10.0, 6.0),
            bar(1, 101.0, 12.0, 5.0),
            bar(2, 99.0, 9.0, 4.0),
            bar(3, 102.0, 14.0, 9.0),
        ];
        let expected: Vec<_> = raw.iter().map(|b| b.ts).collect();

        let enriched = series(raw);
        assert_eq!(enriched.len(), 4);
        let actual: Vec<_> = enriched.rows().iter().map(|r| r.raw.ts).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn computes_net_profit_and_obv_scenario() {
        // Closes [100, 110, 99] with unit quote volume.
        let enriched = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 110.0, 1.0, 0.6),
            bar(2, 99.0, 1.0, 0.6),
        ]);

        let rows = enriched.rows();
        assert!(rows[0].net_profit.is_nan());
        assert!((rows[1].net_profit - 10.0).abs() < 1e-9);
        assert!((rows[2].net_profit + 10.0).abs() < 1e-9);

        // Running total: the up bar adds its quote volume, the down bar
        // subtracts it again.
        assert_eq!(rows[0].obv, 0.0);
        assert_eq!(rows[1].obv, 1.0);
        assert_eq!(rows[2].obv, 0.0);
    }

    #[test]
    fn obv_ignores_flat_bars() {
        let enriched = series(vec![
            bar(0, 100.0, 5.0, 3.0),
            bar(1, 100.0, 7.0, 3.0),
            bar(2, 103.0, 11.0, 3.0),
        ]);

        let rows = enriched.rows();
        assert_eq!(rows[1].obv, 0.0);
        assert_eq!(rows[2].obv, 11.0);
    }

    #[test]
    fn max_profit_is_intra_bar_range() {
        let raw = RawBar::new(
            ts(0),
            100.0,
            104.0,
            96.0,
            101.0,
            1.0,
            1.0,
            1,
            0.5,
            0.5,
        )
        .expect("bar");
        let enriched = series(vec![raw]);
        assert!((enriched.rows()[0].max_profit - 4.0).abs() < 1e-9);
    }

    #[test]
    fn volume_split_and_diff() {
        let enriched = series(vec![bar(0, 100.0, 10.0, 6.0)]);
        let row = &enriched.rows()[0];
        assert_eq!(row.buy_volume, 6.0);
        assert_eq!(row.sell_volume, 4.0);
        assert_eq!(row.volume_diff, 2.0);
    }

    #[test]
    fn volume_diff_ma_emits_from_first_bar() {
        // volume_diff per bar: 2, -2, 6, 0
        let enriched = series(vec![
            bar(0, 100.0, 10.0, 6.0),
            bar(1, 101.0, 10.0, 4.0),
            bar(2, 102.0, 10.0, 8.0),
            bar(3, 103.0, 10.0, 5.0),
        ]);

        let ma: Vec<f64> = enriched.rows().iter().map(|r| r.volume_diff_ma).collect();
        assert!((ma[0] - 2.0).abs() < 1e-9);
        assert!((ma[1] - 0.0).abs() < 1e-9);
        assert!((ma[2] - 2.0).abs() < 1e-9);
        // window slides: mean of (-2, 6, 0)
        assert!((ma[3] - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn obv_ma_requires_three_observations() {
        let enriched = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 110.0, 2.0, 1.0),
            bar(2, 99.0, 4.0, 2.0),
            bar(3, 100.0, 8.0, 4.0),
        ]);

        let rows = enriched.rows();
        assert!(rows[0].obv_ma.is_nan());
        assert!(rows[1].obv_ma.is_nan());
        // obv: [0, 2, -2, 6]
        assert!((rows[2].obv_ma - 0.0).abs() < 1e-9);
        assert!((rows[3].obv_ma - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_empty_input() {
        let err =
            EnrichedSeries::enrich(token(), Interval::OneHour, Vec::new()).expect_err("must fail");
        assert!(matches!(err, EnrichError::EmptyInput));
    }

    #[test]
    fn rejects_out_of_order_bars() {
        let err = EnrichedSeries::enrich(
            token(),
            Interval::OneHour,
            vec![bar(2, 100.0, 1.0, 0.5), bar(1, 101.0, 1.0, 0.5)],
        )
        .expect_err("must fail");
        assert!(matches!(err, EnrichError::OutOfOrder { index: 1 }));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = EnrichedSeries::enrich(
            token(),
            Interval::OneHour,
            vec![bar(1, 100.0, 1.0, 0.5), bar(1, 101.0, 1.0, 0.5)],
        )
        .expect_err("must fail");
        assert!(matches!(err, EnrichError::DuplicateTimestamp { index: 1 }));
    }

    #[test]
    fn merge_is_idempotent_without_new_data() {
        let existing = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 101.0, 1.0, 0.6),
            bar(2, 102.0, 1.0, 0.6),
            bar(3, 103.0, 1.0, 0.6),
        ]);

        let merged =
            EnrichedSeries::merge_incremental(&existing, &existing).expect("merge must succeed");

        assert_eq!(merged.len(), existing.len());
        for (merged_row, existing_row) in merged.rows().iter().zip(existing.rows()) {
            assert_eq!(merged_row.raw.ts, existing_row.raw.ts);
            assert_eq!(merged_row.raw.close, existing_row.raw.close);
        }
    }

    #[test]
    fn merge_keeps_existing_rows_and_appends_only_fresh_complete_ones() {
        let existing = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 101.0, 1.0, 0.6),
            bar(2, 102.0, 1.0, 0.6),
            bar(3, 103.0, 1.0, 0.6),
        ]);

        // Overlapping re-fetch starting at hour 2 with diverging closes.
        let incoming = series(vec![
            bar(2, 500.0, 1.0, 0.6),
            bar(3, 501.0, 1.0, 0.6),
            bar(4, 502.0, 1.0, 0.6),
            bar(5, 503.0, 1.0, 0.6),
        ]);

        let merged =
            EnrichedSeries::merge_incremental(&existing, &incoming).expect("merge must succeed");

        // Hours 2 and 3 keep the existing closes; the incoming hours 2/3
        // (and the incomplete leading rows) never displace them.
        assert_eq!(merged.len(), 6);
        assert_eq!(merged.rows()[2].raw.close, 102.0);
        assert_eq!(merged.rows()[3].raw.close, 103.0);
        assert_eq!(merged.rows()[4].raw.close, 502.0);
        assert_eq!(merged.rows()[5].raw.close, 503.0);
    }

    #[test]
    fn merge_drops_incomplete_incoming_rows() {
        let existing = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 101.0, 1.0, 0.6),
            bar(2, 102.0, 1.0, 0.6),
        ]);

        // The incoming batch's first two rows have undefined derived
        // values (net_profit / obv_ma) and must not be appended even
        // though hour 4 is unknown to `existing`.
        let incoming = series(vec![
            bar(4, 104.0, 1.0, 0.6),
            bar(5, 105.0, 1.0, 0.6),
            bar(6, 106.0, 1.0, 0.6),
            bar(7, 107.0, 1.0, 0.6),
        ]);

        let merged =
            EnrichedSeries::merge_incremental(&existing, &incoming).expect("merge must succeed");

        let hours: Vec<_> = merged
            .rows()
            .iter()
            .map(|row| row.raw.ts.format_rfc3339())
            .collect();
        assert_eq!(
            hours,
            vec![
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
                "2024-01-01T02:00:00Z",
                "2024-01-01T06:00:00Z",
                "2024-01-01T07:00:00Z",
            ]
        );
    }

    #[test]
    fn merge_rejects_mismatched_series() {
        let btc = series(vec![bar(0, 100.0, 1.0, 0.6)]);
        let eth = EnrichedSeries::enrich(
            Token::parse("ETHUSDT").expect("token"),
            Interval::OneHour,
            vec![bar(0, 100.0, 1.0, 0.6)],
        )
        .expect("series");

        let err = EnrichedSeries::merge_incremental(&btc, &eth).expect_err("must fail");
        assert!(matches!(err, EnrichError::SeriesMismatch { .. }));
    }

    #[test]
    fn without_last_bar_drops_only_the_tail() {
        let enriched = series(vec![
            bar(0, 100.0, 1.0, 0.6),
            bar(1, 101.0, 1.0, 0.6),
            bar(2, 102.0, 1.0, 0.6),
        ]);

        let trimmed = enriched.without_last_bar();
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.rows()[1].raw.ts, ts(1));
    }
}
