use crate::data_source::{KlinesRequest, MarketDataSource, SourceError};
use crate::{Interval, ProviderId, RawBar, Token, UtcDateTime};

// 2024-01-01T00:00:00Z; fixed so fixture output is stable across runs.
const ORIGIN_MILLIS: i64 = 1_704_067_200_000;

/// Deterministic offline market-data source.
///
/// Bars are generated from the token bytes, so the same request always
/// yields the same series. Used by tests and `--source fixture` dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureAdapter;

impl MarketDataSource for FixtureAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Fixture
    }

    fn klines(&self, req: &KlinesRequest) -> Result<Vec<RawBar>, SourceError> {
        let seed = token_seed(&req.token);
        let step = interval_millis(req.interval);
        let mut bars = Vec::with_capacity(req.limit);

        for index in 0..req.limit {
            let millis = ORIGIN_MILLIS + step * index as i64;
            let ts = UtcDateTime::from_unix_millis(millis)
                .map_err(|error| SourceError::internal(error.to_string()))?;

            let base = 90.0 + ((seed + index as u64) % 350) as f64 / 10.0;
            let close = if (seed + index as u64) % 2 == 0 {
                base + 0.30
            } else {
                base - 0.25
            };
            let quote_volume = 1_000.0 + (index as u64 % 40) as f64 * 25.0;
            let taker_quote_volume = quote_volume * 0.6;

            let bar = RawBar::new(
                ts,
                base,
                base + 1.20,
                base - 0.80,
                close,
                quote_volume / base,
                quote_volume,
                200 + index as u64,
                taker_quote_volume / base,
                taker_quote_volume,
            )
            .map_err(|error| SourceError::internal(error.to_string()))?;

            bars.push(bar);
        }

        Ok(bars)
    }
}

fn token_seed(token: &Token) -> u64 {
    token.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

fn interval_millis(interval: Interval) -> i64 {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    match interval {
        Interval::OneSecond => 1_000,
        Interval::OneMinute => MINUTE,
        Interval::ThreeMinutes => 3 * MINUTE,
        Interval::FiveMinutes => 5 * MINUTE,
        Interval::FifteenMinutes => 15 * MINUTE,
        Interval::ThirtyMinutes => 30 * MINUTE,
        Interval::OneHour => HOUR,
        Interval::TwoHours => 2 * HOUR,
        Interval::FourHours => 4 * HOUR,
        Interval::SixHours => 6 * HOUR,
        Interval::EightHours => 8 * HOUR,
        Interval::TwelveHours => 12 * HOUR,
        Interval::OneDay => DAY,
        Interval::ThreeDays => 3 * DAY,
        Interval::OneWeek => 7 * DAY,
        // Calendar months are irregular; a 30-day bucket keeps the fixture
        // timeline strictly increasing, which is all consumers rely on.
        Interval::OneMonth => 30 * DAY,
    }
}
