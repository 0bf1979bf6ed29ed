//! Portfolio alignment and cross-series statistics.
//!
//! A [`Portfolio`] holds one enriched series per member token, aligns their
//! profit columns onto the intersection of all timestamps, and derives
//! pairwise Pearson-correlation and sample-covariance matrices. The three
//! matrices are memoized and recomputed only after [`Portfolio::invalidate`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data_source::{KlinesRequest, MarketDataSource};
use crate::error::PortfolioError;
use crate::{EnrichedSeries, Interval, Token, UtcDateTime, ValidationError};

/// Token-per-column table of `net_profit` values over the timestamps shared
/// by every member series.
///
/// A member with no overlap with the others produces zero rows; that is a
/// degenerate but valid table, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitMatrix {
    tokens: Vec<Token>,
    timestamps: Vec<UtcDateTime>,
    /// One column per token, indexed like `tokens`; each column has one
    /// value per entry of `timestamps`.
    columns: Vec<Vec<f64>>,
}

impl ProfitMatrix {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn timestamps(&self) -> &[UtcDateTime] {
        &self.timestamps
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Token × token statistic table (correlation or covariance), with the same
/// token ordering on both axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquareMatrix {
    tokens: Vec<Token>,
    values: Vec<Vec<f64>>,
}

impl SquareMatrix {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }
}

/// A set of member series with lazily computed portfolio statistics.
#[derive(Debug, Clone)]
pub struct Portfolio {
    members: Vec<EnrichedSeries>,
    profit: Option<ProfitMatrix>,
    correlation: Option<SquareMatrix>,
    covariance: Option<SquareMatrix>,
}

impl Portfolio {
    /// Resolve each token into an enriched series through `source`.
    ///
    /// Fails on an empty token list, an unparsable token, a source error,
    /// or unenrichable bars; no partially constructed portfolio escapes.
    pub fn from_source<S: AsRef<str>>(
        tokens: &[S],
        interval: Interval,
        limit: usize,
        source: &dyn MarketDataSource,
    ) -> Result<Self, PortfolioError> {
        if tokens.is_empty() {
            return Err(ValidationError::EmptyTokenList.into());
        }

        let mut members = Vec::with_capacity(tokens.len());
        for raw in tokens {
            let token = Token::parse(raw.as_ref())?;
            let request = KlinesRequest::new(token.clone(), interval, limit)?;
            let bars = source.klines(&request)?;
            members.push(EnrichedSeries::enrich(token, interval, bars)?);
        }

        Ok(Self::assemble(members))
    }

    /// Build a portfolio from already-enriched series.
    ///
    /// Enrichment of individual tokens is independent, so callers may
    /// produce the series elsewhere (even on separate workers) and join
    /// them here.
    pub fn from_series(members: Vec<EnrichedSeries>) -> Result<Self, ValidationError> {
        if members.is_empty() {
            return Err(ValidationError::EmptyTokenList);
        }
        Ok(Self::assemble(members))
    }

    fn assemble(members: Vec<EnrichedSeries>) -> Self {
        Self {
            members,
            profit: None,
            correlation: None,
            covariance: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member series in insertion order; a fresh call always restarts at
    /// the first member. Iteration never mutates membership.
    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedSeries> {
        self.members.iter()
    }

    /// The aligned profit table, computed on first access and cached.
    pub fn profit_matrix(&mut self) -> &ProfitMatrix {
        let members = &self.members;
        self.profit
            .get_or_insert_with(|| compute_profit_matrix(members))
    }

    pub fn correlation_matrix(&mut self) -> &SquareMatrix {
        if self.correlation.is_none() {
            let computed = correlation_from(self.profit_matrix());
            self.correlation = Some(computed);
        }
        self.correlation
            .as_ref()
            .expect("correlation matrix is cached above")
    }

    pub fn covariance_matrix(&mut self) -> &SquareMatrix {
        if self.covariance.is_none() {
            let computed = covariance_from(self.profit_matrix());
            self.covariance = Some(computed);
        }
        self.covariance
            .as_ref()
            .expect("covariance matrix is cached above")
    }

    /// Drop all cached matrices; the next access recomputes them.
    pub fn invalidate(&mut self) {
        self.profit = None;
        self.correlation = None;
        self.covariance = None;
    }
}

impl<'a> IntoIterator for &'a Portfolio {
    type Item = &'a EnrichedSeries;
    type IntoIter = std::slice::Iter<'a, EnrichedSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn compute_profit_matrix(members: &[EnrichedSeries]) -> ProfitMatrix {
    let mut common: Option<BTreeSet<UtcDateTime>> = None;
    for series in members {
        let stamps: BTreeSet<UtcDateTime> = series.rows().iter().map(|row| row.raw.ts).collect();
        common = Some(match common {
            None => stamps,
            Some(acc) => acc.intersection(&stamps).copied().collect(),
        });
    }

    // BTreeSet iterates in ascending order, so the row index comes out
    // sorted for free.
    let timestamps: Vec<UtcDateTime> = common.unwrap_or_default().into_iter().collect();

    let columns = members
        .iter()
        .map(|series| {
            let by_ts: BTreeMap<UtcDateTime, f64> = series
                .rows()
                .iter()
                .map(|row| (row.raw.ts, row.net_profit))
                .collect();
            timestamps
                .iter()
                .map(|ts| by_ts.get(ts).copied().unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    ProfitMatrix {
        tokens: members.iter().map(|s| s.token().clone()).collect(),
        timestamps,
        columns,
    }
}

fn correlation_from(profit: &ProfitMatrix) -> SquareMatrix {
    square_from(profit, |profit, row, col| {
        if row == col {
            // pandas semantics: a column correlates perfectly with itself
            // as long as it has any defined observation at all.
            if profit.column(row).iter().any(|v| v.is_finite()) {
                1.0
            } else {
                f64::NAN
            }
        } else {
            pearson(profit.column(row), profit.column(col))
        }
    })
}

fn covariance_from(profit: &ProfitMatrix) -> SquareMatrix {
    square_from(profit, |profit, row, col| {
        sample_covariance(profit.column(row), profit.column(col))
    })
}

fn square_from(
    profit: &ProfitMatrix,
    cell: impl Fn(&ProfitMatrix, usize, usize) -> f64,
) -> SquareMatrix {
    let size = profit.tokens().len();
    let values = (0..size)
        .map(|row| (0..size).map(|col| cell(profit, row, col)).collect())
        .collect();
    SquareMatrix {
        tokens: profit.tokens().to_vec(),
        values,
    }
}

/// Observations where either side is undefined are skipped (pairwise
/// deletion); fewer than two complete pairs or a zero variance yields NaN.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs = complete_pairs(xs, ys);
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        cov / denom
    }
}

/// Sample covariance (n − 1 denominator) over pairwise-complete rows.
fn sample_covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs = complete_pairs(xs, ys);
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

    let sum: f64 = pairs
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    sum / (n - 1) as f64
}

fn complete_pairs(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawBar;

    fn ts(hour: u8) -> UtcDateTime {
        UtcDateTime::parse(&format!("2024-01-01T{hour:02}:00:00Z")).expect("timestamp")
    }

    fn bar(hour: u8, close: f64) -> RawBar {
        let high = close.max(100.0) + 5.0;
        let low = close.min(100.0) - 5.0;
        RawBar::new(ts(hour), 100.0, high, low, close, 1.0, 100.0, 10, 0.6, 60.0).expect("bar")
    }

    fn series(token: &str, closes_at: &[(u8, f64)]) -> EnrichedSeries {
        let bars = closes_at
            .iter()
            .map(|&(hour, close)| bar(hour, close))
            .collect();
        EnrichedSeries::enrich(Token::parse(token).expect("token"), Interval::OneHour, bars)
            .expect("series")
    }

    #[test]
    fn rejects_empty_member_set() {
        let err = Portfolio::from_series(Vec::new()).expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptyTokenList));
    }

    #[test]
    fn from_source_rejects_empty_token_list() {
        let source = crate::FixtureAdapter;
        let err = Portfolio::from_source::<&str>(&[], Interval::OneHour, 10, &source)
            .expect_err("must fail");
        assert!(matches!(
            err,
            PortfolioError::Validation(ValidationError::EmptyTokenList)
        ));
    }

    #[test]
    fn profit_matrix_rows_are_the_timestamp_intersection() {
        let mut portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 101.0), (3, 102.0)]),
            series("BBBUSDT", &[(2, 50.0), (3, 51.0), (4, 52.0)]),
            series("CCCUSDT", &[(2, 80.0), (3, 81.0)]),
        ])
        .expect("portfolio");

        let matrix = portfolio.profit_matrix();
        assert_eq!(matrix.row_count(), 2);
        assert_eq!(matrix.timestamps(), &[ts(2), ts(3)]);
        assert_eq!(matrix.tokens().len(), 3);

        // Column values are each member's net_profit reindexed to the
        // common rows.
        let aaa = matrix.column(0);
        assert!((aaa[0] - 1.0).abs() < 1e-9);
        assert!((aaa[1] - 100.0 * (102.0 / 101.0 - 1.0)).abs() < 1e-9);

        // BBBUSDT's first common row is its own first bar: undefined.
        let bbb = matrix.column(1);
        assert!(bbb[0].is_nan());
        assert!((bbb[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_overlap_produces_an_empty_matrix_not_an_error() {
        let mut portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 101.0)]),
            series("BBBUSDT", &[(10, 50.0), (11, 51.0)]),
        ])
        .expect("portfolio");

        assert_eq!(portfolio.profit_matrix().row_count(), 0);

        let correlation = portfolio.correlation_matrix();
        assert!(correlation.get(0, 1).is_nan());
        assert!(correlation.get(0, 0).is_nan());
    }

    #[test]
    fn single_token_correlation_is_identity() {
        let mut portfolio = Portfolio::from_series(vec![series(
            "AAAUSDT",
            &[(1, 100.0), (2, 110.0), (3, 99.0)],
        )])
        .expect("portfolio");

        let correlation = portfolio.correlation_matrix();
        assert_eq!(correlation.tokens().len(), 1);
        assert_eq!(correlation.get(0, 0), 1.0);
    }

    #[test]
    fn opposite_series_correlate_at_minus_one() {
        // Profit sequences are exact mirrors: +10/-10/+10 vs -10/+10/-10.
        let mut portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 110.0), (3, 99.0), (4, 108.9)]),
            series("BBBUSDT", &[(1, 100.0), (2, 90.0), (3, 99.0), (4, 89.1)]),
        ])
        .expect("portfolio");

        let correlation = portfolio.correlation_matrix();
        assert!((correlation.get(0, 1) + 1.0).abs() < 1e-9);
        assert!((correlation.get(1, 0) + 1.0).abs() < 1e-9);
        assert_eq!(correlation.get(0, 0), 1.0);
    }

    #[test]
    fn covariance_uses_sample_denominator() {
        let mut portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 110.0), (3, 99.0), (4, 108.9)]),
            series("BBBUSDT", &[(1, 100.0), (2, 90.0), (3, 99.0), (4, 89.1)]),
        ])
        .expect("portfolio");

        // Complete profit pairs: (10,-10), (-10,10), (10,-10).
        // Sample covariance = -2400/9 / 2 = -133.3•
        let covariance = portfolio.covariance_matrix();
        assert!((covariance.get(0, 1) + 2400.0 / 18.0).abs() < 1e-6);
        // Diagonal is the sample variance.
        assert!((covariance.get(0, 0) - 2400.0 / 18.0).abs() < 1e-6);
    }

    #[test]
    fn matrices_are_cached_until_invalidated() {
        let mut portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 110.0), (3, 99.0)]),
            series("BBBUSDT", &[(1, 100.0), (2, 105.0), (3, 101.0)]),
        ])
        .expect("portfolio");

        let first = portfolio.profit_matrix().clone();
        let second = portfolio.profit_matrix().clone();
        assert_eq!(first.timestamps(), second.timestamps());

        portfolio.invalidate();
        let third = portfolio.profit_matrix().clone();
        assert_eq!(first.timestamps(), third.timestamps());
    }

    #[test]
    fn iteration_is_ordered_and_restartable() {
        let portfolio = Portfolio::from_series(vec![
            series("AAAUSDT", &[(1, 100.0), (2, 101.0)]),
            series("BBBUSDT", &[(1, 100.0), (2, 101.0)]),
            series("CCCUSDT", &[(1, 100.0), (2, 101.0)]),
        ])
        .expect("portfolio");

        let first_pass: Vec<_> = portfolio.iter().map(|s| s.token().as_str()).collect();
        assert_eq!(first_pass, vec!["AAAUSDT", "BBBUSDT", "CCCUSDT"]);

        let second_pass: Vec<_> = (&portfolio)
            .into_iter()
            .map(|s| s.token().as_str())
            .collect();
        assert_eq!(first_pass, second_pass);
    }
}
