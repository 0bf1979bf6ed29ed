use thiserror::Error;

use crate::data_source::SourceError;

/// Validation and contract errors exposed by `coinlens-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token cannot be empty")]
    EmptyToken,
    #[error("token length {len} exceeds max {max}")]
    TokenTooLong { len: usize, max: usize },
    #[error("token contains invalid character '{ch}' at index {index}")]
    TokenInvalidChar { ch: char, index: usize },

    #[error("invalid interval '{value}', expected a Binance kline interval such as 1m, 1h, 1d (note: 1M is one month)")]
    InvalidInterval { value: String },
    #[error("invalid source '{value}', expected one of binance, fixture")]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("epoch millisecond timestamp out of range: {millis}")]
    TimestampOutOfRange { millis: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,

    #[error("portfolio requires at least one token")]
    EmptyTokenList,
}

/// Malformed raw input rejected by series enrichment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrichError {
    #[error("cannot enrich an empty bar sequence")]
    EmptyInput,
    #[error("bar at index {index} is older than its predecessor")]
    OutOfOrder { index: usize },
    #[error("bar at index {index} repeats the previous timestamp")]
    DuplicateTimestamp { index: usize },
    #[error("cannot merge series for {expected} into series for {found}")]
    SeriesMismatch { expected: String, found: String },
}

/// Errors raised while assembling a portfolio from a data source.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),
}
