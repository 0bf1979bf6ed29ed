//! Core contracts for coinlens.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - The market-data source trait and its adapters
//! - Kline series enrichment (derived indicator columns)
//! - Portfolio alignment and cross-series statistics

pub mod adapters;
pub mod data_source;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod portfolio;
pub mod source;

pub use adapters::{BinanceAdapter, FixtureAdapter};
pub use data_source::{KlinesRequest, MarketDataSource, SourceError, SourceErrorKind};
pub use domain::{Interval, RawBar, Token, UtcDateTime};
pub use enrich::{EnrichedBar, EnrichedSeries};
pub use error::{EnrichError, PortfolioError, ValidationError};
pub use portfolio::{Portfolio, ProfitMatrix, SquareMatrix};
pub use source::ProviderId;
