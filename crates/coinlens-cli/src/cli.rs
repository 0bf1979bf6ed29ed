use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Binance kline analytics: indicator enrichment and portfolio statistics.
#[derive(Debug, Parser)]
#[command(
    name = "coinlens",
    version,
    about = "Fetch klines, derive indicators, and compute portfolio statistics"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Market-data source.
    #[arg(long, global = true, value_enum, default_value_t = SourceSelector::Binance)]
    pub source: SourceSelector,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned-column text table.
    Table,
    /// Single JSON document.
    Json,
}

/// Market-data source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    /// Live Binance klines endpoint.
    Binance,
    /// Deterministic offline generator (no network).
    Fixture,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch klines for one token and print the enriched series.
    Series(SeriesArgs),

    /// Fetch, enrich, and persist a series as CSV (merging with any
    /// previously exported rows).
    Export(ExportArgs),

    /// Align several tokens and print a portfolio statistic.
    Portfolio(PortfolioArgs),
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Exchange token symbol (e.g. BTCUSDT).
    pub token: String,

    /// Kline interval (1s..1M; note 1m = minute, 1M = month).
    #[arg(long, default_value = "1h")]
    pub interval: String,

    /// Number of bars to request.
    #[arg(long, default_value_t = 500)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Exchange token symbol (e.g. BTCUSDT).
    pub token: String,

    /// Kline interval.
    #[arg(long, default_value = "1h")]
    pub interval: String,

    /// Number of bars to request.
    #[arg(long, default_value_t = 500)]
    pub limit: usize,

    /// Destination directory (default: COINLENS_HOME or ~/.coinlens).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PortfolioArgs {
    /// Two or more token symbols (one is allowed but degenerate).
    #[arg(required = true, num_args = 1..)]
    pub tokens: Vec<String>,

    /// Kline interval.
    #[arg(long, default_value = "1h")]
    pub interval: String,

    /// Number of bars to request per token.
    #[arg(long, default_value_t = 500)]
    pub limit: usize,

    /// Which statistic to print.
    #[arg(long, value_enum, default_value_t = Stat::Correlation)]
    pub stat: Stat,
}

/// Portfolio statistic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stat {
    /// Pairwise Pearson correlation of profit columns.
    Correlation,
    /// Pairwise sample covariance of profit columns.
    Covariance,
    /// The aligned profit matrix itself.
    Profits,
}
