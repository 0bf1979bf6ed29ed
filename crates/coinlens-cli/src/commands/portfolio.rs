use std::str::FromStr;

use coinlens_core::{Interval, MarketDataSource, Portfolio};

use crate::cli::{OutputFormat, PortfolioArgs, Stat};
use crate::error::CliError;
use crate::output;

pub fn run(
    args: &PortfolioArgs,
    source: &dyn MarketDataSource,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let interval = Interval::from_str(&args.interval)?;
    let mut portfolio = Portfolio::from_source(&args.tokens, interval, args.limit, source)?;

    match (args.stat, format) {
        (Stat::Profits, OutputFormat::Table) => {
            output::render_profit_table(portfolio.profit_matrix());
        }
        (Stat::Profits, OutputFormat::Json) => {
            output::render_json(portfolio.profit_matrix(), pretty)?;
        }
        (Stat::Correlation, OutputFormat::Table) => {
            output::render_square_table(portfolio.correlation_matrix());
        }
        (Stat::Correlation, OutputFormat::Json) => {
            output::render_json(portfolio.correlation_matrix(), pretty)?;
        }
        (Stat::Covariance, OutputFormat::Table) => {
            output::render_square_table(portfolio.covariance_matrix());
        }
        (Stat::Covariance, OutputFormat::Json) => {
            output::render_json(portfolio.covariance_matrix(), pretty)?;
        }
    }

    Ok(())
}
