mod export;
mod portfolio;
mod series;

use coinlens_core::{BinanceAdapter, FixtureAdapter, MarketDataSource};

use crate::cli::{Cli, Command, SourceSelector};
use crate::error::CliError;

pub fn run(cli: &Cli) -> Result<(), CliError> {
    let source = build_source(cli.source)?;

    match &cli.command {
        Command::Series(args) => series::run(args, source.as_ref(), cli.format, cli.pretty),
        Command::Export(args) => export::run(args, source.as_ref(), cli.format, cli.pretty),
        Command::Portfolio(args) => portfolio::run(args, source.as_ref(), cli.format, cli.pretty),
    }
}

fn build_source(selector: SourceSelector) -> Result<Box<dyn MarketDataSource>, CliError> {
    match selector {
        SourceSelector::Binance => Ok(Box::new(BinanceAdapter::new()?)),
        SourceSelector::Fixture => Ok(Box::new(FixtureAdapter)),
    }
}
