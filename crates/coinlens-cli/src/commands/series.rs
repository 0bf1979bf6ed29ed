use std::str::FromStr;

use coinlens_core::{EnrichedSeries, Interval, KlinesRequest, MarketDataSource, Token};

use crate::cli::{OutputFormat, SeriesArgs};
use crate::error::CliError;
use crate::output;

pub fn run(
    args: &SeriesArgs,
    source: &dyn MarketDataSource,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let series = fetch_enriched(&args.token, &args.interval, args.limit, source)?;

    match format {
        OutputFormat::Table => output::render_series_table(&series),
        OutputFormat::Json => output::render_json(&series, pretty)?,
    }

    Ok(())
}

pub fn fetch_enriched(
    token: &str,
    interval: &str,
    limit: usize,
    source: &dyn MarketDataSource,
) -> Result<EnrichedSeries, CliError> {
    let token = Token::parse(token)?;
    let interval = Interval::from_str(interval)?;
    let request = KlinesRequest::new(token.clone(), interval, limit)?;

    let bars = source.klines(&request)?;
    Ok(EnrichedSeries::enrich(token, interval, bars)?)
}
