use coinlens_core::MarketDataSource;
use coinlens_store::{export_series, StoreConfig};

use crate::cli::{ExportArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::series::fetch_enriched;

pub fn run(
    args: &ExportArgs,
    source: &dyn MarketDataSource,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let series = fetch_enriched(&args.token, &args.interval, args.limit, source)?;

    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| StoreConfig::default().data_dir);
    let report = export_series(&series, &dir)?;

    match format {
        OutputFormat::Table => {
            println!("path  : {}", report.path.display());
            println!("rows  : {}", report.rows);
            println!("merged: {}", report.merged);
        }
        OutputFormat::Json => output::render_json(&report, pretty)?,
    }

    Ok(())
}
