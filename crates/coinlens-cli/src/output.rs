use serde::Serialize;

use coinlens_core::{EnrichedSeries, ProfitMatrix, SquareMatrix};

use crate::error::CliError;

pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{payload}");
    Ok(())
}

/// Human-readable dump of an enriched series. Presentation only.
pub fn render_series_table(series: &EnrichedSeries) {
    println!("token   : {}", series.token());
    println!("interval: {}", series.interval());
    println!("rows    : {}", series.len());
    println!();
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12} {:>11} {:>11} {:>14} {:>15} {:>16} {:>16}",
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "net_profit",
        "max_profit",
        "volume_diff",
        "volume_diff_ma",
        "obv",
        "obv_ma",
    );

    for row in series.rows() {
        println!(
            "{:<20} {:>12} {:>12} {:>12} {:>12} {:>11} {:>11} {:>14} {:>15} {:>16} {:>16}",
            row.raw.ts.format_rfc3339(),
            cell(row.raw.open),
            cell(row.raw.high),
            cell(row.raw.low),
            cell(row.raw.close),
            cell(row.net_profit),
            cell(row.max_profit),
            cell(row.volume_diff),
            cell(row.volume_diff_ma),
            cell(row.obv),
            cell(row.obv_ma),
        );
    }
}

pub fn render_profit_table(matrix: &ProfitMatrix) {
    print!("{:<20}", "timestamp");
    for token in matrix.tokens() {
        print!(" {:>14}", token.as_str());
    }
    println!();

    for (row, ts) in matrix.timestamps().iter().enumerate() {
        print!("{:<20}", ts.format_rfc3339());
        for col in 0..matrix.tokens().len() {
            print!(" {:>14}", cell(matrix.column(col)[row]));
        }
        println!();
    }

    if matrix.row_count() == 0 {
        println!("(no overlapping timestamps)");
    }
}

pub fn render_square_table(matrix: &SquareMatrix) {
    print!("{:<14}", "");
    for token in matrix.tokens() {
        print!(" {:>14}", token.as_str());
    }
    println!();

    for (row, token) in matrix.tokens().iter().enumerate() {
        print!("{:<14}", token.as_str());
        for col in 0..matrix.tokens().len() {
            print!(" {:>14}", cell(matrix.get(row, col)));
        }
        println!();
    }
}

fn cell(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        String::from("NaN")
    }
}
