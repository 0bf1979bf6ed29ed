use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::data_source::{KlinesRequest, MarketDataSource, SourceError};
use crate::{ProviderId, RawBar, UtcDateTime};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of positional fields in one kline row: open time, open, high,
/// low, close, volume, close time, quote volume, trade count, taker base
/// volume, taker quote volume, and one ignored field.
const KLINE_FIELDS: usize = 12;

/// Thin blocking client for the Binance klines endpoint.
///
/// No retries, no pagination: one GET per request, decoded into [`RawBar`]s.
#[derive(Debug)]
pub struct BinanceAdapter {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl BinanceAdapter {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the adapter at a non-default endpoint (test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SourceError::internal(error.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn decode_rows(payload: &Value) -> Result<Vec<RawBar>, SourceError> {
        let rows = payload
            .as_array()
            .ok_or_else(|| SourceError::malformed_response("klines payload is not an array"))?;

        rows.iter().map(decode_row).collect()
    }
}

impl MarketDataSource for BinanceAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Binance
    }

    fn klines(&self, req: &KlinesRequest) -> Result<Vec<RawBar>, SourceError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, req.token, req.interval, req.limit
        );
        debug!(token = %req.token, interval = %req.interval, limit = req.limit, "fetching klines");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|error| SourceError::transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SourceError::transport(format!(
                "binance returned status {status}: {body}"
            )));
        }

        let payload: Value = response
            .json()
            .map_err(|error| SourceError::malformed_response(error.to_string()))?;

        let bars = Self::decode_rows(&payload)?;
        debug!(token = %req.token, bars = bars.len(), "decoded klines");
        Ok(bars)
    }
}

fn decode_row(row: &Value) -> Result<RawBar, SourceError> {
    let fields = row
        .as_array()
        .ok_or_else(|| SourceError::malformed_response("kline row is not an array"))?;

    if fields.len() < KLINE_FIELDS {
        return Err(SourceError::malformed_response(format!(
            "kline row has {} fields, expected {KLINE_FIELDS}",
            fields.len()
        )));
    }

    let open_time = field_i64(fields, 0)?;
    let ts = UtcDateTime::from_unix_millis(open_time)
        .map_err(|error| SourceError::malformed_response(error.to_string()))?;

    RawBar::new(
        ts,
        field_f64(fields, 1)?,
        field_f64(fields, 2)?,
        field_f64(fields, 3)?,
        field_f64(fields, 4)?,
        field_f64(fields, 5)?,
        field_f64(fields, 7)?,
        field_u64(fields, 8)?,
        field_f64(fields, 9)?,
        field_f64(fields, 10)?,
    )
    .map_err(|error| SourceError::malformed_response(error.to_string()))
}

// Binance encodes prices and volumes as decimal strings and timestamps and
// trade counts as JSON numbers.
fn field_f64(fields: &[Value], index: usize) -> Result<f64, SourceError> {
    match &fields[index] {
        Value::String(text) => text.parse::<f64>().map_err(|_| {
            SourceError::malformed_response(format!("field {index} is not a decimal: '{text}'"))
        }),
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| SourceError::malformed_response(format!("field {index} overflows f64"))),
        other => Err(SourceError::malformed_response(format!(
            "field {index} has unexpected type: {other}"
        ))),
    }
}

fn field_i64(fields: &[Value], index: usize) -> Result<i64, SourceError> {
    fields[index].as_i64().ok_or_else(|| {
        SourceError::malformed_response(format!("field {index} is not an integer"))
    })
}

fn field_u64(fields: &[Value], index: usize) -> Result<u64, SourceError> {
    fields[index].as_u64().ok_or_else(|| {
        SourceError::malformed_response(format!("field {index} is not a non-negative integer"))
    })
}
