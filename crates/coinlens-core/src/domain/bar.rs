use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

/// One kline record: OHLCV plus the volume-attribution fields the exchange
/// reports per interval.
///
/// `ts` is the interval open time. The wire row's close time and trailing
/// ignored field are not part of this projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-asset volume.
    pub volume: f64,
    /// Quote-asset volume.
    pub quote_volume: f64,
    pub trades: u64,
    /// Base-asset volume initiated by the taker side.
    pub taker_base_volume: f64,
    /// Quote-asset volume initiated by the taker side.
    pub taker_quote_volume: f64,
}

impl RawBar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        quote_volume: f64,
        trades: u64,
        taker_base_volume: f64,
        taker_quote_volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume", volume)?;
        validate_non_negative("quote_volume", quote_volume)?;
        validate_non_negative("taker_base_volume", taker_base_volume)?;
        validate_non_negative("taker_quote_volume", taker_quote_volume)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
            quote_volume,
            trades,
            taker_base_volume,
            taker_quote_volume,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
