use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::model::candle::Candle;

/// Binance error body, e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Binance encodes prices and volumes as strings; accept bare numbers too.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// One `GET /api/v3/klines` entry:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn parse_kline(entry: &Value) -> Result<Candle, AppError> {
    let fields = entry
        .as_array()
        .ok_or_else(|| AppError::DataFormat("kline entry is not an array".to_string()))?;
    if fields.len() < 6 {
        return Err(AppError::DataFormat(format!(
            "kline entry has {} fields, expected at least 6",
            fields.len()
        )));
    }
    let open_time = fields[0]
        .as_u64()
        .ok_or_else(|| AppError::DataFormat("kline open time is not an integer".to_string()))?;
    let number = |idx: usize, name: &str| {
        value_to_f64(&fields[idx]).ok_or_else(|| {
            AppError::DataFormat(format!(
                "kline {} field {} is not numeric: {}",
                open_time, name, fields[idx]
            ))
        })
    };
    Ok(Candle {
        open_time,
        open: number(1, "open")?,
        high: number(2, "high")?,
        low: number(3, "low")?,
        close: number(4, "close")?,
        volume: number(5, "volume")?,
    })
}
