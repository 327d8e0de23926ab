use std::collections::BTreeMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::Date;
use tickfill_warehouse::StockRecord;

use super::date::{format_iso_date, iso_date, parse_row_date};
use crate::{Symbol, ValidationError};

/// One provider row: a symbol's valuation snapshot for one trading date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRow {
    pub symbol: Symbol,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    /// Provider fields without a dedicated column, kept verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl StockRow {
    pub fn new(symbol: Symbol, date: Date) -> Self {
        Self {
            symbol,
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            market_cap: None,
            pe_ratio: None,
            pb_ratio: None,
            dividend_yield: None,
            ma_50: None,
            ma_200: None,
            extra: BTreeMap::new(),
        }
    }

    /// Convert to the store's record shape.
    pub fn to_record(&self) -> StockRecord {
        let extra = if self.extra.is_empty() {
            None
        } else {
            serde_json::to_string(&self.extra).ok()
        };

        StockRecord {
            symbol: self.symbol.as_str().to_owned(),
            date: format_iso_date(self.date),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            market_cap: self.market_cap,
            pe_ratio: self.pe_ratio,
            pb_ratio: self.pb_ratio,
            dividend_yield: self.dividend_yield,
            ma_50: self.ma_50,
            ma_200: self.ma_200,
            extra,
        }
    }
}

/// Wire shape of a provider row before validation.
#[derive(Debug, Deserialize)]
struct RawStockRow {
    #[serde(alias = "ticker")]
    symbol: String,
    #[serde(alias = "trade_date")]
    date: String,
    #[serde(default, alias = "open_price", deserialize_with = "lenient_f64")]
    open: Option<f64>,
    #[serde(default, alias = "high_price", deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(default, alias = "low_price", deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(default, alias = "close_price", deserialize_with = "lenient_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    volume: Option<u64>,
    #[serde(default, alias = "marketCap", deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, alias = "pe", deserialize_with = "lenient_f64")]
    pe_ratio: Option<f64>,
    #[serde(default, alias = "pb", deserialize_with = "lenient_f64")]
    pb_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    dividend_yield: Option<f64>,
    #[serde(default, alias = "ma50", deserialize_with = "lenient_f64")]
    ma_50: Option<f64>,
    #[serde(default, alias = "ma200", deserialize_with = "lenient_f64")]
    ma_200: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<RawStockRow> for StockRow {
    type Error = ValidationError;

    fn try_from(raw: RawStockRow) -> Result<Self, Self::Error> {
        Ok(Self {
            symbol: Symbol::parse(&raw.symbol)?,
            date: parse_row_date(&raw.date)?,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            market_cap: raw.market_cap,
            pe_ratio: raw.pe_ratio,
            pb_ratio: raw.pb_ratio,
            dividend_yield: raw.dividend_yield,
            ma_50: raw.ma_50,
            ma_200: raw.ma_200,
            extra: raw.extra,
        })
    }
}

impl<'de> Deserialize<'de> for StockRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawStockRow::deserialize(deserializer)?;
        Self::try_from(raw).map_err(D::Error::custom)
    }
}

/// Accept a number, a numeric string, or null/empty.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => Ok(number.as_f64()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a number, got '{text}'"))),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// Like [`lenient_f64`] but for share counts; fractional values are truncated.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = lenient_f64(deserializer)? else {
        return Ok(None);
    };
    if value < 0.0 {
        return Err(D::Error::custom(format!("volume must be non-negative, got {value}")));
    }
    Ok(Some(value as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    #[test]
    fn decodes_row_with_aliases_and_extra_fields() {
        let row: StockRow = serde_json::from_value(json!({
            "ticker": "aapl",
            "date": "2025-01-02",
            "open": 184.2,
            "close": "185.5",
            "volume": 51234567,
            "marketCap": 2.8e12,
            "pe": 29.1,
            "sector": "Technology"
        }))
        .expect("row should decode");

        assert_eq!(row.symbol.as_str(), "AAPL");
        assert_eq!(row.date, date!(2025 - 01 - 02));
        assert_eq!(row.close, Some(185.5));
        assert_eq!(row.volume, Some(51_234_567));
        assert_eq!(row.market_cap, Some(2.8e12));
        assert_eq!(row.pe_ratio, Some(29.1));
        assert_eq!(row.extra.get("sector"), Some(&json!("Technology")));
    }

    #[test]
    fn missing_date_is_rejected() {
        let error = serde_json::from_value::<StockRow>(json!({ "symbol": "AAPL" }))
            .expect_err("date is required");
        assert!(error.to_string().contains("date"));
    }

    #[test]
    fn non_numeric_price_is_rejected() {
        let error = serde_json::from_value::<StockRow>(json!({
            "symbol": "AAPL",
            "date": "2025-01-02",
            "close": "n/a"
        }))
        .expect_err("price must be numeric");
        assert!(error.to_string().contains("expected a number"));
    }

    #[test]
    fn record_carries_extra_fields_as_json() {
        let mut row = StockRow::new(Symbol::parse("MSFT").expect("symbol"), date!(2025 - 01 - 03));
        row.extra.insert(String::from("sector"), json!("Technology"));

        let record = row.to_record();
        assert_eq!(record.date, "2025-01-03");
        assert_eq!(record.extra.as_deref(), Some(r#"{"sector":"Technology"}"#));
    }
}
