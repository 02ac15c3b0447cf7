use reqwest::Method;
use rotator_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use std::str::FromStr;

/// Symbol-scoped public endpoints answer with a single object, the unscoped
/// variants with a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolParams {
    pub symbol: Option<SmolStr>,
    /// JSON-encoded array of symbols, eg/ `["BTCUSDT","ETHUSDT"]`.
    pub symbols: Option<String>,
}

impl SymbolParams {
    pub fn one(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            symbols: None,
        }
    }

    pub fn many<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = symbols
            .into_iter()
            .map(|symbol| format!("\"{}\"", symbol.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            symbol: None,
            symbols: Some(format!("[{list}]")),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }
}

/// `GET /api/v3/ticker/price` (weight 2 single / 4 all).
#[derive(Debug, Clone)]
pub struct GetTickerPrice(pub SymbolParams);

impl RestRequest for GetTickerPrice {
    type Response = OneOrMany<TickerPriceRow>;
    type QueryParams = SymbolParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/ticker/price".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        if self.0.symbol.is_some() { 2 } else { 4 }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerPriceRow {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

/// `GET /api/v3/ticker/bookTicker` (weight 2 single / 4 all).
#[derive(Debug, Clone)]
pub struct GetBookTicker(pub SymbolParams);

impl RestRequest for GetBookTicker {
    type Response = OneOrMany<BookTickerRow>;
    type QueryParams = SymbolParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/ticker/bookTicker".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        if self.0.symbol.is_some() { 2 } else { 4 }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookTickerRow {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "bidPrice")]
    pub bid_price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "askPrice")]
    pub ask_price: Decimal,
}

impl BookTickerRow {
    /// Mid price when both sides of the book are populated.
    pub fn mid(&self) -> Option<Decimal> {
        (self.bid_price > Decimal::ZERO && self.ask_price > Decimal::ZERO)
            .then(|| (self.bid_price + self.ask_price) / Decimal::TWO)
    }
}

/// `GET /api/v3/avgPrice` (weight 2).
#[derive(Debug, Clone)]
pub struct GetAvgPrice(pub SymbolParams);

impl RestRequest for GetAvgPrice {
    type Response = AvgPriceResponse;
    type QueryParams = SymbolParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/avgPrice".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        2
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvgPriceResponse {
    pub mins: u32,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

/// `GET /api/v3/ticker/24hr` (weight 2 single / 40 list / 80 all).
#[derive(Debug, Clone)]
pub struct GetTicker24hr(pub SymbolParams);

impl RestRequest for GetTicker24hr {
    type Response = OneOrMany<Ticker24hrStats>;
    type QueryParams = SymbolParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/ticker/24hr".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        if self.0.symbol.is_some() {
            2
        } else if self.0.symbols.is_some() {
            40
        } else {
            80
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ticker24hrStats {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "lastPrice")]
    pub last_price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "priceChangePercent")]
    pub price_change_percent: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "quoteVolume")]
    pub quote_volume: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "bidPrice", default)]
    pub bid_price: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "askPrice", default)]
    pub ask_price: Option<Decimal>,
}

/// `GET /api/v3/klines` (weight 2).
#[derive(Debug, Clone)]
pub struct GetKlines(pub KlineParams);

impl RestRequest for GetKlines {
    type Response = Vec<Vec<serde_json::Value>>;
    type QueryParams = KlineParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/klines".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        2
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KlineParams {
    pub symbol: SmolStr,
    pub interval: SmolStr,
    pub limit: u32,
}

/// Parsed candlestick. Venue rows are heterogeneous JSON arrays; rows that do
/// not match the documented layout are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

impl Kline {
    pub fn from_row(row: &[serde_json::Value]) -> Option<Self> {
        fn decimal(value: &serde_json::Value) -> Option<Decimal> {
            Decimal::from_str(value.as_str()?).ok()
        }

        if row.len() < 7 {
            return None;
        }
        Some(Kline {
            open_time: row[0].as_i64()?,
            open: decimal(&row[1])?,
            high: decimal(&row[2])?,
            low: decimal(&row[3])?,
            close: decimal(&row[4])?,
            volume: decimal(&row[5])?,
            close_time: row[6].as_i64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    mod de {
        use super::*;

        #[test]
        fn test_book_ticker_one_or_many() {
            let one = r#"{"symbol":"BTCUSDT","bidPrice":"4.0","bidQty":"431.0","askPrice":"4.2","askQty":"9.0"}"#;
            let rows = serde_json::from_str::<OneOrMany<BookTickerRow>>(one)
                .unwrap()
                .into_vec();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].mid(), Some(dec!(4.1)));

            let many = r#"[
                {"symbol":"BTCUSDT","bidPrice":"4.0","askPrice":"4.2"},
                {"symbol":"ETHUSDT","bidPrice":"0","askPrice":"0.1"}
            ]"#;
            let rows = serde_json::from_str::<OneOrMany<BookTickerRow>>(many)
                .unwrap()
                .into_vec();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].mid(), None);
        }

        #[test]
        fn test_ticker_24hr_stats() {
            let raw = r#"{
                "symbol": "BNBUSDT",
                "priceChange": "-94.99999800",
                "priceChangePercent": "-95.960",
                "lastPrice": "4.00000200",
                "bidPrice": "4.00000000",
                "askPrice": "4.00000200",
                "quoteVolume": "15.30000000",
                "openTime": 1499783499040,
                "closeTime": 1499869899040
            }"#;

            let stats = serde_json::from_str::<Ticker24hrStats>(raw).unwrap();
            assert_eq!(stats.quote_volume, dec!(15.3));
            assert_eq!(stats.price_change_percent, dec!(-95.96));
        }

        #[test]
        fn test_kline_row_parsing() {
            let raw = r#"[
                [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100", "148976.1", 1499644799999, "2434.19", 308, "1756.87", "28.46", "0"]
            ]"#;

            let rows = serde_json::from_str::<Vec<Vec<serde_json::Value>>>(raw).unwrap();
            let kline = Kline::from_row(&rows[0]).unwrap();
            assert_eq!(kline.open_time, 1_499_040_000_000);
            assert_eq!(kline.high, dec!(0.8));
            assert_eq!(kline.close_time, 1_499_644_799_999);

            // malformed row is dropped, not panicked on
            assert!(Kline::from_row(&[serde_json::Value::Null]).is_none());
        }
    }

    mod ser {
        use super::*;

        #[test]
        fn test_symbols_param_is_json_array() {
            let params = SymbolParams::many(["BTCUSDT", "ETHUSDT"]);
            let encoded = serde_urlencoded::to_string(&params).unwrap();
            assert_eq!(
                encoded,
                "symbols=%5B%22BTCUSDT%22%2C%22ETHUSDT%22%5D"
            );
        }
    }
}
