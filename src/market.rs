//! Price, supply and candlestick sources (Bybit spot market + Mantle token API).
use std::future::Future;

use serde::Deserialize;
use serde_json::Value;

use crate::config::KLINE_LIMIT;
use crate::data::{Candle, KlineInterval, PriceQuote};
use crate::error::{FetchError, FetchResult};

pub const BYBIT_API: &str = "https://api.bybit.com";
pub const SUPPLY_API: &str = "https://api.mantle.xyz/api/v1/token-data?q=circulatingSupply";

/// Trading pairs used to build a [`PriceQuote`].
#[derive(Debug, Clone)]
pub struct PricePairs {
    /// Asset priced in USD, e.g. `MNTUSDT`.
    pub direct: String,
    /// Asset priced in the counter asset, e.g. `MNTBTC`.
    pub cross: String,
    /// Counter asset priced in USD, e.g. `BTCUSDT`.
    pub counter: String,
    pub counter_label: String,
}

impl Default for PricePairs {
    fn default() -> Self {
        Self {
            direct: "MNTUSDT".to_string(),
            cross: "MNTBTC".to_string(),
            counter: "BTCUSDT".to_string(),
            counter_label: "BTC".to_string(),
        }
    }
}

pub trait MarketSource: Send + Sync + 'static {
    fn price_quote(&self) -> impl Future<Output = FetchResult<PriceQuote>> + Send;

    fn circulating_supply(&self) -> impl Future<Output = FetchResult<f64>> + Send;

    fn klines(&self, interval: KlineInterval) -> impl Future<Output = FetchResult<Vec<Candle>>> + Send;
}

pub struct BybitMarketClient {
    http: reqwest::Client,
    base_url: String,
    supply_url: String,
    pairs: PricePairs,
}

impl BybitMarketClient {
    pub fn new(pairs: PricePairs) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BYBIT_API.to_string(),
            supply_url: SUPPLY_API.to_string(),
            pairs,
        }
    }

    fn join_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn ticker(&self, symbol: &str) -> FetchResult<Ticker> {
        let url = self.join_url(&format!("v5/market/tickers?category=spot&symbol={symbol}"));
        let payload = self.get_json(&url).await?;
        first_ticker(payload)
    }
}

impl MarketSource for BybitMarketClient {
    async fn price_quote(&self) -> FetchResult<PriceQuote> {
        let (direct, cross, counter) = tokio::join!(
            self.ticker(&self.pairs.direct),
            self.ticker(&self.pairs.cross),
            self.ticker(&self.pairs.counter),
        );
        combine_quote(direct, cross, counter)
    }

    async fn circulating_supply(&self) -> FetchResult<f64> {
        let payload = self.get_json(&self.supply_url).await?;
        parse_circulating_supply(&payload)
    }

    async fn klines(&self, interval: KlineInterval) -> FetchResult<Vec<Candle>> {
        let url = self.join_url(&format!(
            "v5/market/kline?category=spot&symbol={}&interval={}&limit={}",
            self.pairs.direct,
            interval.bybit_code(),
            KLINE_LIMIT
        ));
        let payload = self.get_json(&url).await?;
        parse_klines(payload)
    }
}

/// Best-effort quote: any failure degrades to empty legs.
pub async fn fetch_price_quote<M: MarketSource>(market: &M) -> PriceQuote {
    market
        .price_quote()
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "price quote fetch failed"))
        .unwrap_or_default()
}

pub async fn fetch_circulating_supply<M: MarketSource>(market: &M) -> Option<f64> {
    market
        .circulating_supply()
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "circulating supply fetch failed"))
        .ok()
}

#[derive(Debug, Deserialize)]
struct BybitEnvelope<T> {
    #[serde(rename = "retCode", default)]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<BybitList<T>>,
}

#[derive(Debug, Deserialize)]
struct BybitList<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ticker {
    #[serde(rename = "lastPrice", default)]
    pub last_price: Option<String>,
    #[serde(rename = "price24hPcnt", default)]
    pub price_24h_pcnt: Option<String>,
}

impl Ticker {
    fn last(&self) -> Option<f64> {
        parse_decimal(self.last_price.as_deref())
    }

    /// 24h change as a percentage (Bybit reports a fraction).
    fn change_pct(&self) -> Option<f64> {
        parse_decimal(self.price_24h_pcnt.as_deref()).map(|f| f * 100.0)
    }
}

fn parse_decimal(s: Option<&str>) -> Option<f64> {
    s.and_then(|s| s.trim().parse::<f64>().ok()).filter(|f| f.is_finite())
}

fn unwrap_list<T>(payload: Value) -> FetchResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope: BybitEnvelope<T> = serde_json::from_value(payload)?;
    if envelope.ret_code != 0 {
        return Err(FetchError::Api {
            code: envelope.ret_code,
            msg: envelope.ret_msg,
        });
    }
    envelope
        .result
        .map(|r| r.list)
        .ok_or(FetchError::Missing("result"))
}

pub fn first_ticker(payload: Value) -> FetchResult<Ticker> {
    unwrap_list::<Ticker>(payload)?
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::NoData("empty ticker list".to_string()))
}

/// Merges the three ticker legs. The cross rate is synthesized as
/// `usd / counter_usd` when the direct cross pair gives nothing. Only a
/// failure of every leg is an error.
pub fn combine_quote(
    direct: FetchResult<Ticker>,
    cross: FetchResult<Ticker>,
    counter: FetchResult<Ticker>,
) -> FetchResult<PriceQuote> {
    if let (Err(d), Err(_), Err(_)) = (&direct, &cross, &counter) {
        return Err(FetchError::NoData(format!("all ticker legs failed: {d}")));
    }
    for (leg, res) in [("cross", &cross), ("counter", &counter)] {
        if let Err(e) = res {
            tracing::debug!(leg, error = %e, "ticker leg unavailable");
        }
    }

    let direct = direct.ok();
    let usd = direct.as_ref().and_then(Ticker::last);
    let change_24h_pct = direct.as_ref().and_then(Ticker::change_pct);

    let mut counter_asset_price = cross.as_ref().ok().and_then(Ticker::last).filter(|p| *p > 0.0);
    if counter_asset_price.is_none() {
        let counter_usd = counter.as_ref().ok().and_then(Ticker::last);
        counter_asset_price = synthesize_cross(usd, counter_usd);
    }

    Ok(PriceQuote {
        usd,
        counter_asset_price,
        change_24h_pct,
    })
}

pub fn synthesize_cross(usd: Option<f64>, counter_usd: Option<f64>) -> Option<f64> {
    match (usd, counter_usd) {
        (Some(p), Some(q)) if q > 0.0 => Some(p / q),
        _ => None,
    }
}

/// Probes `circulatingSupply`, then `result`, then the bare payload.
/// Zero or negative values count as absent.
pub fn parse_circulating_supply(payload: &Value) -> FetchResult<f64> {
    let candidate = ["circulatingSupply", "result"]
        .iter()
        .find_map(|k| payload.get(*k).filter(|v| !v.is_null()))
        .unwrap_or(payload);
    let value = match candidate {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| FetchError::Decode(format!("no supply value in {candidate}")))?;

    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FetchError::NoData(format!("non-positive supply {value}")))
    }
}

/// Bybit returns `[start, open, high, low, close, volume, turnover]` rows,
/// newest first. The result is chronological.
pub fn parse_klines(payload: Value) -> FetchResult<Vec<Candle>> {
    let rows = unwrap_list::<Vec<String>>(payload)?;
    if rows.is_empty() {
        return Err(FetchError::NoData("empty kline list".to_string()));
    }
    let mut candles = rows
        .iter()
        .map(|row| parse_candle(row))
        .collect::<FetchResult<Vec<_>>>()?;
    candles.reverse();
    Ok(candles)
}

fn parse_candle(row: &[String]) -> FetchResult<Candle> {
    if row.len() < 6 {
        return Err(FetchError::Decode(format!("kline row has {} fields", row.len())));
    }
    let num = |i: usize| {
        row[i]
            .parse::<f64>()
            .map_err(|e| FetchError::Decode(format!("kline field {i}: {e}")))
    };
    Ok(Candle {
        time: row[0]
            .parse::<u64>()
            .map_err(|e| FetchError::Decode(format!("kline time: {e}")))?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMarket;
    use serde_json::json;

    #[tokio::test]
    async fn best_effort_wrappers_degrade_to_nulls() {
        let market = MockMarket::new(None, None);
        assert_eq!(fetch_price_quote(&market).await, PriceQuote::default());
        assert_eq!(fetch_circulating_supply(&market).await, None);

        let quote = PriceQuote { usd: Some(0.8), counter_asset_price: None, change_24h_pct: Some(-2.0) };
        let market = MockMarket::new(Some(quote), Some(3.2e9));
        assert_eq!(fetch_price_quote(&market).await, quote);
        assert_eq!(fetch_circulating_supply(&market).await, Some(3.2e9));
    }

    fn ticker(last: &str, pct: &str) -> FetchResult<Ticker> {
        Ok(Ticker {
            last_price: Some(last.to_string()),
            price_24h_pcnt: Some(pct.to_string()),
        })
    }

    fn missing() -> FetchResult<Ticker> {
        Err(FetchError::NoData("empty ticker list".to_string()))
    }

    #[test]
    fn quote_uses_direct_cross_pair() {
        let quote = combine_quote(ticker("0.80", "0.0125"), ticker("0.0000080", "0"), missing()).unwrap();
        assert_eq!(quote.usd, Some(0.80));
        assert_eq!(quote.counter_asset_price, Some(0.0000080));
        assert!((quote.change_24h_pct.unwrap() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn quote_synthesizes_cross_rate() {
        let quote = combine_quote(ticker("0.80", "0"), missing(), ticker("100000", "0")).unwrap();
        assert_eq!(quote.counter_asset_price, Some(0.80 / 100000.0));
    }

    #[test]
    fn cross_failure_keeps_usd() {
        let quote = combine_quote(ticker("1.5", "-0.02"), missing(), missing()).unwrap();
        assert_eq!(quote.usd, Some(1.5));
        assert_eq!(quote.counter_asset_price, None);
        assert!((quote.change_24h_pct.unwrap() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn total_failure_is_an_error() {
        assert!(combine_quote(missing(), missing(), missing()).is_err());
    }

    #[test]
    fn ticker_envelope() {
        let payload = json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {"category": "spot", "list": [{"symbol": "MNTUSDT", "lastPrice": "0.7421", "price24hPcnt": "-0.0310"}]}
        });
        let t = first_ticker(payload).unwrap();
        assert_eq!(t.last(), Some(0.7421));

        let err = first_ticker(json!({"retCode": 10001, "retMsg": "params error", "result": {}}));
        assert!(matches!(err, Err(FetchError::Api { code: 10001, .. })));

        let empty = first_ticker(json!({"retCode": 0, "retMsg": "OK", "result": {"list": []}}));
        assert!(matches!(empty, Err(FetchError::NoData(_))));
    }

    #[test]
    fn supply_shapes() {
        assert_eq!(parse_circulating_supply(&json!({"circulatingSupply": 3_250_000_000.5})).unwrap(), 3_250_000_000.5);
        assert_eq!(parse_circulating_supply(&json!({"result": "3000000000"})).unwrap(), 3_000_000_000.0);
        assert_eq!(parse_circulating_supply(&json!(42.0)).unwrap(), 42.0);
        assert_eq!(parse_circulating_supply(&json!("17")).unwrap(), 17.0);
    }

    #[test]
    fn zero_supply_is_absent() {
        assert!(parse_circulating_supply(&json!({"circulatingSupply": 0})).is_err());
        assert!(parse_circulating_supply(&json!({"unexpected": true})).is_err());
    }

    #[test]
    fn klines_are_reversed_to_chronological() {
        let payload = json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {"list": [
                ["1700086400000", "0.52", "0.55", "0.50", "0.54", "1000", "540"],
                ["1700000000000", "0.50", "0.53", "0.49", "0.52", "900", "468"]
            ]}
        });
        let candles = parse_klines(payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_000_000);
        assert_eq!(candles[1].close, 0.54);
        assert!(candles[1].is_up());
    }

    #[test]
    fn klines_no_data_and_api_error() {
        let empty = parse_klines(json!({"retCode": 0, "retMsg": "OK", "result": {"list": []}}));
        assert!(matches!(empty, Err(FetchError::NoData(_))));
        let api = parse_klines(json!({"retCode": 10001, "retMsg": "Invalid period", "result": null}));
        match api {
            Err(FetchError::Api { msg, .. }) => assert_eq!(msg, "Invalid period"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
