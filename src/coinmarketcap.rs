use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use select::document::Document;
use select::predicate::{Name, Predicate};
use serde::Deserialize;

use crate::config::Settings;
use crate::providers::{Candle, CoinId, CoinStats, MarketProvider, ProviderError, ProviderKind};
use crate::utils::{format_usd, markdown_explorer_link};

const PROVIDER: &str = "coinmarketcap";

// The trending page blocks default client UAs.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.79 Safari/537.36";

pub struct CoinMarketCapClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    trending_url: String,
    trending_limit: usize,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    #[serde(default)]
    data: Vec<MapEntry>,
}

#[derive(Debug, Deserialize)]
struct MapEntry {
    id: i64,
    name: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, QuoteEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteEntry {
    pub name: String,
    pub symbol: String,
    pub cmc_rank: Option<u32>,
    #[serde(default)]
    pub quote: HashMap<String, Quote>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Quote {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    data: HashMap<String, InfoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct InfoEntry {
    #[serde(default)]
    pub urls: InfoUrls,
}

#[derive(Debug, Default, Deserialize)]
pub struct InfoUrls {
    #[serde(default)]
    pub website: Vec<String>,
    #[serde(default)]
    pub explorer: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    #[serde(default)]
    quotes: Vec<OhlcvQuote>,
}

#[derive(Debug, Deserialize)]
struct OhlcvQuote {
    time_open: String,
    #[serde(default)]
    quote: HashMap<String, OhlcvUsd>,
}

#[derive(Debug, Deserialize)]
struct OhlcvUsd {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl CoinMarketCapClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.cmc_base_url.clone(),
            api_key: settings.cmc_api_key.clone(),
            trending_url: settings.cmc_trending_url.clone(),
            trending_limit: settings.cmc_trending_limit,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl MarketProvider for CoinMarketCapClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CoinMarketCap
    }

    async fn lookup_by_symbol(&self, symbol: &str) -> Result<Vec<CoinId>, ProviderError> {
        log::info!("coinmarketcap.lookup_by_symbol symbol={symbol}");
        let resp: MapResponse = self
            .get_json(&format!("/v1/cryptocurrency/map?symbol={symbol}"))
            .await?;
        Ok(resp
            .data
            .into_iter()
            .map(|e| CoinId {
                source: ProviderKind::CoinMarketCap,
                id: e.id.to_string(),
                name: e.name,
            })
            .collect())
    }

    async fn lookup_by_id(&self, id: &CoinId) -> Result<CoinStats, ProviderError> {
        log::info!("coinmarketcap.lookup_by_id id={}", id.id);
        let quotes: QuotesResponse = self
            .get_json(&format!(
                "/v1/cryptocurrency/quotes/latest?id={}&convert=USD",
                id.id
            ))
            .await?;
        let info: InfoResponse = self
            .get_json(&format!("/v1/cryptocurrency/info?id={}", id.id))
            .await?;

        let entry = quotes
            .data
            .into_iter()
            .find(|(key, _)| key == &id.id)
            .map(|(_, v)| v)
            .ok_or_else(|| ProviderError::NotFound {
                provider: PROVIDER,
                id: id.id.clone(),
            })?;
        let urls = info
            .data
            .into_iter()
            .find(|(key, _)| key == &id.id)
            .map(|(_, v)| v.urls)
            .unwrap_or_default();

        normalize_quote(entry, urls)
    }

    /// The public trending list has no API endpoint; scrape the page the
    /// way the upstream site renders it and keep the top entries.
    async fn trending(&self) -> Result<Vec<String>, ProviderError> {
        log::info!("coinmarketcap.trending url={}", self.trending_url);
        let resp = self
            .client
            .get(&self.trending_url)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }
        let html = resp.text().await?;
        let mut tokens = parse_trending_html(&html);
        tokens.truncate(self.trending_limit);
        Ok(tokens)
    }

    async fn ohlc(&self, id: &CoinId, days: &str) -> Result<Vec<Candle>, ProviderError> {
        // The historical endpoint takes a daily count, not a window label.
        let count: u32 = match days.parse() {
            Ok(n) => n,
            Err(_) => {
                log::warn!("coinmarketcap.ohlc days={days} capped_to=365");
                365
            }
        };
        log::info!("coinmarketcap.ohlc id={} count={count}", id.id);
        let resp: OhlcvResponse = self
            .get_json(&format!(
                "/v2/cryptocurrency/ohlcv/historical?id={}&time_period=daily&count={count}&convert=USD",
                id.id
            ))
            .await?;

        let mut candles = Vec::with_capacity(resp.data.quotes.len());
        for q in resp.data.quotes {
            let Some(usd) = q.quote.get("USD") else {
                continue;
            };
            let ts = chrono::DateTime::parse_from_rfc3339(&q.time_open)
                .map_err(|e| ProviderError::Decode {
                    provider: PROVIDER,
                    detail: format!("bad time_open {}: {e}", q.time_open),
                })?
                .timestamp_millis();
            candles.push(Candle {
                ts,
                open: usd.open,
                high: usd.high,
                low: usd.low,
                close: usd.close,
            });
        }
        Ok(candles)
    }
}

/// Flatten a quotes/latest entry plus metadata URLs into the normalized
/// record. Only the USD quote block is consumed; the ath fields stay
/// empty on this path.
pub fn normalize_quote(entry: QuoteEntry, urls: InfoUrls) -> Result<CoinStats, ProviderError> {
    let usd = entry.quote.get("USD").ok_or_else(|| ProviderError::Decode {
        provider: PROVIDER,
        detail: format!("no USD quote block for {}", entry.symbol),
    })?;

    let explorers = urls
        .explorer
        .iter()
        .filter(|l| !l.is_empty())
        .filter_map(|l| markdown_explorer_link(l))
        .collect();

    Ok(CoinStats {
        name: entry.name,
        symbol: entry.symbol,
        website: urls.website.first().cloned().unwrap_or_default(),
        explorers,
        price: format_usd(usd.price.unwrap_or(0.0)),
        ath: None,
        market_cap_rank: entry.cmc_rank,
        market_cap: format_usd(usd.market_cap.unwrap_or(0.0)),
        volume: format_usd(usd.volume_24h.unwrap_or(0.0)),
        percent_change_24h: usd.percent_change_24h.unwrap_or(0.0),
        percent_change_7d: usd.percent_change_7d.unwrap_or(0.0),
        percent_change_30d: usd.percent_change_30d.unwrap_or(0.0),
        percent_change_ath: None,
    })
}

/// "Name (SYMBOL)" pairs out of the trending page's coin table. Each coin
/// anchor holds two `<p>` cells, name then symbol; anchors with fewer
/// cells are navigation chrome.
pub fn parse_trending_html(html: &str) -> Vec<String> {
    let document = Document::from(html);
    let mut tokens = Vec::new();
    for node in document.find(Name("table").descendant(Name("a"))) {
        let cells: Vec<String> = node.find(Name("p")).map(|p| p.text()).collect();
        if cells.len() >= 2 {
            tokens.push(format!("{} ({})", cells[0], cells[1]));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd_quote(value: serde_json::Value) -> QuoteEntry {
        serde_json::from_value(serde_json::json!({
            "name": "Bitcoin",
            "symbol": "BTC",
            "cmc_rank": 1,
            "quote": {"USD": value},
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_usd_quote_without_ath() {
        let stats = normalize_quote(
            usd_quote(serde_json::json!({
                "price": 68123.45,
                "market_cap": 1_340_000_000_000.0,
                "volume_24h": 32_000_000_000.0,
                "percent_change_24h": 2.4,
                "percent_change_7d": -1.1,
                "percent_change_30d": 9.8,
            })),
            serde_json::from_value(serde_json::json!({
                "website": ["https://bitcoin.org"],
                "explorer": ["https://blockchain.info/btc", ""],
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(stats.price, "$68,123.45");
        assert_eq!(stats.ath, None);
        assert_eq!(stats.percent_change_ath, None);
        assert_eq!(stats.website, "https://bitcoin.org");
        assert_eq!(
            stats.explorers,
            vec!["[blockchain](https://blockchain.info/btc)".to_string()]
        );
    }

    #[test]
    fn null_quote_fields_default_to_zero() {
        let stats = normalize_quote(
            usd_quote(serde_json::json!({
                "price": null,
                "market_cap": null,
                "volume_24h": null,
                "percent_change_24h": null,
                "percent_change_7d": null,
                "percent_change_30d": null,
            })),
            InfoUrls::default(),
        )
        .unwrap();

        assert_eq!(stats.price, "$0");
        assert_eq!(stats.percent_change_24h, 0.0);
        assert_eq!(stats.percent_change_7d, 0.0);
        assert_eq!(stats.percent_change_30d, 0.0);
    }

    #[test]
    fn missing_usd_block_is_a_decode_error() {
        let entry: QuoteEntry = serde_json::from_value(serde_json::json!({
            "name": "Bitcoin",
            "symbol": "BTC",
            "cmc_rank": 1,
            "quote": {},
        }))
        .unwrap();
        let err = normalize_quote(entry, InfoUrls::default()).unwrap_err();
        assert!(err.triggers_fallback());
    }

    #[test]
    fn parses_trending_table_rows() {
        let html = r#"
            <html><body>
            <nav><a href="/"><p>Home</p></a></nav>
            <table>
              <tr><td><a href="/currencies/bitcoin/"><p>Bitcoin</p><p>BTC</p></a></td></tr>
              <tr><td><a href="/currencies/pepe/"><p>Pepe</p><p>PEPE</p></a></td></tr>
              <tr><td><a href="/watchlist/"><p>Watch</p></a></td></tr>
            </table>
            </body></html>
        "#;
        assert_eq!(
            parse_trending_html(html),
            vec!["Bitcoin (BTC)".to_string(), "Pepe (PEPE)".to_string()]
        );
    }

    #[test]
    fn trending_parse_tolerates_empty_page() {
        assert!(parse_trending_html("<html></html>").is_empty());
    }
}
