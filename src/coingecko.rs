use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Settings;
use crate::providers::{Candle, CoinId, CoinStats, MarketProvider, ProviderError, ProviderKind};
use crate::utils::{format_usd, markdown_explorer_link};

const PROVIDER: &str = "coingecko";

pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListedCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CoinDetail {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
    pub links: CoinLinks,
    pub market_data: MarketData,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoinLinks {
    #[serde(default)]
    pub homepage: Vec<String>,
    #[serde(default)]
    pub blockchain_site: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,
    #[serde(default)]
    pub ath: HashMap<String, f64>,
    #[serde(default)]
    pub ath_change_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    name: String,
    symbol: String,
}

impl CoinGeckoClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.coingecko_base_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self.client.get(&url).send().await?;
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
impl MarketProvider for CoinGeckoClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CoinGecko
    }

    async fn lookup_by_symbol(&self, symbol: &str) -> Result<Vec<CoinId>, ProviderError> {
        log::info!("coingecko.lookup_by_symbol symbol={symbol}");
        let coins: Vec<ListedCoin> = self.get_json("/coins/list").await?;
        Ok(coins
            .into_iter()
            .filter(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .map(|c| CoinId {
                source: ProviderKind::CoinGecko,
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn lookup_by_id(&self, id: &CoinId) -> Result<CoinStats, ProviderError> {
        log::info!("coingecko.lookup_by_id id={}", id.id);
        let detail: CoinDetail = self
            .get_json(&format!(
                "/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false",
                id.id
            ))
            .await?;
        Ok(normalize_detail(detail))
    }

    async fn trending(&self) -> Result<Vec<String>, ProviderError> {
        log::info!("coingecko.trending");
        let resp: TrendingResponse = self.get_json("/search/trending").await?;
        Ok(resp
            .coins
            .into_iter()
            .map(|c| format!("{} ({})", c.item.name, c.item.symbol))
            .collect())
    }

    async fn ohlc(&self, id: &CoinId, days: &str) -> Result<Vec<Candle>, ProviderError> {
        log::info!("coingecko.ohlc id={} days={days}", id.id);
        let rows: Vec<(f64, f64, f64, f64, f64)> = self
            .get_json(&format!("/coins/{}/ohlc?vs_currency=usd&days={days}", id.id))
            .await?;
        Ok(rows
            .into_iter()
            .map(|(ts, open, high, low, close)| Candle {
                ts: ts as i64,
                open,
                high,
                low,
                close,
            })
            .collect())
    }
}

/// Flatten the CoinGecko detail shape into the provider-agnostic record.
/// Currency fields are formatted only when a USD quote exists; percent
/// changes default to 0 when the API reports null.
pub fn normalize_detail(detail: CoinDetail) -> CoinStats {
    let md = &detail.market_data;
    let usd_price = md.current_price.get("usd").copied();

    let (price, ath, market_cap, volume) = match usd_price {
        Some(p) => (
            format_usd(p),
            md.ath.get("usd").copied().map(format_usd),
            md.market_cap.get("usd").copied().map(format_usd).unwrap_or_else(|| format_usd(0.0)),
            md.total_volume.get("usd").copied().map(format_usd).unwrap_or_else(|| format_usd(0.0)),
        ),
        None => (format_usd(0.0), None, format_usd(0.0), format_usd(0.0)),
    };

    let explorers = derive_explorers(&detail.platforms, &detail.links);

    CoinStats {
        name: detail.name,
        symbol: detail.symbol.to_uppercase(),
        website: detail.links.homepage.first().cloned().unwrap_or_default(),
        explorers,
        price,
        ath,
        market_cap_rank: md.market_cap_rank,
        market_cap,
        volume,
        percent_change_24h: md.price_change_percentage_24h.unwrap_or(0.0),
        percent_change_7d: md.price_change_percentage_7d.unwrap_or(0.0),
        percent_change_30d: md.price_change_percentage_30d.unwrap_or(0.0),
        percent_change_ath: Some(
            md.ath_change_percentage.get("usd").copied().unwrap_or(0.0),
        ),
    }
}

/// Explorer links: provider-supplied blockchain sites first, then
/// well-known explorer templates keyed by chain-name substring. Exact
/// duplicates of an already-collected link are skipped.
pub fn derive_explorers(
    platforms: &HashMap<String, Option<String>>,
    links: &CoinLinks,
) -> Vec<String> {
    let mut explorers: Vec<String> = links
        .blockchain_site
        .iter()
        .filter(|l| !l.is_empty())
        .filter_map(|l| markdown_explorer_link(l))
        .collect();

    for (network, address) in platforms {
        let Some(address) = address.as_deref().filter(|a| !a.is_empty()) else {
            continue;
        };
        let templated = if network.contains("ethereum") {
            Some(format!("[etherscan](https://etherscan.io/token/{address})"))
        } else if network.contains("binance") {
            Some(format!("[bscscan](https://bscscan.com/token/{address})"))
        } else if network.contains("polygon") {
            Some(format!(
                "[polygonscan](https://polygonscan.com/token/{address})"
            ))
        } else if network.contains("solana") {
            Some(format!(
                "[explorer.solana](https://explorer.solana.com/address/{address})"
            ))
        } else {
            None
        };

        if let Some(link) = templated {
            if !explorers.contains(&link) {
                explorers.push(link);
            }
        }
    }
    explorers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_json(market_data: serde_json::Value) -> CoinDetail {
        serde_json::from_value(serde_json::json!({
            "name": "Bitcoin",
            "symbol": "btc",
            "platforms": {},
            "links": {"homepage": ["https://bitcoin.org"], "blockchain_site": []},
            "market_data": market_data,
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_usd_quoted_detail() {
        let stats = normalize_detail(detail_json(serde_json::json!({
            "current_price": {"usd": 68123.45},
            "ath": {"usd": 73750.0},
            "ath_change_percentage": {"usd": -7.6},
            "market_cap": {"usd": 1_340_000_000_000.0},
            "total_volume": {"usd": 32_000_000_000.0},
            "market_cap_rank": 1,
            "price_change_percentage_24h": 2.4,
            "price_change_percentage_7d": -1.1,
            "price_change_percentage_30d": 9.8,
        })));

        assert_eq!(stats.symbol, "BTC");
        assert_eq!(stats.price, "$68,123.45");
        assert_eq!(stats.ath.as_deref(), Some("$73,750"));
        assert_eq!(stats.market_cap_rank, Some(1));
        assert_eq!(stats.percent_change_ath, Some(-7.6));
    }

    #[test]
    fn missing_percent_changes_default_to_zero() {
        let stats = normalize_detail(detail_json(serde_json::json!({
            "current_price": {"usd": 1.0},
            "ath": {"usd": 2.0},
            "ath_change_percentage": {},
            "market_cap": {},
            "total_volume": {},
            "market_cap_rank": null,
            "price_change_percentage_24h": null,
            "price_change_percentage_7d": null,
            "price_change_percentage_30d": null,
        })));

        assert_eq!(stats.percent_change_24h, 0.0);
        assert_eq!(stats.percent_change_7d, 0.0);
        assert_eq!(stats.percent_change_30d, 0.0);
        assert_eq!(stats.percent_change_ath, Some(0.0));
        assert_eq!(stats.market_cap_rank, None);
    }

    #[test]
    fn non_usd_listing_keeps_placeholder_prices() {
        let stats = normalize_detail(detail_json(serde_json::json!({
            "current_price": {"eur": 5.0},
            "ath": {"eur": 6.0},
            "ath_change_percentage": {"eur": -1.0},
            "market_cap": {"eur": 100.0},
            "total_volume": {"eur": 10.0},
            "market_cap_rank": 900,
            "price_change_percentage_24h": 0.5,
            "price_change_percentage_7d": 0.5,
            "price_change_percentage_30d": 0.5,
        })));

        assert_eq!(stats.price, "$0");
        assert_eq!(stats.ath, None);
        assert_eq!(stats.market_cap, "$0");
        assert_eq!(stats.volume, "$0");
    }

    #[test]
    fn explorer_templates_dedup_against_blockchain_sites() {
        let links: CoinLinks = serde_json::from_value(serde_json::json!({
            "homepage": [],
            "blockchain_site": ["https://etherscan.io/token/0xabc", ""],
        }))
        .unwrap();
        let platforms = HashMap::from([
            ("ethereum".to_string(), Some("0xabc".to_string())),
        ]);

        let explorers = derive_explorers(&platforms, &links);
        let etherscan = explorers
            .iter()
            .filter(|e| e.starts_with("[etherscan]"))
            .count();
        assert_eq!(etherscan, 1);
    }

    #[test]
    fn explorer_templates_cover_known_chains() {
        let links = CoinLinks::default();
        let platforms = HashMap::from([
            ("binance-smart-chain".to_string(), Some("0xbb".to_string())),
            ("polygon-pos".to_string(), Some("0xpp".to_string())),
            ("solana".to_string(), Some("So11".to_string())),
            ("near-protocol".to_string(), Some("abcd".to_string())),
            ("ethereum".to_string(), None),
        ]);

        let explorers = derive_explorers(&platforms, &links);
        assert_eq!(explorers.len(), 3);
        assert!(explorers.iter().any(|e| e.starts_with("[bscscan]")));
        assert!(explorers.iter().any(|e| e.starts_with("[polygonscan]")));
        assert!(explorers.iter().any(|e| e.starts_with("[explorer.solana]")));
    }
}
