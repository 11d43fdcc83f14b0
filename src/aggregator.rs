use std::sync::Arc;

use anyhow::Result;

use crate::providers::{Candle, CoinId, CoinStats, MarketProvider, ProviderKind};

/// Day windows accepted by the chart path.
pub const CHART_DAYS: [&str; 8] = ["1", "7", "14", "30", "90", "180", "365", "max"];

pub fn valid_chart_days(days: &str) -> bool {
    CHART_DAYS.contains(&days)
}

/// Fans a lookup across the ordered provider chain: first clean answer
/// wins, fallback-classified failures move on, the last failure
/// propagates. Trending has no fallback — each provider reports its own
/// list and any failure is the caller's.
pub struct MarketAggregator {
    providers: Vec<Arc<dyn MarketProvider>>,
}

impl MarketAggregator {
    pub fn new(providers: Vec<Arc<dyn MarketProvider>>) -> Self {
        Self { providers }
    }

    /// Normalized stats for one resolved coin. Fails only when every
    /// provider in the chain has failed; a CoinGecko-sourced record
    /// carries the ath fields, a CoinMarketCap-sourced one does not.
    pub async fn coin_stats(&self, id: &CoinId) -> Result<CoinStats> {
        let last = self.providers.len().saturating_sub(1);
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.lookup_by_id(id).await {
                Ok(stats) => return Ok(stats),
                Err(e) if e.triggers_fallback() && i < last => {
                    log::warn!(
                        "stats.fallback id={} provider={} error={e}",
                        id.id,
                        provider.kind().as_str()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!("no market data providers configured")
    }

    /// One "Name (SYMBOL)" list per provider, in chain order. No
    /// per-provider isolation: the first failure aborts the whole call.
    pub async fn trending(&self) -> Result<Vec<(ProviderKind, Vec<String>)>> {
        let mut lists = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let entries = provider.trending().await?;
            lists.push((provider.kind(), entries));
        }
        Ok(lists)
    }

    /// OHLC candles over the given day window, same fallback chain as
    /// stats.
    pub async fn chart(&self, id: &CoinId, days: &str) -> Result<Vec<Candle>> {
        let last = self.providers.len().saturating_sub(1);
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.ohlc(id, days).await {
                Ok(candles) => return Ok(candles),
                Err(e) if e.triggers_fallback() && i < last => {
                    log::warn!(
                        "chart.fallback id={} provider={} error={e}",
                        id.id,
                        provider.kind().as_str()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!("no market data providers configured")
    }
}
