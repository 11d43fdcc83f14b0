use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which upstream a coin identifier belongs to. The two id namespaces are
/// disjoint ("bitcoin" vs "1") and never reconciled across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    CoinGecko,
    CoinMarketCap,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoinGecko => "coingecko",
            Self::CoinMarketCap => "coinmarketcap",
        }
    }
}

/// Provider-specific coin identifier plus the display name it resolved with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinId {
    pub source: ProviderKind,
    pub id: String,
    pub name: String,
}

/// Provider-agnostic stats record. The three percent-change fields are
/// always present (0 when the source omits them, which also maps a
/// legitimate 0% to 0). The ath fields are only filled by CoinGecko.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinStats {
    pub name: String,
    pub symbol: String,
    pub website: String,
    pub explorers: Vec<String>,
    pub price: String,
    pub ath: Option<String>,
    pub market_cap_rank: Option<u32>,
    pub market_cap: String,
    pub volume: String,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub percent_change_30d: f64,
    pub percent_change_ath: Option<f64>,
}

/// One OHLC candle, timestamp in unix milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} response shape unexpected: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} has no data for {id}")]
    NotFound { provider: &'static str, id: String },
}

impl ProviderError {
    /// Whether the next provider in the chain should be tried. Everything
    /// short of a clean answer falls through, matching the source's broad
    /// except arms (transport, HTTP status, index-out-of-range).
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::Decode { .. } | Self::NotFound { .. }
        )
    }
}

/// One market-data upstream. Implementations wrap their API's native JSON
/// shapes and normalize into the types above; callers iterate an ordered
/// list of these until one succeeds.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// All coins whose ticker symbol matches (case-insensitive). Empty is
    /// a valid "not found" outcome, not an error.
    async fn lookup_by_symbol(&self, symbol: &str) -> Result<Vec<CoinId>, ProviderError>;

    /// Detailed stats for one coin id in this provider's namespace.
    async fn lookup_by_id(&self, id: &CoinId) -> Result<CoinStats, ProviderError>;

    /// Current notable coins as human-readable "Name (SYMBOL)" entries.
    async fn trending(&self) -> Result<Vec<String>, ProviderError>;

    /// OHLC candles over a day window ("1", "7", ..., "max").
    async fn ohlc(&self, id: &CoinId, days: &str) -> Result<Vec<Candle>, ProviderError>;
}
