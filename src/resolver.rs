use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::providers::{CoinId, MarketProvider};

/// Process-wide symbol→id memo. Only exactly-one-match resolutions are
/// stored, so ambiguous symbols are re-resolved every time. Unbounded and
/// never invalidated; entries live for the process lifetime. Two tasks
/// resolving the same new symbol may both write — worst case is a
/// redundant write of the same value.
#[derive(Clone, Default)]
pub struct ResolutionCache {
    inner: Arc<RwLock<HashMap<String, CoinId>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<CoinId> {
        self.inner.read().get(symbol).cloned()
    }

    pub fn put(&self, symbol: &str, id: CoinId) {
        self.inner.write().insert(symbol.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Maps a ticker symbol to provider-specific coin identifiers. Providers
/// are tried in order; a fallback-classified failure moves to the next,
/// a failure from the last provider propagates to the caller.
pub struct SymbolResolver {
    providers: Vec<Arc<dyn MarketProvider>>,
    cache: ResolutionCache,
}

impl SymbolResolver {
    pub fn new(providers: Vec<Arc<dyn MarketProvider>>) -> Self {
        Self::with_cache(providers, ResolutionCache::new())
    }

    pub fn with_cache(providers: Vec<Arc<dyn MarketProvider>>, cache: ResolutionCache) -> Self {
        Self { providers, cache }
    }

    /// All ids matching the symbol. Empty means "not found" and is a
    /// valid outcome, not an error. An empty primary result does not
    /// trigger the fallback; only a failed call does.
    pub async fn resolve(&self, symbol: &str) -> Result<Vec<CoinId>> {
        let symbol = symbol.to_uppercase();
        if let Some(hit) = self.cache.get(&symbol) {
            log::debug!("resolver.cache_hit symbol={symbol} id={}", hit.id);
            return Ok(vec![hit]);
        }

        let mut ids = Vec::new();
        let last = self.providers.len().saturating_sub(1);
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.lookup_by_symbol(&symbol).await {
                Ok(found) => {
                    ids = found;
                    break;
                }
                Err(e) if e.triggers_fallback() && i < last => {
                    log::warn!(
                        "resolver.fallback symbol={symbol} provider={} error={e}",
                        provider.kind().as_str()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        if ids.len() == 1 {
            self.cache.put(&symbol, ids[0].clone());
        }
        Ok(ids)
    }
}
