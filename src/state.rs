// src/state.rs
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::cache::TickerCache;
use crate::services::dashboard::RenderSettings;
use crate::services::yahoo::MarketDataSource;

/// Shared by every request. Owned by the entry point.
pub struct AppState {
    pub cache: TickerCache,
    pub settings: RenderSettings,
    pub default_ticker: String,
}

impl AppState {
    pub fn new(config: &AppConfig, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            cache: TickerCache::new(source, config.cache_ttl),
            settings: RenderSettings {
                default_currency: config.default_currency.clone(),
                news_limit: config.news_limit,
            },
            default_ticker: config.default_ticker.clone(),
        }
    }
}
