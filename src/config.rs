// src/config.rs
use log::{info, warn};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::BoxError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub default_ticker: String,
    pub default_currency: String,
    pub cache_ttl: Duration,
    pub news_limit: usize,
    pub yahoo_base_url: String,
    pub yahoo_news_url: String,
    /// Page that hands out the session cookie the crumb is bound to.
    pub yahoo_cookie_url: String,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            default_ticker: "EVO.ST".to_string(),
            default_currency: "SEK".to_string(),
            cache_ttl: Duration::from_secs(60),
            news_limit: 5,
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            yahoo_news_url: "https://query2.finance.yahoo.com/v1/finance/search".to_string(),
            yahoo_cookie_url: "https://fc.yahoo.com".to_string(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Reads settings from the environment (and `.env` if the caller loaded
    /// it). Unset variables keep their defaults; set but unparsable ones are
    /// an error.
    pub fn from_env() -> Result<Self, BoxError> {
        let defaults = Self::default();

        let config = Self {
            port: parse_var("PORT", defaults.port)?,
            default_ticker: string_var("DEFAULT_TICKER", defaults.default_ticker),
            default_currency: string_var("DEFAULT_CURRENCY", defaults.default_currency),
            cache_ttl: Duration::from_secs(parse_var("CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?),
            news_limit: parse_var("NEWS_LIMIT", defaults.news_limit)?,
            yahoo_base_url: string_var("YAHOO_BASE_URL", defaults.yahoo_base_url),
            yahoo_news_url: string_var("YAHOO_NEWS_URL", defaults.yahoo_news_url),
            yahoo_cookie_url: string_var("YAHOO_COOKIE_URL", defaults.yahoo_cookie_url),
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())?),
        };

        info!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

fn string_var(name: &str, default: String) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            warn!("${} not set, defaulting to {}", name, default);
            default
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, BoxError>
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number, got {:?}", name, value).into()),
        Err(_) => {
            warn!("${} not set, defaulting to {}", name, default);
            Ok(default)
        }
    }
}
