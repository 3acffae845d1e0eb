// src/services/yahoo.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use reqwest::header::REFERER;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::models::{NewsItem, PricePoint, QuoteSnapshot};
use crate::BoxError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const HISTORY_RANGE: &str = "1y";
const HISTORY_INTERVAL: &str = "1d";
const CRUMB_PATH: &str = "/v1/test/getcrumb";
const CRUMB_TTL_SECS: i64 = 3600;

/// Where quote, history and news come from.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, BoxError>;
    async fn fetch_history(&self, symbol: &str) -> Result<Vec<PricePoint>, BoxError>;
    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, BoxError>;
}

#[derive(Debug, Clone)]
struct Crumb {
    value: String,
    fetched_at: DateTime<Utc>,
}

/// Yahoo Finance client. The quote endpoint only answers requests that carry
/// a session cookie and the crumb token issued for it; the client keeps both
/// and renews them when Yahoo rejects them.
pub struct YahooClient {
    client: Client,
    base_url: String,
    news_url: String,
    cookie_url: String,
    news_count: usize,
    crumb: Mutex<Option<Crumb>>,
}

impl YahooClient {
    pub fn new(config: &AppConfig) -> Result<Self, BoxError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.clone(),
            news_url: config.yahoo_news_url.clone(),
            cookie_url: config.yahoo_cookie_url.clone(),
            news_count: config.news_limit,
            crumb: Mutex::new(None),
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| format!("Invalid Yahoo base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(&["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", HISTORY_RANGE)
            .append_pair("interval", HISTORY_INTERVAL);
        Ok(url)
    }

    fn quote_url(&self, symbol: &str, crumb: &str) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| format!("Invalid Yahoo base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(&["v7", "finance", "quote"]);
        url.query_pairs_mut()
            .append_pair("symbols", symbol)
            .append_pair("crumb", crumb);
        Ok(url)
    }

    fn news_url(&self, symbol: &str) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.news_url)?;
        url.query_pairs_mut()
            .append_pair("q", symbol)
            .append_pair("quotesCount", "0")
            .append_pair("newsCount", &self.news_count.to_string());
        Ok(url)
    }

    /// Crumb endpoints on the quote host first, then on the news host.
    fn crumb_urls(&self) -> Result<Vec<Url>, BoxError> {
        let mut urls = vec![Url::parse(&self.base_url)?.join(CRUMB_PATH)?];
        let alternate = Url::parse(&self.news_url)?.join(CRUMB_PATH)?;
        if !urls.contains(&alternate) {
            urls.push(alternate);
        }
        Ok(urls)
    }

    async fn fetch_text(&self, url: Url) -> Result<(StatusCode, String), BoxError> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        Ok((status, resp.text().await?))
    }

    async fn get_text(&self, url: Url) -> Result<String, BoxError> {
        let (status, body) = self.fetch_text(url.clone()).await?;
        if !status.is_success() {
            warn!("Yahoo returned status {} for {}", status, url);
            return Err(format!("Yahoo returned status {}", status).into());
        }
        Ok(body)
    }

    /// The cached crumb, or a fresh one when none is cached or it is older
    /// than an hour. The lock is held while refreshing so concurrent callers
    /// wait for one refresh.
    async fn crumb(&self) -> Result<String, BoxError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            if crumb.fetched_at > Utc::now() - Duration::seconds(CRUMB_TTL_SECS) {
                return Ok(crumb.value.clone());
            }
        }

        let value = self.refresh_crumb().await?;
        *cached = Some(Crumb {
            value: value.clone(),
            fetched_at: Utc::now(),
        });
        Ok(value)
    }

    async fn invalidate_crumb(&self) {
        *self.crumb.lock().await = None;
    }

    async fn refresh_crumb(&self) -> Result<String, BoxError> {
        info!("Refreshing Yahoo session cookie and crumb");
        // The cookie page answers 404 but still sets the session cookie.
        if let Err(e) = self
            .client
            .get(&self.cookie_url)
            .header(REFERER, "https://finance.yahoo.com/")
            .send()
            .await
        {
            warn!("Cookie request to {} failed: {}", self.cookie_url, e);
        }

        let mut last_error: BoxError = "No crumb endpoint answered".into();
        for url in self.crumb_urls()? {
            match self.fetch_text(url.clone()).await {
                Ok((status, body)) if status.is_success() => match parse_crumb(&body) {
                    Some(crumb) => {
                        debug!("Got crumb from {}", url);
                        return Ok(crumb);
                    }
                    None => last_error = format!("Unusable crumb from {}", url).into(),
                },
                Ok((status, _)) => last_error = format!("Crumb request to {} returned status {}", url, status).into(),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Quote snapshot through the crumb-protected endpoint. A rejected crumb
    /// is renewed once before giving up.
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot, BoxError> {
        for _ in 0..2 {
            let crumb = self.crumb().await?;
            let (status, body) = self.fetch_text(self.quote_url(symbol, &crumb)?).await?;
            if is_auth_failure(status, &body) {
                warn!("Yahoo rejected the crumb for {} with status {}", symbol, status);
                self.invalidate_crumb().await;
                continue;
            }
            if !status.is_success() {
                return Err(format!("Yahoo returned status {}", status).into());
            }
            return parse_quote_response(&body);
        }
        Err("Yahoo rejected a freshly issued crumb".into())
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    /// Falls back to the chart metadata (price, currency, name, no
    /// fundamentals) when the quote endpoint cannot be used.
    async fn fetch_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, BoxError> {
        info!("Fetching quote snapshot for {}", symbol);
        match self.fetch_quote(symbol).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Quote endpoint failed for {}: {}. Using chart metadata", symbol, e);
                let body = self.get_text(self.chart_url(symbol)?).await?;
                parse_chart_meta(&body)
            }
        }
    }

    async fn fetch_history(&self, symbol: &str) -> Result<Vec<PricePoint>, BoxError> {
        info!("Fetching {} daily history for {}", HISTORY_RANGE, symbol);
        let body = self.get_text(self.chart_url(symbol)?).await?;
        let history = parse_chart_response(&body)?;
        info!("Found {} history points for {}", history.len(), symbol);
        Ok(history)
    }

    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, BoxError> {
        info!("Fetching news for {}", symbol);
        let body = self.get_text(self.news_url(symbol)?).await?;
        parse_news_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Option<Vec<QuoteSnapshot>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(rename = "longName", default)]
    long_name: Option<String>,
    #[serde(rename = "shortName", default)]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    news: Vec<NewsItem>,
}

fn api_error(kind: &str, error: Option<serde_json::Value>) -> Result<(), BoxError> {
    match error {
        Some(err) if !err.is_null() => Err(format!("Yahoo {} error: {}", kind, err).into()),
        _ => Ok(()),
    }
}

/// First quote of a `/v7/finance/quote` body. An empty result is a snapshot
/// with every field missing, not an error.
pub fn parse_quote_response(body: &str) -> Result<QuoteSnapshot, BoxError> {
    let envelope: QuoteEnvelope = serde_json::from_str(body)?;
    api_error("quote", envelope.quote_response.error)?;

    Ok(envelope
        .quote_response
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default())
}

/// Daily OHLC rows of a `/v8/finance/chart` body, oldest first. Rows with a
/// missing price are dropped.
pub fn parse_chart_response(body: &str) -> Result<Vec<PricePoint>, BoxError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    api_error("chart", envelope.chart.error)?;

    let result = match envelope.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => return Ok(Vec::new()),
    };
    let (timestamps, quote) = match (result.timestamp, result.indicators.quote.into_iter().next()) {
        (Some(ts), Some(quote)) => (ts, quote),
        _ => return Ok(Vec::new()),
    };

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let timestamp = match DateTime::<Utc>::from_timestamp(ts, 0) {
            Some(t) => t,
            None => continue,
        };
        if let (Some(Some(open)), Some(Some(high)), Some(Some(low)), Some(Some(close))) = (
            quote.open.get(i),
            quote.high.get(i),
            quote.low.get(i),
            quote.close.get(i),
        ) {
            points.push(PricePoint {
                timestamp,
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: quote.volume.get(i).copied().flatten(),
            });
        }
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

/// Snapshot built from the `meta` block of a chart body: price, currency and
/// name only.
pub fn parse_chart_meta(body: &str) -> Result<QuoteSnapshot, BoxError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    api_error("chart", envelope.chart.error)?;

    let meta = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.meta)
        .unwrap_or_default();
    Ok(QuoteSnapshot {
        regular_market_price: meta.regular_market_price,
        currency: meta.currency,
        long_name: meta.long_name.or(meta.short_name),
        ..Default::default()
    })
}

/// A crumb is a short token. HTML pages, rate-limit messages and anything
/// with whitespace are rejected.
pub fn parse_crumb(body: &str) -> Option<String> {
    let crumb = body.trim();
    if crumb.is_empty() || crumb.len() >= 100 || crumb.starts_with('<') || crumb.contains(char::is_whitespace) {
        return None;
    }
    Some(crumb.to_string())
}

/// Whether Yahoo refused the request because of the cookie or crumb.
pub fn is_auth_failure(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("Invalid Crumb")
        || body.contains("Invalid Cookie")
}

pub fn parse_news_response(body: &str) -> Result<Vec<NewsItem>, BoxError> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    Ok(envelope.news)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use warp::Filter;

    const QUOTE_BODY: &str = r#"{
        "quoteResponse": {
            "result": [{
                "symbol": "EVO.ST",
                "regularMarketPrice": 1225.5,
                "trailingPE": 14.2,
                "epsTrailingTwelveMonths": 86.3,
                "currency": "SEK",
                "longName": "Evolution AB (publ)"
            }],
            "error": null
        }
    }"#;

    const INVALID_CRUMB_BODY: &str =
        r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#;

    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "SEK",
                    "symbol": "EVO.ST",
                    "regularMarketPrice": 1230.0,
                    "longName": "Evolution AB (publ)"
                },
                "timestamp": [1704182400, 1704268800, 1704355200],
                "indicators": {
                    "quote": [{
                        "open":   [1200.0, 1210.0, null],
                        "high":   [1220.0, 1230.0, 1240.0],
                        "low":    [1190.0, 1200.0, 1205.0],
                        "close":  [1215.0, 1225.5, 1230.0],
                        "volume": [1000, null, 3000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    /// Counts requests made to a local stand-in for the Yahoo hosts.
    #[derive(Default)]
    struct Hits {
        crumb: AtomicUsize,
        quote: AtomicUsize,
    }

    /// Serves cookie, crumb, quote and chart endpoints on an ephemeral port.
    /// The quote endpoint answers 401 "Invalid Crumb" unless `accept_crumb`.
    fn spawn_provider(accept_crumb: bool) -> (AppConfig, Arc<Hits>) {
        let hits = Arc::new(Hits::default());

        let crumb_hits = hits.clone();
        let getcrumb = warp::path!("v1" / "test" / "getcrumb").map(move || {
            let n = crumb_hits.crumb.fetch_add(1, Ordering::SeqCst);
            format!("crumb{}", n)
        });
        let cookie = warp::path!("cookie")
            .map(|| warp::reply::with_header("", "set-cookie", "A3=session; Path=/"));
        let quote_hits = hits.clone();
        let quote = warp::path!("v7" / "finance" / "quote")
            .and(warp::query::<HashMap<String, String>>())
            .map(move |params: HashMap<String, String>| {
                quote_hits.quote.fetch_add(1, Ordering::SeqCst);
                let valid = params.get("crumb").map_or(false, |c| c.starts_with("crumb"));
                if accept_crumb && valid {
                    warp::reply::with_status(QUOTE_BODY.to_string(), StatusCode::OK)
                } else {
                    warp::reply::with_status(INVALID_CRUMB_BODY.to_string(), StatusCode::UNAUTHORIZED)
                }
            });
        let chart = warp::path!("v8" / "finance" / "chart" / String).map(|_symbol: String| CHART_BODY);

        let (addr, server) = warp::serve(getcrumb.or(cookie).or(quote).or(chart)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let config = AppConfig {
            yahoo_base_url: format!("http://{}", addr),
            yahoo_news_url: format!("http://{}/v1/finance/search", addr),
            yahoo_cookie_url: format!("http://{}/cookie", addr),
            ..AppConfig::default()
        };
        (config, hits)
    }

    #[tokio::test]
    async fn quote_request_carries_crumb() {
        let (config, hits) = spawn_provider(true);
        let client = YahooClient::new(&config).unwrap();

        let snapshot = client.fetch_snapshot("EVO.ST").await.unwrap();
        assert_eq!(snapshot.trailing_pe, Some(14.2));
        client.fetch_snapshot("EVO.ST").await.unwrap();

        assert_eq!(hits.crumb.load(Ordering::SeqCst), 1);
        assert_eq!(hits.quote.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_crumb_is_renewed_once_then_chart_meta_is_used() {
        let (config, hits) = spawn_provider(false);
        let client = YahooClient::new(&config).unwrap();

        let snapshot = client.fetch_snapshot("EVO.ST").await.unwrap();

        assert_eq!(hits.quote.load(Ordering::SeqCst), 2);
        assert_eq!(hits.crumb.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.regular_market_price, Some(1230.0));
        assert_eq!(snapshot.currency.as_deref(), Some("SEK"));
        assert_eq!(snapshot.long_name.as_deref(), Some("Evolution AB (publ)"));
        assert_eq!(snapshot.trailing_pe, None);
    }

    #[test]
    fn invalid_crumb_is_an_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED, ""));
        assert!(is_auth_failure(StatusCode::OK, INVALID_CRUMB_BODY));
        assert!(!is_auth_failure(StatusCode::OK, QUOTE_BODY));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND, "Not Found"));
    }

    #[test]
    fn crumb_must_be_a_short_token() {
        assert_eq!(parse_crumb(" abc/DEF.12\n").as_deref(), Some("abc/DEF.12"));
        assert_eq!(parse_crumb("<!DOCTYPE html><html>"), None);
        assert_eq!(parse_crumb("Too Many Requests"), None);
        assert_eq!(parse_crumb(""), None);
        assert_eq!(parse_crumb(&"x".repeat(120)), None);
    }

    #[test]
    fn chart_meta_becomes_snapshot() {
        let snapshot = parse_chart_meta(CHART_BODY).unwrap();
        assert_eq!(snapshot.regular_market_price, Some(1230.0));
        assert_eq!(snapshot.currency.as_deref(), Some("SEK"));
        assert_eq!(snapshot.current_price, None);
        assert_eq!(snapshot.trailing_eps, None);

        let empty = r#"{ "chart": { "result": [], "error": null } }"#;
        assert_eq!(parse_chart_meta(empty).unwrap(), QuoteSnapshot::default());
    }

    #[test]
    fn parses_quote_snapshot() {
        let snapshot = parse_quote_response(QUOTE_BODY).unwrap();
        assert_eq!(snapshot.current_price, None);
        assert_eq!(snapshot.regular_market_price, Some(1225.5));
        assert_eq!(snapshot.trailing_pe, Some(14.2));
        assert_eq!(snapshot.trailing_eps, None);
        assert_eq!(snapshot.eps_trailing_twelve_months, Some(86.3));
        assert_eq!(snapshot.currency.as_deref(), Some("SEK"));
        assert_eq!(snapshot.long_name.as_deref(), Some("Evolution AB (publ)"));
    }

    #[test]
    fn empty_quote_result_is_blank_snapshot() {
        let body = r#"{ "quoteResponse": { "result": [], "error": null } }"#;
        assert_eq!(parse_quote_response(body).unwrap(), QuoteSnapshot::default());
    }

    #[test]
    fn quote_api_error_is_reported() {
        let body = r#"{ "quoteResponse": { "result": null, "error": { "code": "Unauthorized" } } }"#;
        assert!(parse_quote_response(body).is_err());
    }

    #[test]
    fn chart_rows_with_gaps_are_dropped() {
        let history = parse_chart_response(CHART_BODY).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].close, 1215.0);
        assert_eq!(history[0].volume, Some(1000));
        assert_eq!(history[1].close, 1225.5);
        assert_eq!(history[1].volume, None);
        assert!(history[0].timestamp < history[1].timestamp);
    }

    #[test]
    fn chart_without_timestamps_is_empty() {
        let body = r#"{
            "chart": {
                "result": [{ "indicators": { "quote": [{}] } }],
                "error": null
            }
        }"#;
        assert!(parse_chart_response(body).unwrap().is_empty());
    }

    #[test]
    fn chart_api_error_is_reported() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;
        let err = parse_chart_response(body).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_chart_response("<html>").is_err());
        assert!(parse_news_response("not json").is_err());
    }

    #[test]
    fn parses_news_list() {
        let body = r#"{
            "quotes": [],
            "news": [
                { "uuid": "1", "title": "Flat", "publisher": "Reuters", "link": "https://example.com/1" },
                { "id": "2", "content": { "title": "Nested", "provider": { "displayName": "Di" } } }
            ]
        }"#;
        let news = parse_news_response(body).unwrap();
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].publisher.as_deref(), Some("Reuters"));
        assert_eq!(
            news[1].content.as_ref().and_then(|c| c.title.as_deref()),
            Some("Nested")
        );
    }

    #[test]
    fn chart_url_puts_symbol_in_path() {
        let client = YahooClient::new(&AppConfig::default()).unwrap();
        let url = client.chart_url("EVO.ST").unwrap();
        assert!(url
            .as_str()
            .starts_with("https://query1.finance.yahoo.com/v8/finance/chart/EVO.ST?"));
        assert!(url.as_str().contains("range=1y"));
        assert!(url.as_str().contains("interval=1d"));
    }

    #[test]
    fn crumb_endpoints_cover_both_hosts() {
        let client = YahooClient::new(&AppConfig::default()).unwrap();
        let urls: Vec<String> = client.crumb_urls().unwrap().iter().map(|u| u.to_string()).collect();
        assert_eq!(
            urls,
            vec![
                "https://query1.finance.yahoo.com/v1/test/getcrumb",
                "https://query2.finance.yahoo.com/v1/test/getcrumb",
            ]
        );
        let quote = client.quote_url("EVO.ST", "abc").unwrap();
        assert!(quote.as_str().ends_with("symbols=EVO.ST&crumb=abc"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn fetches_live_history() {
        let client = YahooClient::new(&AppConfig::default()).unwrap();
        let history = client.fetch_history("AAPL").await.unwrap();
        assert!(!history.is_empty());
    }
}
