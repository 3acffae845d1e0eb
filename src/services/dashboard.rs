// src/services/dashboard.rs
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use super::cache::{normalize_symbol, TickerCache};
use super::format::{display_metrics, DisplayMetrics};
use super::news::{extract_news, DisplayNews};
use super::resolver::{resolve_metrics, Deviation, PePoint, ResolvedMetrics};
use crate::models::{ManualOverride, PricePoint, TickerData};
use crate::BoxError;

pub const TREND_UNAVAILABLE: &str = "P/E trend unavailable: no positive EPS or no price history.";
pub const NEWS_UNAVAILABLE: &str = "No news found right now.";
pub const CANDLES_UNAVAILABLE: &str = "No price history available for the last year.";

/// A dashboard section that either has data or a placeholder message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    Unavailable { message: String },
}

impl<T> Section<T> {
    fn unavailable(message: &str) -> Self {
        Section::Unavailable {
            message: message.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeTrend {
    pub series: Vec<PePoint>,
    pub mean: f64,
    pub deviation: Option<Deviation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub ticker: String,
    pub title: String,
    pub currency: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: ResolvedMetrics,
    pub display: DisplayMetrics,
    pub trend: Section<PeTrend>,
    pub news: Section<Vec<DisplayNews>>,
    pub candles: Section<Vec<PricePoint>>,
}

/// Presentation defaults applied to every pass.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub default_currency: String,
    pub news_limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardRequest {
    pub ticker: String,
    pub pe_override: Option<f64>,
    pub refresh: bool,
}

/// Builds the report from already fetched data. Never fails: missing fields
/// and empty datasets turn into placeholders.
pub fn render(ticker: &str, data: &TickerData, manual: ManualOverride, settings: &RenderSettings) -> DashboardReport {
    let metrics = resolve_metrics(&data.snapshot, &data.history, manual);

    let currency = data
        .snapshot
        .currency
        .clone()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| settings.default_currency.clone());
    let title = data
        .snapshot
        .long_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ticker.to_string());

    let trend = match metrics.pe_mean {
        Some(mean) if !metrics.pe_series.is_empty() => Section::Ready {
            data: PeTrend {
                series: metrics.pe_series.clone(),
                mean,
                deviation: metrics.deviation,
            },
        },
        _ => Section::unavailable(TREND_UNAVAILABLE),
    };

    let news = if data.news.is_empty() {
        Section::unavailable(NEWS_UNAVAILABLE)
    } else {
        Section::Ready {
            data: extract_news(&data.news, settings.news_limit),
        }
    };

    let candles = if data.history.is_empty() {
        Section::unavailable(CANDLES_UNAVAILABLE)
    } else {
        Section::Ready {
            data: data.history.clone(),
        }
    };

    DashboardReport {
        ticker: ticker.to_string(),
        title,
        display: display_metrics(&metrics, &currency),
        currency,
        generated_at: Utc::now(),
        metrics,
        trend,
        news,
        candles,
    }
}

/// One render pass: look up (or fetch) the ticker, then resolve and
/// assemble the report.
pub async fn build_dashboard(
    cache: &TickerCache,
    settings: &RenderSettings,
    request: &DashboardRequest,
) -> Result<DashboardReport, BoxError> {
    let ticker = normalize_symbol(&request.ticker);
    let data = cache.get(&ticker, request.refresh).await?;
    let report = render(&ticker, &data, ManualOverride::new(request.pe_override), settings);

    info!(
        "Rendered dashboard for {}: price {}, P/E {}, EPS {}",
        ticker, report.display.price, report.display.trailing_pe, report.display.eps
    );
    Ok(report)
}
