// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quote and fundamentals for one ticker as the provider reported them.
/// Every field may be missing depending on the instrument and endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    #[serde(rename = "currentPrice", default)]
    pub current_price: Option<f64>,
    #[serde(rename = "regularMarketPrice", default)]
    pub regular_market_price: Option<f64>,
    #[serde(rename = "trailingPE", default)]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "trailingEps", default)]
    pub trailing_eps: Option<f64>,
    #[serde(rename = "epsTrailingTwelveMonths", default)]
    pub eps_trailing_twelve_months: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "longName", default)]
    pub long_name: Option<String>,
}

/// One trading day of the price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Raw news record. Older responses carry flat fields, newer ones nest
/// most of them inside `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<NewsContent>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub provider: Option<NewsProvider>,
    #[serde(rename = "canonicalUrl", default)]
    pub canonical_url: Option<NewsUrl>,
    #[serde(rename = "clickThroughUrl", default)]
    pub click_through_url: Option<NewsUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsProvider {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsUrl {
    #[serde(default)]
    pub url: Option<String>,
}

/// Everything fetched for one ticker in a single pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerData {
    pub snapshot: QuoteSnapshot,
    pub history: Vec<PricePoint>,
    pub news: Vec<NewsItem>,
}

/// User supplied P/E. Zero or negative values mean "not provided".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualOverride(Option<f64>);

impl ManualOverride {
    pub fn new(value: Option<f64>) -> Self {
        ManualOverride(value)
    }

    pub fn none() -> Self {
        ManualOverride(None)
    }

    /// The override value, only if it is a usable positive number.
    pub fn value(&self) -> Option<f64> {
        self.0.filter(|v| v.is_finite() && *v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_accepts_both_eps_field_names() {
        let a: QuoteSnapshot = serde_json::from_str(r#"{"trailingEps": 4.5}"#).unwrap();
        let b: QuoteSnapshot =
            serde_json::from_str(r#"{"epsTrailingTwelveMonths": 4.5}"#).unwrap();
        assert_eq!(a.trailing_eps, Some(4.5));
        assert_eq!(b.eps_trailing_twelve_months, Some(4.5));
    }

    #[test]
    fn snapshot_with_both_eps_fields_keeps_each() {
        let both: QuoteSnapshot =
            serde_json::from_str(r#"{"trailingEps": 4.5, "epsTrailingTwelveMonths": 4.4}"#).unwrap();
        assert_eq!(both.trailing_eps, Some(4.5));
        assert_eq!(both.eps_trailing_twelve_months, Some(4.4));
    }

    #[test]
    fn news_item_reads_nested_content() {
        let json = r#"{
            "id": "abc",
            "content": {
                "title": "Nested title",
                "provider": { "displayName": "Reuters" },
                "canonicalUrl": { "url": "https://example.com/a" }
            }
        }"#;
        let item: NewsItem = serde_json::from_str(json).unwrap();
        assert!(item.title.is_none());
        let content = item.content.unwrap();
        assert_eq!(content.title.as_deref(), Some("Nested title"));
        assert_eq!(content.provider.unwrap().display_name.as_deref(), Some("Reuters"));
        assert_eq!(
            content.canonical_url.unwrap().url.as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn override_ignores_zero_and_negative() {
        assert_eq!(ManualOverride::new(Some(0.0)).value(), None);
        assert_eq!(ManualOverride::new(Some(-3.0)).value(), None);
        assert_eq!(ManualOverride::new(None).value(), None);
        assert_eq!(ManualOverride::new(Some(15.0)).value(), Some(15.0));
    }
}
