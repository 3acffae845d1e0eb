// src/services/format.rs
use serde::Serialize;

use super::resolver::{PriceSource, ResolvedMetrics};

pub const NOT_AVAILABLE: &str = "N/A";

pub fn two_decimals(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn signed_percent(value: f64) -> String {
    format!("{:+.1}%", value)
}

/// Resolved metrics as the presentation layer shows them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMetrics {
    pub price: String,
    pub trailing_pe: String,
    pub eps: String,
    pub pe_mean: String,
    pub deviation: String,
}

pub fn display_metrics(metrics: &ResolvedMetrics, currency: &str) -> DisplayMetrics {
    let price = match metrics.price_source {
        PriceSource::Unknown => NOT_AVAILABLE.to_string(),
        _ => format!("{:.2} {}", metrics.current_price, currency),
    };

    let deviation = match metrics.deviation {
        Some(d) => format!("{} {}", signed_percent(d.percent), d.direction.label()),
        None => NOT_AVAILABLE.to_string(),
    };

    DisplayMetrics {
        price,
        trailing_pe: two_decimals(metrics.trailing_pe),
        eps: two_decimals(metrics.eps),
        pe_mean: two_decimals(metrics.pe_mean),
        deviation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManualOverride, QuoteSnapshot};
    use crate::services::resolver::resolve_metrics;

    #[test]
    fn formats_two_decimals_or_placeholder() {
        assert_eq!(two_decimals(Some(18.0)), "18.00");
        assert_eq!(two_decimals(Some(4.567)), "4.57");
        assert_eq!(two_decimals(None), "N/A");
        assert_eq!(two_decimals(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn signed_percent_keeps_sign() {
        assert_eq!(signed_percent(11.111), "+11.1%");
        assert_eq!(signed_percent(-4.26), "-4.3%");
    }

    #[test]
    fn unknown_metrics_display_placeholders() {
        let metrics = resolve_metrics(&QuoteSnapshot::default(), &[], ManualOverride::none());
        let shown = display_metrics(&metrics, "SEK");
        assert_eq!(shown.price, "N/A");
        assert_eq!(shown.trailing_pe, "N/A");
        assert_eq!(shown.eps, "N/A");
        assert_eq!(shown.pe_mean, "N/A");
        assert_eq!(shown.deviation, "N/A");
    }

    #[test]
    fn price_carries_currency() {
        let snapshot = QuoteSnapshot {
            current_price: Some(1234.5),
            trailing_eps: Some(61.726),
            trailing_pe: Some(20.0),
            ..Default::default()
        };
        let metrics = resolve_metrics(&snapshot, &[], ManualOverride::none());
        let shown = display_metrics(&metrics, "SEK");
        assert_eq!(shown.price, "1234.50 SEK");
        assert_eq!(shown.trailing_pe, "20.00");
        assert_eq!(shown.eps, "61.73");
    }
}
