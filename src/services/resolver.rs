// src/services/resolver.rs
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::models::{ManualOverride, PricePoint, QuoteSnapshot};

/// Which candidate supplied the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    CurrentPrice,
    RegularMarketPrice,
    LastClose,
    Unknown,
}

/// Which rule produced the effective P/E and EPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationSource {
    ManualOverride,
    SnapshotEps,
    DerivedFromPe,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
    At,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
            Direction::At => "at",
        }
    }
}

/// Current P/E relative to the one-year average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deviation {
    pub percent: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMetrics {
    /// 0.0 when `price_source` is `Unknown`.
    pub current_price: f64,
    pub price_source: PriceSource,
    pub trailing_pe: Option<f64>,
    pub eps: Option<f64>,
    pub valuation_source: ValuationSource,
    pub pe_series: Vec<PePoint>,
    pub pe_mean: Option<f64>,
    pub deviation: Option<Deviation>,
}

type SnapshotField = fn(&QuoteSnapshot) -> Option<f64>;

fn snapshot_current_price(snapshot: &QuoteSnapshot) -> Option<f64> {
    snapshot.current_price
}

fn snapshot_regular_market_price(snapshot: &QuoteSnapshot) -> Option<f64> {
    snapshot.regular_market_price
}

fn snapshot_trailing_eps(snapshot: &QuoteSnapshot) -> Option<f64> {
    snapshot.trailing_eps
}

fn snapshot_eps_trailing_twelve_months(snapshot: &QuoteSnapshot) -> Option<f64> {
    snapshot.eps_trailing_twelve_months
}

/// Snapshot price fields in precedence order. The last history close is
/// tried after these.
const PRICE_CANDIDATES: [(PriceSource, SnapshotField); 2] = [
    (PriceSource::CurrentPrice, snapshot_current_price),
    (PriceSource::RegularMarketPrice, snapshot_regular_market_price),
];

/// Snapshot EPS fields in precedence order.
const EPS_CANDIDATES: [SnapshotField; 2] = [snapshot_trailing_eps, snapshot_eps_trailing_twelve_months];

fn usable_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub fn resolve_current_price(snapshot: &QuoteSnapshot, history: &[PricePoint]) -> (f64, PriceSource) {
    let from_snapshot = PRICE_CANDIDATES
        .iter()
        .find_map(|(source, field)| usable_price(field(snapshot)).map(|price| (price, *source)));

    if let Some(found) = from_snapshot {
        return found;
    }

    match usable_price(history.last().map(|p| p.close)) {
        Some(close) => (close, PriceSource::LastClose),
        None => (0.0, PriceSource::Unknown),
    }
}

/// Returns `(trailing_pe, eps, source)`.
pub fn resolve_valuation(
    snapshot: &QuoteSnapshot,
    current_price: f64,
    manual: ManualOverride,
) -> (Option<f64>, Option<f64>, ValuationSource) {
    if let Some(pe) = manual.value() {
        return (Some(pe), Some(current_price / pe), ValuationSource::ManualOverride);
    }

    if let Some(eps) = EPS_CANDIDATES.iter().find_map(|field| present(field(snapshot))) {
        return (present(snapshot.trailing_pe), Some(eps), ValuationSource::SnapshotEps);
    }

    match present(snapshot.trailing_pe) {
        Some(pe) if pe > 0.0 => (Some(pe), Some(current_price / pe), ValuationSource::DerivedFromPe),
        _ => (None, None, ValuationSource::Unknown),
    }
}

/// Daily close divided by EPS. Empty unless EPS is positive and there is
/// history to divide.
pub fn historical_pe(history: &[PricePoint], eps: Option<f64>) -> Vec<PePoint> {
    match eps {
        Some(eps) if eps > 0.0 && !history.is_empty() => history
            .iter()
            .map(|p| PePoint {
                timestamp: p.timestamp,
                value: p.close / eps,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn series_mean(series: &[PePoint]) -> Option<f64> {
    if series.is_empty() {
        None
    } else {
        Some(series.iter().map(|p| p.value).sum::<f64>() / series.len() as f64)
    }
}

pub fn deviation(trailing_pe: Option<f64>, mean: Option<f64>) -> Option<Deviation> {
    let (pe, mean) = (trailing_pe?, mean?);
    if mean == 0.0 {
        return None;
    }

    let direction = if pe > mean {
        Direction::Above
    } else if pe < mean {
        Direction::Below
    } else {
        Direction::At
    };

    Some(Deviation {
        percent: (pe - mean) / mean * 100.0,
        direction,
    })
}

pub fn resolve_metrics(
    snapshot: &QuoteSnapshot,
    history: &[PricePoint],
    manual: ManualOverride,
) -> ResolvedMetrics {
    let (current_price, price_source) = resolve_current_price(snapshot, history);
    debug!("Current price {} resolved from {:?}", current_price, price_source);

    let (trailing_pe, eps, valuation_source) = resolve_valuation(snapshot, current_price, manual);
    debug!(
        "Valuation from {:?}: P/E {:?}, EPS {:?}",
        valuation_source, trailing_pe, eps
    );

    let pe_series = historical_pe(history, eps);
    if pe_series.is_empty() {
        warn!(
            "No P/E trend available (EPS {:?}, {} history points)",
            eps,
            history.len()
        );
    }
    let pe_mean = series_mean(&pe_series);

    ResolvedMetrics {
        current_price,
        price_source,
        trailing_pe,
        eps,
        valuation_source,
        deviation: deviation(trailing_pe, pe_mean),
        pe_series,
        pe_mean,
    }
}
