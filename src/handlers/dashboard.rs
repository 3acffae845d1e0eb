// src/handlers/dashboard.rs
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::dashboard::{build_dashboard, DashboardRequest};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub ticker: Option<String>,
    pub pe_override: Option<f64>,
    pub refresh: Option<bool>,
}

impl DashboardQuery {
    fn into_request(self, default_ticker: &str) -> Result<DashboardRequest, ApiError> {
        let ticker = match self.ticker {
            Some(t) if !t.trim().is_empty() => t,
            _ => default_ticker.to_string(),
        };

        if let Some(pe) = self.pe_override {
            if !pe.is_finite() || pe < 0.0 {
                return Err(ApiError::bad_request("pe_override must be a non-negative number"));
            }
        }

        Ok(DashboardRequest {
            ticker,
            pe_override: self.pe_override,
            refresh: self.refresh.unwrap_or(false),
        })
    }
}

pub async fn get_dashboard(query: DashboardQuery, state: Arc<AppState>) -> Result<Json, Rejection> {
    let request = query
        .into_request(&state.default_ticker)
        .map_err(warp::reject::custom)?;
    info!("Handling dashboard request for {}", request.ticker);

    match build_dashboard(&state.cache, &state.settings, &request).await {
        Ok(report) => Ok(warp::reply::json(&report)),
        Err(e) => {
            error!("Dashboard for {} failed: {}", request.ticker, e);
            Err(warp::reject::custom(ApiError::render_failed(e.to_string())))
        }
    }
}
