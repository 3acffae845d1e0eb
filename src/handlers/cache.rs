// src/handlers/cache.rs
use log::info;
use serde_json::json;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::state::AppState;

pub async fn evict_ticker(ticker: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    info!("Handling request to evict {} from cache", ticker);
    let evicted = state.cache.invalidate(&ticker).await;
    Ok(warp::reply::json(&json!({
        "ticker": ticker,
        "evicted": evicted,
    })))
}

pub async fn health(state: Arc<AppState>) -> Result<Json, Rejection> {
    let purged = state.cache.purge_expired().await;
    if purged > 0 {
        info!("Purged {} expired cache entries", purged);
    }
    Ok(warp::reply::json(&json!({
        "status": "ok",
        "cached_tickers": state.cache.len().await,
    })))
}
