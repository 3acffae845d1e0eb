// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::cache::{evict_ticker, health};
use crate::handlers::dashboard::{get_dashboard, DashboardQuery};
use crate::handlers::error::ApiError;
use crate::state::AppState;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message: String;
    let mut hint = None;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
        hint = api_error.hint.clone();
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = e.to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    let body = match hint {
        Some(hint) => serde_json::json!({ "error": message, "hint": hint }),
        None => serde_json::json!({ "error": message }),
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let dashboard_route = warp::path!("api" / "v1" / "dashboard")
        .and(warp::get())
        .and(warp::query::<DashboardQuery>())
        .and(state_filter.clone())
        .and_then(get_dashboard);

    let evict_route = warp::path!("api" / "v1" / "cache" / String)
        .and(warp::delete())
        .and(state_filter.clone())
        .and_then(evict_ticker);

    let health_route = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(health);

    info!("All routes configured successfully.");

    dashboard_route
        .or(evict_route)
        .or(health_route)
        .recover(handle_rejection)
}
