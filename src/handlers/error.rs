// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

pub const RETRY_HINT: &str =
    "Try reloading the page or wait a minute so the market-data provider can respond.";

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub hint: Option<String>,
    pub status: StatusCode,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            hint: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A failed render pass: the user can only retry.
    pub fn render_failed(message: impl Into<String>) -> Self {
        ApiError {
            message: format!("A technical error occurred: {}", message.into()),
            hint: Some(RETRY_HINT.to_string()),
            status: StatusCode::BAD_GATEWAY,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            hint: None,
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
