use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use pe_dashboard::config::AppConfig;
use pe_dashboard::routes;
use pe_dashboard::services::yahoo::YahooClient;
use pe_dashboard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let source = YahooClient::new(&config).map_err(|e| anyhow::anyhow!(e))?;
    let state = Arc::new(AppState::new(&config, Arc::new(source)));
    info!(
        "Ticker cache ready (ttl {}s, default ticker {})",
        config.cache_ttl.as_secs(),
        config.default_ticker
    );

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "DELETE"]);

    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
