use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

use pe_dashboard::config::AppConfig;
use pe_dashboard::handlers::error::RETRY_HINT;
use pe_dashboard::services::dashboard::{build_dashboard, DashboardReport, DashboardRequest, Section};
use pe_dashboard::services::yahoo::YahooClient;
use pe_dashboard::state::AppState;

/// Print the P/E dashboard for one ticker to the terminal.
#[derive(Debug, Parser)]
#[command(name = "snapshot")]
struct Args {
    /// Ticker symbol, e.g. EVO.ST (defaults to $DEFAULT_TICKER)
    #[arg(short, long)]
    ticker: Option<String>,

    /// Manual P/E; 0 means unset
    #[arg(long, default_value_t = 0.0)]
    pe_override: f64,
}

fn print_report(report: &DashboardReport) {
    println!("Analysis: {} ({})", report.title, report.ticker);
    println!();
    println!("  Price      {}", report.display.price);
    println!("  P/E (now)  {}", report.display.trailing_pe);
    println!("  EPS        {}", report.display.eps);
    println!();

    match &report.trend {
        Section::Ready { data } => {
            println!("P/E trend over {} days", data.series.len());
            println!("  Average    {:.2}", data.mean);
            println!("  Current vs average  {}", report.display.deviation);
        }
        Section::Unavailable { message } => println!("{}", message),
    }
    println!();

    match &report.news {
        Section::Ready { data } => {
            println!("Latest news");
            for item in data {
                println!("  - {}", item.headline);
                println!("    {}", item.link);
            }
        }
        Section::Unavailable { message } => println!("{}", message),
    }
    println!();

    match &report.candles {
        Section::Ready { data } => {
            if let (Some(first), Some(last)) = (data.first(), data.last()) {
                println!(
                    "Price history: {} sessions, {} to {}, close {:.2} -> {:.2}",
                    data.len(),
                    first.timestamp.format("%Y-%m-%d"),
                    last.timestamp.format("%Y-%m-%d"),
                    first.close,
                    last.close
                );
            }
        }
        Section::Unavailable { message } => println!("{}", message),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = match YahooClient::new(&config) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let state = AppState::new(&config, Arc::new(source));

    let request = DashboardRequest {
        ticker: args.ticker.unwrap_or_else(|| config.default_ticker.clone()),
        pe_override: Some(args.pe_override),
        refresh: false,
    };
    info!("Building snapshot for {}", request.ticker);

    match build_dashboard(&state.cache, &state.settings, &request).await {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("A technical error occurred: {}", e);
            eprintln!("{}", RETRY_HINT);
            ExitCode::FAILURE
        }
    }
}
