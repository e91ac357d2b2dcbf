//! Price Alert Bot - Telegram Server
//!
//! Answers price and portfolio queries and fires one-shot price alerts.

mod config;
mod scheduler;

use clap::Parser;
use config::{bot_token_from_env, parse_digest_time, AppConfig, ConfigError};
use pricebot_alerts::{CommandHandler, DigestJob, MarketSummary, TelegramBot};
use pricebot_core::SymbolTable;
use pricebot_engine::{AlertEngine, FileSnapshotStore, Notifier, UserStore};
use pricebot_feeds::{FallbackPriceSource, PriceSource, DEFAULT_FETCH_TIMEOUT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Price Alert Bot CLI
#[derive(Parser, Debug)]
#[command(name = "price-alert-bot")]
#[command(about = "Telegram crypto price alert bot", long_about = None)]
struct Args {
    /// User data snapshot file
    #[arg(short, long, default_value = "user_data.json")]
    data_file: PathBuf,

    /// Seconds between alert sweeps
    #[arg(short, long, default_value_t = 120)]
    sweep_interval_secs: u64,

    /// Local time of the daily report (HH:MM)
    #[arg(long, default_value = "09:00")]
    digest_time: String,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    fetch_timeout_secs: u64,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

fn build_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let config = AppConfig {
        data_file: args.data_file.clone(),
        sweep_interval_secs: args.sweep_interval_secs,
        digest_time: parse_digest_time(&args.digest_time)?,
        fetch_timeout_secs: args.fetch_timeout_secs,
        log_level: args.log_level.clone(),
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    let token = match bot_token_from_env() {
        Ok(token) => token,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    info!("🚀 Price Alert Bot starting...");
    info!("  Sweep interval: {}s", config.sweep_interval_secs);
    info!("  Daily report: {}", config.digest_time.format("%H:%M"));

    let symbols = Arc::new(SymbolTable::default());
    info!("  Symbols: {}", symbols.codes());

    let source: Arc<dyn PriceSource> = match FallbackPriceSource::live(config.fetch_timeout()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return;
        }
    };

    let persistence = Arc::new(FileSnapshotStore::new(config.data_file.clone()));
    info!("  Data file: {}", persistence.path().display());
    let store = Arc::new(UserStore::load(symbols.clone(), persistence).await);

    let market = Arc::new(MarketSummary::new(
        symbols.clone(),
        source.clone(),
        config.watch_list.clone(),
    ));
    let handler = Arc::new(CommandHandler::new(
        symbols.clone(),
        source.clone(),
        store.clone(),
        market.clone(),
        config.digest_time,
    ));
    let bot = Arc::new(TelegramBot::new(&token, handler));
    let notifier: Arc<dyn Notifier> = Arc::new(bot.notifier());

    let engine = Arc::new(AlertEngine::new(
        symbols,
        source,
        store.clone(),
        notifier.clone(),
    ));
    let digest = Arc::new(DigestJob::new(market, store.clone(), notifier));

    let sweep_handle = scheduler::spawn_alert_sweep(engine, config.sweep_interval());
    let digest_handle = scheduler::spawn_daily_digest(digest, config.digest_time);
    let bot_handle = tokio::spawn(bot.run());

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");

    for handle in [sweep_handle, digest_handle, bot_handle] {
        handle.abort();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    store.persist().await;
    info!(users = store.user_count(), "👋 Price Alert Bot stopped");
}
