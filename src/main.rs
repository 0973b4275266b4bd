mod batch;
mod config;
mod delivery;
mod error;
mod feed;
mod indicator;
mod jobs;
mod model;
mod notifier;
mod pipeline;
mod render;
mod server;
mod service;
mod storage;
mod strategy;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use delivery::DeliveryPolicy;
use feed::FeedRequest;
use feed::tradingview::TradingViewFeed;
use indicator::IndicatorLayout;
use notifier::Notifier;
use notifier::line::LineNotifier;
use notifier::terminal::TerminalNotifier;
use pipeline::{CurrencyTable, Pipeline};
use render::CardRenderer;
use server::AppState;
use service::{Presentation, SignalService};
use storage::sqlite::SqliteSettings;
use storage::{ALERT_COUNT_KEY, SettingsProvider, StaticSettings};
use strategy::SignalThresholds;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("scan error")]
    Scan,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "overtrade-notifier", about = "Forex RSI signal bot for LINE")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
    /// Run the webhook server and the periodic jobs until Ctrl+C
    #[default]
    Serve,
    /// Run one extraction cycle and log the records without sending anything
    Scan,
    /// Store the alert-count threshold in the settings database
    SetAlertCount {
        /// Extreme timeframes a pair needs before it raises an alert
        #[arg(value_parser = clap::value_parser!(u32).range(1..=8))]
        value: u32,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    match cli.command.unwrap_or_default() {
        Command::SetAlertCount { value } => set_alert_count(&config, value).await,
        Command::Scan => scan(&build_service(&config).await?).await,
        Command::Serve => serve(&config, Arc::new(build_service(&config).await?)).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn set_alert_count(config: &AppConfig, value: u32) -> Result<(), Report<AppError>> {
    let path = config
        .storage
        .settings_db
        .as_deref()
        .ok_or_else(|| Report::new(AppError::Config))
        .attach("storage.settings_db is not configured")?;

    let settings = SqliteSettings::open(Path::new(path))
        .await
        .change_context(AppError::Storage)?;
    settings
        .set_number(ALERT_COUNT_KEY, f64::from(value))
        .await
        .change_context(AppError::Storage)?;

    info!(path, key = ALERT_COUNT_KEY, value, "alert count stored");
    Ok(())
}

async fn build_service(config: &AppConfig) -> Result<SignalService, Report<AppError>> {
    // ── Settings store ────────────────────────────────────────────────────────
    let settings: Arc<dyn SettingsProvider> = match &config.storage.settings_db {
        Some(path) => Arc::new(
            SqliteSettings::open(Path::new(path))
                .await
                .change_context(AppError::Storage)?,
        ),
        None => Arc::new(StaticSettings::default()),
    };

    // ── Feed ──────────────────────────────────────────────────────────────────
    let rate = config
        .feed
        .rate()
        .ok_or_else(|| Report::new(AppError::Config))
        .attach("feed.requests_per_minute must be at least 1")?;
    let feed = Arc::new(TradingViewFeed::new(
        config.feed.url.clone(),
        config.feed.token.clone(),
        rate,
    ));

    // ── Transport ─────────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match &config.line.channel_access_token {
        Some(token) => Arc::new(LineNotifier::new(
            config.line.api_base.clone(),
            token.clone(),
            config.line.timeout(),
        )),
        None => {
            warn!("no channel access token configured; messages are logged only");
            Arc::new(TerminalNotifier)
        }
    };

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let layout = IndicatorLayout::new(config.market.timeframes());
    let request = FeedRequest::new(&config.market.prefix, &config.market.pairs, &layout);
    let pipeline = Pipeline::new(
        layout,
        SignalThresholds::from_config(&config.signal),
        CurrencyTable::new(config.market.prefix.clone(), config.market.currencies.clone()),
    );

    let batch_size = config
        .signal
        .batch_size()
        .ok_or_else(|| Report::new(AppError::Config))
        .attach("signal.max_items must be at least 1")?;
    let utc_offset = config
        .general
        .utc_offset()
        .ok_or_else(|| Report::new(AppError::Config))
        .attach("general.utc_offset_hours out of range")?;

    let presentation = Presentation {
        renderer: CardRenderer::new(config.render.icon_up.clone(), config.render.icon_down.clone()),
        policy: DeliveryPolicy {
            fallback_text: config.line.fallback_text.clone(),
            push_timeout: config.line.timeout(),
        },
        batch_size,
        utc_offset,
        alert_recipient: config.line.alert_recipient.clone(),
    };

    Ok(SignalService::new(
        feed,
        notifier,
        settings,
        pipeline,
        request,
        presentation,
    ))
}

async fn scan(service: &SignalService) -> Result<(), Report<AppError>> {
    let records = service.scan().await.change_context(AppError::Scan)?;
    if records.is_empty() {
        info!("no pair crossed a threshold");
    }

    for record in records.values() {
        info!(
            pair = %record.pair,
            timeframe = %record.timeframe,
            rsi = %record.rsi_value,
            zone = ?record.zone,
            trend = %record.trend,
            "signal"
        );
    }
    info!(records = records.len(), "scan complete");
    Ok(())
}

async fn serve(config: &AppConfig, service: Arc<SignalService>) -> Result<(), Report<AppError>> {
    let cancel = CancellationToken::new();
    let mut task_handles = Vec::new();

    // ── Periodic jobs ─────────────────────────────────────────────────────────
    if !config.jobs.alert_enabled {
        info!("alert job disabled");
    } else if config.line.alert_recipient.is_none() {
        warn!("no alert recipient configured; alert job not started");
    } else {
        let service = Arc::clone(&service);
        task_handles.push(jobs::spawn_periodic(
            "alert",
            Duration::from_secs(config.jobs.alert_interval_secs),
            cancel.clone(),
            move || {
                let service = Arc::clone(&service);
                async move { service.run_alert_cycle().await.map(|_| ()) }
            },
        ));
    }

    if let Some(url) = &config.jobs.keep_alive_url {
        let client = reqwest::Client::new();
        let url = url.clone();
        task_handles.push(jobs::spawn_periodic(
            "keep-alive",
            Duration::from_secs(config.jobs.keep_alive_interval_secs),
            cancel.clone(),
            move || {
                let client = client.clone();
                let url = url.clone();
                async move { jobs::keep_alive(&client, &url).await }
            },
        ));
    }

    // ── Webhook server ────────────────────────────────────────────────────────
    // Joined without a timeout: `serve` bounds its own drain of in-flight events.
    let bind = config.server.bind.clone();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        let state = AppState::new(service);
        if let Err(e) = server::serve(&bind, state, server_cancel.clone()).await {
            tracing::error!(error = ?e, "webhook server failed");
            server_cancel.cancel();
        }
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    let signal = wait_for_shutdown(tokio::signal::ctrl_c(), &cancel).await;

    for handle in task_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = server_handle.await;

    match signal {
        Some(result) => {
            result.change_context(AppError::Runtime)?;
            info!("ctrl+c received");
        }
        None => warn!("a core task stopped"),
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for `signal` or for a core task to cancel `cancel`, then cancel
/// everything. Returns the signal outcome, or `None` when a task stopped first.
/// A failed signal listener still cancels before its error is reported.
async fn wait_for_shutdown(
    signal: impl Future<Output = std::io::Result<()>>,
    cancel: &CancellationToken,
) -> Option<std::io::Result<()>> {
    let outcome = tokio::select! {
        result = signal => Some(result),
        _ = cancel.cancelled() => None,
    };
    cancel.cancel();
    outcome
}
