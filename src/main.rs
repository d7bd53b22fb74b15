mod app_state;
mod db;
mod env_config;
mod logger;
mod services;
mod tinvest;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use app_state::models::AppState;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use db::postgres::postgres_service::PostgresService;
use env_config::models::{app_config::{AppConfig, parse_start_date}, app_env::AppEnv, app_setting::AppSettings};
use services::archive::{ArchiveLoader, download::ArchiveDownloader};
use services::candles::{gate::IntervalGate, loader::CandleLoader, resolution::Resolution};
use services::dividends::DividendLoader;
use services::instruments::InstrumentSync;
use std::sync::Arc;
use tinvest::client::TinvestClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "market-loader")]
#[command(about = "Loads T-Invest market data into PostgreSQL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incremental candle loading for enabled instruments
    Candles {
        /// Candle interval (1min, 5min, 1hour, 1day, 1week, 1month, ...)
        #[arg(short, long, default_value = "1day")]
        interval: Resolution,
        /// Load this instrument only (default: every enabled instrument)
        #[arg(short, long)]
        figi: Option<String>,
        /// History start as YYYY-MM-DD, overrides loading.start_date
        #[arg(short, long)]
        start_date: Option<String>,
    },
    /// Bulk import of yearly minute-candle archives
    Archive,
    /// Dividend payments of enabled shares
    Dividends,
    /// Refresh of shares, bonds and ETFs reference data
    Instruments,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Инициализация приложения
    let settings: Arc<AppSettings> = Arc::new(initialize_application()?);

    // Создание глобального состояния приложения
    let app_state = initialize_app_state(settings).await?;

    // Остановка по Ctrl-C: текущий чанк дописывается, дальше работа не идёт
    spawn_shutdown_listener(app_state.cancel.clone());

    run_command(cli.command, &app_state).await?;

    info!("Market loader finished");
    Ok(())
}

/// Инициализирует настройки и логирование приложения
fn initialize_application() -> Result<AppSettings> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Загрузка переменных окружения и конфигурации
    let environment = AppEnv::new().context("Failed to read environment")?;
    let config = AppConfig::new(&environment.env).context("Failed to load configuration")?;
    let app_settings = AppSettings {
        app_config: config,
        app_env: environment,
    };

    logger::init_logger(
        &app_settings.app_config.log.level,
        &app_settings.app_config.log.format,
        app_settings.app_env.is_local(),
    )
    .context("Failed to initialize logger")?;

    info!("Starting market loader...");
    info!("Current environment: {}", app_settings.app_env.env);

    if app_settings.app_env.is_local() {
        debug!("Configuration details: {:#?}", app_settings);
    }

    Ok(app_settings)
}

/// Устанавливает соединения с PostgreSQL и T-Invest API
async fn initialize_app_state(settings: Arc<AppSettings>) -> Result<AppState> {
    info!("Initializing connections...");

    let postgres_service = PostgresService::new(&settings)
        .await
        .context("Cannot continue without PostgreSQL connection")?;
    info!("PostgreSQL connection established successfully");

    let client = TinvestClient::connect(
        &settings.app_config.tinvest,
        &settings.app_env.tinvest_token,
    )
    .await
    .context("Cannot continue without T-Invest API channel")?;

    let rate_gate = IntervalGate::new(settings.app_config.loading.rate_limit_pause());

    Ok(AppState::new(
        settings,
        Arc::new(postgres_service),
        Arc::new(client),
        Arc::new(rate_gate),
        CancellationToken::new(),
    ))
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown requested, finishing current step");
                cancel.cancel();
            }
            Err(err) => error!("Failed to listen for shutdown signal: {}", err),
        }
    });
}

/// Выполняет выбранную команду; ошибки отдельных инструментов не меняют код выхода,
/// ошибочные параметры командной строки меняют
async fn run_command(command: Commands, app_state: &AppState) -> Result<()> {
    let now = Utc::now();
    let history_start = app_state
        .settings
        .app_config
        .loading
        .history_start(now)
        .map_err(|err| anyhow::anyhow!("Invalid history start: {}", err))?;

    match command {
        Commands::Candles {
            interval,
            figi,
            start_date,
        } => {
            let history_start = match start_date.as_deref() {
                Some(raw) => parse_start_date(raw, now)
                    .map_err(|err| anyhow::anyhow!("Invalid --start-date: {}", err))?,
                None => history_start,
            };
            let loader = CandleLoader::from_app_state(app_state, history_start);

            match figi {
                Some(figi) => {
                    // Инструмент ищется в базе, при отсутствии справочник обновляется из API
                    let instrument = InstrumentSync::from_app_state(app_state)
                        .find_or_sync(&figi)
                        .await
                        .with_context(|| format!("Cannot load candles for {}", figi))?;
                    match loader.load_instrument(&instrument.figi, interval, now).await {
                        Ok(outcome) => info!("Candles {} for {}: {:?}", interval, figi, outcome),
                        Err(err) => error!("Failed to load {} candles for {}: {}", interval, figi, err),
                    }
                }
                None => match loader.run_all(interval, now).await {
                    Ok(summary) => info!(
                        "Candles {}: {} processed, {} skipped, {} failed",
                        interval, summary.processed, summary.skipped, summary.failed
                    ),
                    Err(err) => error!("Candle loading failed: {}", err),
                },
            }
        }
        Commands::Archive => {
            let settings = &app_state.settings;
            let downloader = ArchiveDownloader::new(
                &settings.app_config.archive,
                &settings.app_env.tinvest_token,
                app_state.cancel.clone(),
            )
            .context("Failed to build archive downloader")?;
            let loader = ArchiveLoader::from_app_state(app_state, Arc::new(downloader));
            match loader.run_all(history_start.year(), now.year()).await {
                Ok(summary) => info!(
                    "Archive import: {} instruments, {} years, {} failed years, {} candles",
                    summary.instruments, summary.years, summary.failed_years, summary.candles
                ),
                Err(err) => error!("Archive import failed: {}", err),
            }
        }
        Commands::Dividends => {
            let loader = DividendLoader::from_app_state(app_state, history_start);
            if let Err(err) = loader.run_all(now).await {
                error!("Dividend loading failed: {}", err);
            }
        }
        Commands::Instruments => {
            let summary = InstrumentSync::from_app_state(app_state).sync_all().await;
            info!(
                "Instruments: {} received, {} stored, {} failed",
                summary.received, summary.stored, summary.failed
            );
        }
    }
    Ok(())
}
