use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use engine_core::{BrokerageVenue, ClosePredictor, ScreeningProvider, TradingMode};
use instrument_directory::InstrumentDirectory;
use paper_ledger::PaperLedger;
use screener_client::ScreenerClient;
use tokio::signal::unix::SignalKind;
use tokio::sync::{watch, Mutex};
use tokio::time;
use venue_client::VenueHttpClient;

use trading_engine::commands::EngineHandle;
use trading_engine::config::EngineConfig;
use trading_engine::context::EngineContext;
use trading_engine::monitor::run_exit_cycle;
use trading_engine::notifier::WebhookNotifier;
use trading_engine::predictor::RegressionPredictor;
use trading_engine::scanner::run_entry_cycle;
use trading_engine::strategy::Strategy;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting TradePulse Signal & Order-Execution Engine");

    // 2. Load configuration
    let config = EngineConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Mode: {:?}", config.mode);
    tracing::info!("  Market: {} ({})", config.market, config.currency);
    tracing::info!(
        "  Scan interval: {}s | Monitor interval: {}s",
        config.scan_interval_seconds,
        config.monitor_interval_seconds
    );
    tracing::info!("  Cash per trade: {}", config.cash_per_trade);
    tracing::info!(
        "  Brackets: {}% / {}% (ATR offsets: {})",
        config.take_profit_pct * rust_decimal::Decimal::from(100),
        config.stop_loss_pct * rust_decimal::Decimal::from(100),
        config.use_atr_offsets
    );
    tracing::info!("  Strategy: {}", config.strategy_variant);

    // 3. Safety gate: sandbox by default, live requires explicit approval
    if config.mode == TradingMode::Live {
        let approved = std::env::var("LIVE_TRADING_APPROVED")
            .map(|v| v.eq_ignore_ascii_case("yes"))
            .unwrap_or(false);
        if !approved {
            tracing::error!(
                "TRADING_MODE=live requires LIVE_TRADING_APPROVED=yes. \
                 Use TRADING_MODE=sandbox for the paper ledger."
            );
            std::process::exit(1);
        }
        tracing::warn!("LIVE TRADING MODE — REAL MONEY AT RISK");
    } else {
        tracing::info!("Sandbox mode — positions live in the in-memory paper ledger");
    }

    // 4. Build collaborators
    let venue: Arc<dyn BrokerageVenue> = Arc::new(VenueHttpClient::new(
        config.venue_base_url.clone(),
        config.venue_api_token.clone(),
    )?);
    let screener: Arc<dyn ScreeningProvider> =
        Arc::new(ScreenerClient::new(config.screener_base_url.clone())?);
    let predictor: Option<Arc<dyn ClosePredictor>> = match &config.predictor_url {
        Some(url) => Some(Arc::new(RegressionPredictor::new(url.clone())?)),
        None => None,
    };
    if predictor.is_none() {
        tracing::info!("No predictor configured — entries are trend-only");
    }

    let directory = InstrumentDirectory::load(
        &config.directory_cache_path,
        &config.currency,
        config.directory_staleness_hours,
    );
    let ledger = Mutex::new(PaperLedger::new(config.starting_capital)?);
    let strategy = Strategy::from_config(&config)?;
    tracing::info!("Strategy ready: {}", strategy.name());

    let notifier = Arc::new(WebhookNotifier::new(config.notifier_webhook_url.clone())?);

    let ctx = Arc::new(EngineContext {
        config: config.clone(),
        screener,
        venue,
        predictor,
        directory,
        ledger,
        strategy,
    });

    // 5. Startup connectivity checks
    ctx.venue
        .get_positions()
        .await
        .map_err(|e| anyhow::anyhow!("Venue connectivity check failed: {e}"))?;
    tracing::info!("Startup check: venue OK");

    match ctx
        .directory
        .refresh_if_stale(ctx.venue.as_ref(), &config.market)
        .await
    {
        Ok(true) => tracing::info!(
            "Startup check: instrument directory refreshed ({} symbols)",
            ctx.directory.len().await
        ),
        Ok(false) => tracing::info!(
            "Startup check: instrument cache fresh ({} symbols)",
            ctx.directory.len().await
        ),
        // Not fatal — the cached mapping keeps the loops going.
        Err(e) => tracing::warn!("Startup check: directory refresh failed: {e}"),
    }

    let handle = EngineHandle::new(Arc::clone(&ctx));
    let open_positions = handle.list_positions().await.map(|p| p.len()).unwrap_or(0);

    // 6. Startup notification
    notifier
        .send_message(&format!(
            "**Engine started** ({:?})\n\
             Capital: {} | Per trade: {} | Strategy: {}\n\
             Open positions: {}",
            config.mode,
            config.starting_capital,
            config.cash_per_trade,
            ctx.strategy.name(),
            open_positions
        ))
        .await
        .ok();

    // 7. Two independent polling loops sharing the context; both observe
    // the stop flag at the top of each iteration.
    let (stop_tx, stop_rx) = watch::channel(false);
    let entry_task = tokio::spawn(entry_loop(
        Arc::clone(&ctx),
        Arc::clone(&notifier),
        stop_rx.clone(),
    ));
    let exit_task = tokio::spawn(exit_loop(
        Arc::clone(&ctx),
        Arc::clone(&notifier),
        stop_rx,
    ));

    tracing::info!(
        "Engine running: entry scan every {}s, exit checks every {}s. Press Ctrl+C to stop.",
        config.scan_interval_seconds,
        config.monitor_interval_seconds
    );

    // 8. Graceful shutdown on SIGINT/SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
    }

    stop_tx.send(true).ok();
    entry_task.await.ok();
    exit_task.await.ok();

    notifier
        .send_message("**Engine stopped** — graceful shutdown")
        .await
        .ok();
    tracing::info!("Engine shut down.");
    Ok(())
}

async fn entry_loop(
    ctx: Arc<EngineContext>,
    notifier: Arc<WebhookNotifier>,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = time::interval(Duration::from_secs(ctx.config.scan_interval_seconds));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            break;
        }

        match run_entry_cycle(&ctx).await {
            Ok(report) => {
                for entry in &report.entered {
                    let bracket = entry
                        .bracket
                        .as_ref()
                        .map(|b| format!("TP {} / SL {}", b.take_profit, b.stop_loss))
                        .unwrap_or_else(|| "UNPROTECTED".to_string());
                    notifier
                        .send_message(&format!(
                            "**Entered {}**\n{} lots @ {} ({})",
                            entry.symbol, entry.quantity, entry.fill_price, bracket
                        ))
                        .await
                        .ok();
                }
            }
            Err(e) => {
                tracing::error!("entry cycle failed: {e}");
                notifier
                    .send_message(&format!("**Entry cycle error**: {e}\n_Engine still running._"))
                    .await
                    .ok();
            }
        }
    }

    tracing::info!("entry scan loop stopped");
}

async fn exit_loop(
    ctx: Arc<EngineContext>,
    notifier: Arc<WebhookNotifier>,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = time::interval(Duration::from_secs(ctx.config.monitor_interval_seconds));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            break;
        }

        match run_exit_cycle(&ctx).await {
            Ok(exits) => {
                for exit in &exits {
                    notifier
                        .send_message(&format!(
                            "**Closed {}**\n{} lots @ {} (proceeds {})",
                            exit.symbol, exit.quantity, exit.fill_price, exit.proceeds
                        ))
                        .await
                        .ok();
                }
            }
            Err(e) => tracing::error!("exit cycle failed: {e}"),
        }
    }

    tracing::info!("exit monitor loop stopped");
}
