use std::collections::HashSet;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use engine_core::{
    EngineError, EngineResult, RankedCandidate, ScreenFilter, ScreenQuery, ScreenSort,
    TradingMode,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::strategy::{EntryDecision, SCREEN_COLUMNS};
use crate::trade_executor::{execute_entry, EntryOutcome};

#[derive(Debug, Default)]
pub struct ScanReport {
    pub market_open: bool,
    pub candidates: usize,
    pub entered: Vec<EntryOutcome>,
    pub skipped: usize,
}

/// Exchange-session gate, evaluated in the configured exchange timezone.
pub fn is_market_open(config: &EngineConfig, now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&config.exchange_timezone);
    if local.weekday() == Weekday::Sat || local.weekday() == Weekday::Sun {
        return false;
    }
    let minutes = local.hour() * 60 + local.minute();
    minutes >= config.session_open_minutes && minutes < config.session_close_minutes
}

/// The screener query all variants share: the engine-side predicates are
/// strictly tighter than this wire-level pre-filter, so nothing the
/// strategy wants is cut server-side.
pub fn screen_query(config: &EngineConfig) -> ScreenQuery {
    ScreenQuery {
        market: config.market.clone(),
        columns: SCREEN_COLUMNS.iter().map(|c| c.to_string()).collect(),
        filters: vec![ScreenFilter {
            field: "relative_volume".to_string(),
            operation: "greater".to_string(),
            value: 1.0,
        }],
        sort: Some(ScreenSort {
            field: "relative_volume".to_string(),
            ascending: false,
        }),
        limit: config.candidate_limit.max(50),
    }
}

/// One entry-scan pass: refresh the directory, pull a snapshot, rank it,
/// and evaluate each candidate. Per-instrument failures are logged and
/// skipped so one bad symbol never halts the scan of the rest.
pub async fn run_entry_cycle(ctx: &EngineContext) -> EngineResult<ScanReport> {
    let mut report = ScanReport {
        market_open: is_market_open(&ctx.config, Utc::now()),
        ..ScanReport::default()
    };
    if !report.market_open {
        tracing::debug!("market closed, skipping entry scan");
        return Ok(report);
    }

    if let Err(e) = ctx
        .directory
        .refresh_if_stale(ctx.venue.as_ref(), &ctx.config.market)
        .await
    {
        // Stale mapping stays usable; the refresh retries next cycle.
        tracing::warn!("instrument directory refresh failed: {e}");
    }

    let snapshot = match ctx.screener.scan(&screen_query(&ctx.config)).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("screener unavailable, no candidates this cycle: {e}");
            return Ok(report);
        }
    };

    let candidates = ctx.strategy.candidates(&snapshot);
    report.candidates = candidates.len();
    tracing::info!(
        "entry scan: {} candidates from {} snapshot rows",
        candidates.len(),
        snapshot.len()
    );

    let held = held_symbols(ctx).await;
    for candidate in candidates {
        let symbol = candidate.row.symbol.clone();
        if held.contains(&symbol) {
            report.skipped += 1;
            continue;
        }
        match evaluate_candidate(ctx, &candidate).await {
            Ok(Some(outcome)) => report.entered.push(outcome),
            Ok(None) => report.skipped += 1,
            Err(e) => {
                report.skipped += 1;
                match e {
                    EngineError::Transient(_) | EngineError::NotFound(_) => {
                        tracing::warn!("{symbol}: skipped this cycle: {e}")
                    }
                    _ => tracing::error!("{symbol}: entry failed: {e}"),
                }
            }
        }
    }

    Ok(report)
}

/// Symbols already held, so the scan does not pyramid into them.
async fn held_symbols(ctx: &EngineContext) -> HashSet<String> {
    match ctx.config.mode {
        TradingMode::Sandbox => ctx
            .ledger
            .lock()
            .await
            .positions()
            .into_iter()
            .map(|p| p.symbol)
            .collect(),
        TradingMode::Live => match ctx.venue.get_positions().await {
            Ok(positions) => {
                let mut symbols = HashSet::new();
                for position in positions {
                    match ctx.directory.reverse_resolve(&position.venue_id).await {
                        Ok(symbol) => {
                            symbols.insert(symbol);
                        }
                        Err(e) => tracing::debug!("unmapped venue position: {e}"),
                    }
                }
                symbols
            }
            Err(e) => {
                tracing::warn!("could not list venue positions: {e}");
                HashSet::new()
            }
        },
    }
}

async fn evaluate_candidate(
    ctx: &EngineContext,
    candidate: &RankedCandidate,
) -> EngineResult<Option<EntryOutcome>> {
    let symbol = &candidate.row.symbol;
    let closes = ctx.close_history(symbol).await?;

    match ctx.strategy.confirm_entry(&closes) {
        EntryDecision::Confirmed => {}
        EntryDecision::Denied => {
            tracing::debug!("{symbol}: trend denies entry");
            return Ok(None);
        }
        EntryDecision::NoSignal => {
            tracing::debug!("{symbol}: not enough history for a signal");
            return Ok(None);
        }
    }

    let last_close = closes
        .last()
        .copied()
        .ok_or_else(|| EngineError::DataUnavailable(format!("no price history for {symbol}")))?;

    // Optional regression gate; an unreachable predictor degrades the
    // entry to trend-only rather than blocking it.
    if let Some(predictor) = &ctx.predictor {
        match predictor.predict_next_close(symbol, &closes).await {
            Ok(predicted) if predicted <= last_close => {
                tracing::debug!(
                    "{symbol}: predictor denies entry ({predicted:.2} <= {last_close:.2})"
                );
                return Ok(None);
            }
            Ok(predicted) => {
                tracing::debug!("{symbol}: predictor confirms ({predicted:.2} > {last_close:.2})")
            }
            Err(e) => tracing::warn!("{symbol}: predictor unavailable, trend-only entry: {e}"),
        }
    }

    let reference_price = Decimal::from_f64(last_close).ok_or_else(|| {
        EngineError::DataUnavailable(format!("unrepresentable close {last_close} for {symbol}"))
    })?;
    let atr_offset = if ctx.config.use_atr_offsets {
        candidate.row.get("atr").and_then(Decimal::from_f64)
    } else {
        None
    };

    execute_entry(
        ctx,
        symbol,
        ctx.config.cash_per_trade,
        reference_price,
        atr_offset,
    )
    .await
}
