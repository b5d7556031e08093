use anyhow::{Context, Result};
use engine_core::TradingMode;
use rust_decimal::Decimal;
use std::env;

/// Engine configuration, loaded once from the environment at startup and
/// passed into the context — no hidden globals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Mode
    pub mode: TradingMode,

    // Market universe
    pub market: String,
    pub currency: String,

    // Polling
    pub scan_interval_seconds: u64,       // entry scan cadence
    pub monitor_interval_seconds: u64,    // exit check cadence

    // Exchange session (exchange-local time)
    pub exchange_timezone: chrono_tz::Tz,
    pub session_open_minutes: u32,        // minutes from midnight
    pub session_close_minutes: u32,

    // Sizing and brackets
    pub starting_capital: Decimal,
    pub cash_per_trade: Decimal,
    pub take_profit_pct: Decimal,         // +5%
    pub stop_loss_pct: Decimal,           // −2%
    pub use_atr_offsets: bool,
    pub stop_expiry_days: i64,            // two weeks

    // Signals
    pub trend_bandwidth: usize,
    pub trend_relative_weight: f64,
    pub trend_lag: usize,
    pub trend_crossover_mode: bool,
    pub history_lookback_days: i64,
    pub min_relative_volume: f64,
    pub candidate_limit: usize,
    pub exit_pnl_floor_pct: f64,

    // Instrument cache
    pub directory_cache_path: String,
    pub directory_staleness_hours: i64,

    // External services
    pub screener_base_url: String,
    pub venue_base_url: String,
    pub venue_api_token: String,
    pub predictor_url: Option<String>,
    pub notifier_webhook_url: String,

    // Strategy variant
    pub strategy_variant: String,
}

fn parse_session(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mode = match env::var("TRADING_MODE")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => TradingMode::Live,
            _ => TradingMode::Sandbox,
        };

        let exchange_timezone: chrono_tz::Tz = env::var("EXCHANGE_TIMEZONE")
            .unwrap_or_else(|_| "Europe/Moscow".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("EXCHANGE_TIMEZONE invalid: {e}"))?;

        let session_open_minutes = env::var("SESSION_OPEN")
            .ok()
            .as_deref()
            .and_then(parse_session)
            .unwrap_or(10 * 60);
        let session_close_minutes = env::var("SESSION_CLOSE")
            .ok()
            .as_deref()
            .and_then(parse_session)
            .unwrap_or(18 * 60 + 45);

        let config = Self {
            mode,

            market: env::var("MARKET").unwrap_or_else(|_| "russia".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "rub".to_string()),

            scan_interval_seconds: env::var("SCAN_INTERVAL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            monitor_interval_seconds: env::var("MONITOR_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            exchange_timezone,
            session_open_minutes,
            session_close_minutes,

            starting_capital: env::var("STARTING_CAPITAL")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()?,
            cash_per_trade: env::var("CASH_PER_TRADE")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            take_profit_pct: env::var("TAKE_PROFIT_PCT")
                .unwrap_or_else(|_| "0.05".to_string())
                .parse()?,
            stop_loss_pct: env::var("STOP_LOSS_PCT")
                .unwrap_or_else(|_| "-0.02".to_string())
                .parse()?,
            use_atr_offsets: env::var("USE_ATR_OFFSETS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            stop_expiry_days: env::var("STOP_EXPIRY_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()?,

            trend_bandwidth: env::var("TREND_BANDWIDTH")
                .unwrap_or_else(|_| "8".to_string())
                .parse()?,
            trend_relative_weight: env::var("TREND_RELATIVE_WEIGHT")
                .unwrap_or_else(|_| "8.0".to_string())
                .parse()?,
            trend_lag: env::var("TREND_LAG")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            trend_crossover_mode: env::var("TREND_CROSSOVER_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            history_lookback_days: env::var("HISTORY_LOOKBACK_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            min_relative_volume: env::var("MIN_RELATIVE_VOLUME")
                .unwrap_or_else(|_| "3.0".to_string())
                .parse()?,
            candidate_limit: env::var("CANDIDATE_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            exit_pnl_floor_pct: env::var("EXIT_PNL_FLOOR")
                .unwrap_or_else(|_| "-5.0".to_string())
                .parse()?,

            directory_cache_path: env::var("INSTRUMENT_CACHE_PATH")
                .unwrap_or_else(|_| "instruments.json".to_string()),
            directory_staleness_hours: env::var("INSTRUMENT_CACHE_STALENESS_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            screener_base_url: env::var("SCREENER_BASE_URL")
                .unwrap_or_else(|_| "https://scanner.screener.example".to_string()),
            venue_base_url: env::var("VENUE_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.venue.example".to_string()),
            venue_api_token: env::var("VENUE_API_TOKEN").context("VENUE_API_TOKEN not set")?,
            predictor_url: env::var("PREDICTOR_URL").ok(),
            notifier_webhook_url: env::var("NOTIFIER_WEBHOOK_URL").unwrap_or_default(),

            strategy_variant: env::var("STRATEGY")
                .unwrap_or_else(|_| "volume_surge".to_string()),
        };

        if config.session_open_minutes >= config.session_close_minutes {
            anyhow::bail!("SESSION_OPEN must be earlier than SESSION_CLOSE");
        }
        if config.cash_per_trade <= Decimal::ZERO {
            anyhow::bail!("CASH_PER_TRADE must be positive");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_parsing() {
        assert_eq!(parse_session("10:00"), Some(600));
        assert_eq!(parse_session("18:45"), Some(1125));
        assert_eq!(parse_session("24:00"), None);
        assert_eq!(parse_session("nope"), None);
    }
}
