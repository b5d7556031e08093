use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use engine_core::{BrokerageVenue, EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// On-disk shape of the cache: the symbol map plus a single process-wide
/// refresh timestamp. Rewritten wholesale after each successful refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, String>,
    last_refreshed: Option<DateTime<Utc>>,
}

/// Resolves ticker symbols to venue instrument ids, backed by a flat JSON
/// file so a process restart does not force an immediate re-pull. Shared by
/// both polling loops; reads are concurrent, a refresh takes the write lock.
pub struct InstrumentDirectory {
    path: PathBuf,
    currency: String,
    staleness: Duration,
    state: RwLock<CacheFile>,
}

impl InstrumentDirectory {
    /// Load the cache file if present. A missing or unreadable file starts
    /// an empty directory; the first refresh rebuilds it.
    pub fn load(path: impl AsRef<Path>, currency: impl Into<String>, staleness_hours: i64) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CacheFile>(&raw) {
                Ok(cache) => {
                    tracing::info!(
                        "instrument cache loaded: {} symbols, last refreshed {:?}",
                        cache.entries.len(),
                        cache.last_refreshed
                    );
                    cache
                }
                Err(e) => {
                    tracing::warn!("instrument cache at {} is unreadable: {e}", path.display());
                    CacheFile::default()
                }
            },
            Err(_) => CacheFile::default(),
        };

        Self {
            path,
            currency: currency.into(),
            staleness: Duration::hours(staleness_hours),
            state: RwLock::new(state),
        }
    }

    pub async fn resolve(&self, symbol: &str) -> EngineResult<String> {
        self.state
            .read()
            .await
            .entries
            .get(symbol)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("no venue id for symbol {symbol}")))
    }

    /// Reverse lookup: the symbol currently mapped to a venue id.
    pub async fn reverse_resolve(&self, venue_id: &str) -> EngineResult<String> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .find(|(_, id)| id.as_str() == venue_id)
            .map(|(symbol, _)| symbol.clone())
            .ok_or_else(|| EngineError::NotFound(format!("no symbol for venue id {venue_id}")))
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refreshed
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Pull the venue's tradable-instrument list, filter to the configured
    /// currency, and replace the mapping wholesale — entries absent from the
    /// new pull are dropped. Skipped (returns `Ok(false)`) while the cache
    /// is younger than the staleness threshold. A venue failure keeps the
    /// stale mapping and surfaces the error.
    pub async fn refresh_if_stale(
        &self,
        venue: &dyn BrokerageVenue,
        market: &str,
    ) -> EngineResult<bool> {
        if let Some(refreshed) = self.state.read().await.last_refreshed {
            if Utc::now() - refreshed < self.staleness {
                return Ok(false);
            }
        }

        let instruments = venue.list_tradable_instruments(market).await?;
        let entries: HashMap<String, String> = instruments
            .into_iter()
            .filter(|i| i.currency.eq_ignore_ascii_case(&self.currency))
            .map(|i| (i.symbol, i.venue_id))
            .collect();

        let mut state = self.state.write().await;
        state.entries = entries;
        state.last_refreshed = Some(Utc::now());
        tracing::info!("instrument directory refreshed: {} symbols", state.entries.len());
        self.persist(&state)
            .map(|_| true)
    }

    fn persist(&self, state: &CacheFile) -> EngineResult<()> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| EngineError::Transient(format!("cache serialization failed: {e}")))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            EngineError::Transient(format!(
                "cache write to {} failed: {e}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{
        Bar, BarInterval, InstrumentMetadata, MarketFill, OrderDirection, StopOrderRequest,
        TradableInstrument, VenuePosition,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubVenue {
        instruments: Vec<TradableInstrument>,
        fail: bool,
        pulls: AtomicUsize,
    }

    impl StubVenue {
        fn with(instruments: Vec<(&str, &str, &str)>) -> Self {
            Self {
                instruments: instruments
                    .into_iter()
                    .map(|(symbol, venue_id, currency)| TradableInstrument {
                        symbol: symbol.to_string(),
                        venue_id: venue_id.to_string(),
                        currency: currency.to_string(),
                    })
                    .collect(),
                fail: false,
                pulls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            let mut stub = Self::with(vec![]);
            stub.fail = true;
            stub
        }
    }

    #[async_trait]
    impl BrokerageVenue for StubVenue {
        async fn list_tradable_instruments(
            &self,
            _market: &str,
        ) -> EngineResult<Vec<TradableInstrument>> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::Transient("venue unavailable".to_string()));
            }
            Ok(self.instruments.clone())
        }

        async fn place_market_order(
            &self,
            _venue_id: &str,
            _quantity: i64,
            _direction: OrderDirection,
        ) -> EngineResult<MarketFill> {
            unreachable!("not used by directory tests")
        }

        async fn place_stop_order(&self, _request: StopOrderRequest) -> EngineResult<()> {
            unreachable!("not used by directory tests")
        }

        async fn get_instrument_metadata(
            &self,
            _venue_id: &str,
        ) -> EngineResult<InstrumentMetadata> {
            unreachable!("not used by directory tests")
        }

        async fn get_positions(&self) -> EngineResult<Vec<VenuePosition>> {
            unreachable!("not used by directory tests")
        }

        async fn get_top_of_book_size(&self, _venue_id: &str) -> EngineResult<i64> {
            unreachable!("not used by directory tests")
        }

        async fn get_candles(
            &self,
            _venue_id: &str,
            _lookback_days: i64,
            _interval: BarInterval,
        ) -> EngineResult<Vec<Bar>> {
            unreachable!("not used by directory tests")
        }
    }

    fn temp_cache_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("instruments.json")
    }

    #[tokio::test]
    async fn refresh_filters_currency_and_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let directory = InstrumentDirectory::load(temp_cache_path(&dir), "rub", 24);
        let venue = StubVenue::with(vec![
            ("SBER", "BBG004730N88", "rub"),
            ("GAZP", "BBG004730RP0", "RUB"),
            ("AAPL", "BBG000B9XRY4", "usd"),
        ]);

        assert!(directory.refresh_if_stale(&venue, "moex").await.unwrap());
        assert_eq!(directory.len().await, 2);
        assert_eq!(directory.resolve("SBER").await.unwrap(), "BBG004730N88");
        assert!(matches!(
            directory.resolve("AAPL").await.unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn fresh_cache_skips_the_pull() {
        let dir = tempfile::tempdir().unwrap();
        let directory = InstrumentDirectory::load(temp_cache_path(&dir), "rub", 24);
        let venue = StubVenue::with(vec![("SBER", "BBG004730N88", "rub")]);

        assert!(directory.refresh_if_stale(&venue, "moex").await.unwrap());
        assert!(!directory.refresh_if_stale(&venue, "moex").await.unwrap());
        assert_eq!(venue.pulls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_is_a_full_replace() {
        let dir = tempfile::tempdir().unwrap();
        let directory = InstrumentDirectory::load(temp_cache_path(&dir), "rub", 0);
        let first = StubVenue::with(vec![
            ("SBER", "BBG004730N88", "rub"),
            ("GAZP", "BBG004730RP0", "rub"),
        ]);
        directory.refresh_if_stale(&first, "moex").await.unwrap();

        // Staleness 0 forces the next call to re-pull; GAZP is gone from the
        // new list and must be dropped.
        let second = StubVenue::with(vec![("SBER", "BBG004730N88", "rub")]);
        directory.refresh_if_stale(&second, "moex").await.unwrap();
        assert_eq!(directory.len().await, 1);
        assert!(directory.resolve("GAZP").await.is_err());
    }

    #[tokio::test]
    async fn venue_failure_keeps_the_stale_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let directory = InstrumentDirectory::load(temp_cache_path(&dir), "rub", 0);
        let venue = StubVenue::with(vec![("SBER", "BBG004730N88", "rub")]);
        directory.refresh_if_stale(&venue, "moex").await.unwrap();

        let err = directory
            .refresh_if_stale(&StubVenue::failing(), "moex")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(directory.resolve("SBER").await.unwrap(), "BBG004730N88");
    }

    #[tokio::test]
    async fn cache_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_cache_path(&dir);
        {
            let directory = InstrumentDirectory::load(&path, "rub", 24);
            let venue = StubVenue::with(vec![("SBER", "BBG004730N88", "rub")]);
            directory.refresh_if_stale(&venue, "moex").await.unwrap();
        }

        let reloaded = InstrumentDirectory::load(&path, "rub", 24);
        assert_eq!(reloaded.resolve("SBER").await.unwrap(), "BBG004730N88");
        assert!(reloaded.last_refreshed().await.is_some());
        // And the persisted timestamp still gates the next pull.
        let venue = StubVenue::with(vec![("SBER", "BBG004730N88", "rub")]);
        assert!(!reloaded.refresh_if_stale(&venue, "moex").await.unwrap());
        assert_eq!(venue.pulls.load(Ordering::SeqCst), 0);
    }
}
