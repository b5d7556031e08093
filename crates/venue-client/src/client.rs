use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use engine_core::{
    Bar, BarInterval, BrokerageVenue, EngineError, EngineResult, InstrumentMetadata, MarketFill,
    OrderDirection, StopOrderRequest, TradableInstrument, VenuePosition,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::models::*;

/// Bearer-token REST client for the brokerage venue. One instance serves
/// both loops; every call is a plain request/response with a client-level
/// timeout, and failures map onto the engine error taxonomy.
pub struct VenueHttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl VenueHttpClient {
    pub fn new(base_url: String, token: String) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EngineError::Transient(format!("venue client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Create the client from VENUE_BASE_URL / VENUE_API_TOKEN.
    pub fn from_env() -> EngineResult<Self> {
        let base_url = std::env::var("VENUE_BASE_URL")
            .unwrap_or_else(|_| "https://sandbox.venue.example".to_string());
        let token = std::env::var("VENUE_API_TOKEN")
            .map_err(|_| EngineError::InvalidOperation("VENUE_API_TOKEN not set".to_string()))?;
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn error_for(status: StatusCode, body: String) -> EngineError {
        if status == StatusCode::NOT_FOUND {
            EngineError::NotFound(format!("venue: {body}"))
        } else if status.is_client_error() {
            EngineError::InvalidOperation(format!("venue rejected the request ({status}): {body}"))
        } else {
            EngineError::Transient(format!("venue error ({status}): {body}"))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> EngineResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::error_for(status, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Transient(format!("venue response unreadable: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> EngineResult<T> {
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| EngineError::Transient(format!("venue request failed: {e}")))?;
        Self::read_json(response).await
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> EngineResult<T> {
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Transient(format!("venue request failed: {e}")))?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl BrokerageVenue for VenueHttpClient {
    async fn list_tradable_instruments(
        &self,
        market: &str,
    ) -> EngineResult<Vec<TradableInstrument>> {
        let url = format!("{}/v1/instruments?market={market}", self.base_url);
        let response: InstrumentListResponse = self.get_json(url).await?;
        Ok(response
            .instruments
            .into_iter()
            .map(|entry| TradableInstrument {
                symbol: entry.ticker,
                venue_id: entry.instrument_id,
                currency: entry.currency,
            })
            .collect())
    }

    async fn place_market_order(
        &self,
        venue_id: &str,
        quantity: i64,
        direction: OrderDirection,
    ) -> EngineResult<MarketFill> {
        let request = MarketOrderRequest {
            instrument_id: venue_id.to_string(),
            quantity,
            direction,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        };
        tracing::info!("submitting market order: {:?} {} x {}", direction, quantity, venue_id);

        let url = format!("{}/v1/orders/market", self.base_url);
        let response: MarketOrderResponse = self.post_json(url, &request).await?;
        Ok(MarketFill {
            filled_price: response.executed_price,
            total_amount: response.total_amount,
        })
    }

    async fn place_stop_order(&self, request: StopOrderRequest) -> EngineResult<()> {
        let wire = StopOrderWireRequest {
            instrument_id: request.venue_id.clone(),
            quantity: request.quantity,
            stop_price: request.trigger_price,
            limit_price: request.limit_price,
            kind: request.kind,
            expires_at: request.expires_at,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        };
        tracing::info!(
            "submitting {:?} stop for {} @ {}",
            request.kind,
            request.venue_id,
            request.trigger_price
        );

        let url = format!("{}/v1/orders/stop", self.base_url);
        let _: serde_json::Value = self.post_json(url, &wire).await?;
        Ok(())
    }

    async fn get_instrument_metadata(&self, venue_id: &str) -> EngineResult<InstrumentMetadata> {
        let url = format!("{}/v1/instruments/{venue_id}/metadata", self.base_url);
        let response: MetadataResponse = self.get_json(url).await?;
        Ok(InstrumentMetadata {
            lot_size: response.lot_size,
            price_increment: response.min_price_increment,
        })
    }

    async fn get_positions(&self) -> EngineResult<Vec<VenuePosition>> {
        let url = format!("{}/v1/portfolio/positions", self.base_url);
        let response: PositionsResponse = self.get_json(url).await?;
        Ok(response
            .positions
            .into_iter()
            .map(|entry| VenuePosition {
                venue_id: entry.instrument_id,
                quantity: entry.quantity,
                current_price: entry.current_price,
                unrealized_yield: entry.expected_yield,
            })
            .collect())
    }

    /// Size at the best ask — the liquidity available to an entry order.
    async fn get_top_of_book_size(&self, venue_id: &str) -> EngineResult<i64> {
        let url = format!("{}/v1/orderbook/{venue_id}?depth=1", self.base_url);
        let response: OrderBookResponse = self.get_json(url).await?;
        Ok(response
            .asks
            .first()
            .or_else(|| response.bids.first())
            .map(|level| level.quantity)
            .unwrap_or(0))
    }

    async fn get_candles(
        &self,
        venue_id: &str,
        lookback_days: i64,
        interval: BarInterval,
    ) -> EngineResult<Vec<Bar>> {
        let to = Utc::now();
        let from = to - chrono::Duration::days(lookback_days);
        let interval = match interval {
            BarInterval::Hour => "hour",
            BarInterval::Day => "day",
        };
        let url = format!(
            "{}/v1/market/candles?instrument_id={venue_id}&from={}&to={}&interval={interval}",
            self.base_url,
            from.timestamp(),
            to.timestamp()
        );
        let response: CandlesResponse = self.get_json(url).await?;
        Ok(response.candles.into_iter().map(Bar::from).collect())
    }
}
