use chrono::{DateTime, Utc};
use engine_core::{Bar, OrderDirection, StopOrderKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentListResponse {
    pub instruments: Vec<InstrumentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentEntry {
    pub ticker: String,
    pub instrument_id: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOrderRequest {
    pub instrument_id: String,
    pub quantity: i64,
    pub direction: OrderDirection,
    pub client_order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketOrderResponse {
    pub executed_price: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopOrderWireRequest {
    pub instrument_id: String,
    pub quantity: i64,
    pub stop_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    pub kind: StopOrderKind,
    pub expires_at: DateTime<Utc>,
    pub client_order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    pub lot_size: i64,
    pub min_price_increment: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    pub positions: Vec<PositionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionEntry {
    pub instrument_id: String,
    pub quantity: i64,
    pub current_price: Decimal,
    pub expected_yield: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookResponse {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandlesResponse {
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl From<Candle> for Bar {
    fn from(candle: Candle) -> Self {
        Bar {
            timestamp: candle.time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn positions_response_deserializes() {
        let raw = r#"{
            "positions": [
                {"instrument_id": "BBG004730N88", "quantity": 10,
                 "current_price": 287.5, "expected_yield": 1.75}
            ]
        }"#;
        let parsed: PositionsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.positions.len(), 1);
        assert_eq!(parsed.positions[0].quantity, 10);
        assert_eq!(parsed.positions[0].current_price, dec!(287.5));
    }

    #[test]
    fn candle_converts_to_bar() {
        let raw = r#"{
            "candles": [
                {"time": "2024-03-01T10:00:00Z", "open": 100.0, "high": 102.0,
                 "low": 99.5, "close": 101.0, "volume": 12000}
            ]
        }"#;
        let parsed: CandlesResponse = serde_json::from_str(raw).unwrap();
        let bar: Bar = parsed.candles[0].clone().into();
        assert_eq!(bar.close, 101.0);
        assert_eq!(bar.volume, 12000);
    }

    #[test]
    fn stop_order_omits_absent_limit_price() {
        let request = StopOrderWireRequest {
            instrument_id: "BBG004730N88".to_string(),
            quantity: 1,
            stop_price: dec!(98.0),
            limit_price: None,
            kind: StopOrderKind::StopLoss,
            expires_at: "2024-03-15T00:00:00Z".parse().unwrap(),
            client_order_id: "test".to_string(),
        };
        let raw = serde_json::to_string(&request).unwrap();
        assert!(!raw.contains("limit_price"));
        assert!(raw.contains("stop_loss"));
    }
}
