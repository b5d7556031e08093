use std::time::Duration;

use async_trait::async_trait;
use engine_core::{EngineError, EngineResult, IndicatorRow, ScreenQuery, ScreeningProvider};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Market screener HTTP client. Posts a scan query and maps the ordered
/// response rows into indicator rows. The caller treats any failure as
/// "no candidates this cycle".
pub struct ScreenerClient {
    client: Client,
    base_url: String,
}

/// Wire response: one row per instrument, values aligned with the requested
/// columns.
#[derive(Debug, Deserialize)]
struct ScanResponse {
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    /// Exchange-qualified symbol, e.g. "MOEX:SBER".
    s: String,
    d: Vec<Option<f64>>,
}

impl ScreenerClient {
    pub fn new(base_url: String) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EngineError::Transient(format!("screener client build failed: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Send with bounded retry: 429 and 5xx responses are retried a couple
    /// of times before surfacing as transient failures.
    async fn post_scan(&self, url: &str, payload: &serde_json::Value) -> EngineResult<ScanResponse> {
        let mut last_status = None;
        for attempt in 0..3u32 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }

            let response = self
                .client
                .post(url)
                .json(payload)
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("screener request failed: {e}")))?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                tracing::debug!("screener returned {status}, attempt {}", attempt + 1);
                last_status = Some(status);
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EngineError::InvalidOperation(format!(
                    "screener rejected the query ({status}): {body}"
                )));
            }

            return response
                .json::<ScanResponse>()
                .await
                .map_err(|e| EngineError::Transient(format!("screener response unreadable: {e}")));
        }

        Err(EngineError::Transient(format!(
            "screener unavailable after retries (last status {:?})",
            last_status
        )))
    }
}

fn build_payload(query: &ScreenQuery) -> serde_json::Value {
    let filters: Vec<serde_json::Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "left": f.field,
                "operation": f.operation,
                "right": f.value,
            })
        })
        .collect();

    let mut payload = json!({
        "columns": query.columns,
        "filter": filters,
        "range": [0, query.limit],
    });
    if let Some(sort) = &query.sort {
        payload["sort"] = json!({
            "sortBy": sort.field,
            "sortOrder": if sort.ascending { "asc" } else { "desc" },
        });
    }
    payload
}

fn parse_rows(columns: &[String], response: ScanResponse) -> Vec<IndicatorRow> {
    response
        .data
        .into_iter()
        .map(|raw| {
            let symbol = raw
                .s
                .rsplit(':')
                .next()
                .unwrap_or(raw.s.as_str())
                .to_string();
            let mut row = IndicatorRow::new(symbol);
            for (column, value) in columns.iter().zip(raw.d) {
                if let Some(value) = value {
                    row.indicators.insert(column.clone(), value);
                }
            }
            row
        })
        .collect()
}

#[async_trait]
impl ScreeningProvider for ScreenerClient {
    async fn scan(&self, query: &ScreenQuery) -> EngineResult<Vec<IndicatorRow>> {
        let url = format!("{}/{}/scan", self.base_url, query.market);
        let payload = build_payload(query);
        let response = self.post_scan(&url, &payload).await?;
        let rows = parse_rows(&query.columns, response);
        tracing::debug!("screener returned {} rows for {}", rows.len(), query.market);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{ScreenFilter, ScreenSort};

    fn query() -> ScreenQuery {
        ScreenQuery {
            market: "russia".to_string(),
            columns: vec!["relative_volume".to_string(), "rsi".to_string()],
            filters: vec![ScreenFilter {
                field: "relative_volume".to_string(),
                operation: "greater".to_string(),
                value: 3.0,
            }],
            sort: Some(ScreenSort {
                field: "relative_volume".to_string(),
                ascending: false,
            }),
            limit: 10,
        }
    }

    #[test]
    fn payload_carries_filters_sort_and_range() {
        let payload = build_payload(&query());
        assert_eq!(payload["range"][1], 10);
        assert_eq!(payload["filter"][0]["left"], "relative_volume");
        assert_eq!(payload["sort"]["sortOrder"], "desc");
        assert_eq!(payload["columns"][1], "rsi");
    }

    #[test]
    fn rows_map_columns_and_strip_exchange_prefix() {
        let response = ScanResponse {
            data: vec![
                ScanRow {
                    s: "MOEX:SBER".to_string(),
                    d: vec![Some(4.2), Some(61.0)],
                },
                ScanRow {
                    s: "GAZP".to_string(),
                    d: vec![Some(3.1), None],
                },
            ],
        };
        let rows = parse_rows(&query().columns, response);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "SBER");
        assert_eq!(rows[0].get("relative_volume"), Some(4.2));
        assert_eq!(rows[0].get("rsi"), Some(61.0));
        assert_eq!(rows[1].symbol, "GAZP");
        // A missing value stays absent rather than defaulting to zero.
        assert_eq!(rows[1].get("rsi"), None);
    }
}
