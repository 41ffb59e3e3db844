use crate::config::Settings;
use crate::ingest::types::{validate_rows, StockMetricsResponse};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/stock_metrics";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait MetricsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_stock_metrics(&self) -> Result<(StockMetricsResponse, Value)>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonMetricsProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonMetricsProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_metrics_provider_base_url()?.to_string();
        let api_key = settings.metrics_provider_api_key.clone();

        let timeout_secs = std::env::var("METRICS_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("METRICS_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("METRICS_PROVIDER_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build metrics provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<(StockMetricsResponse, Value)> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .send()
            .await
            .context("metrics provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read provider response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("provider response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("metrics provider HTTP {status}: {raw_json}");
        }

        let parsed = serde_json::from_value::<StockMetricsResponse>(raw_json.clone())
            .context("failed to parse provider response into StockMetricsResponse")?;
        Ok((parsed, raw_json))
    }
}

#[async_trait::async_trait]
impl MetricsProvider for HttpJsonMetricsProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_stock_metrics(&self) -> Result<(StockMetricsResponse, Value)> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok((parsed, raw)) => {
                    validate_rows(&parsed.items)?;
                    return Ok((parsed, raw));
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "metrics provider fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(base_url: &str, path: &str) -> HttpJsonMetricsProvider {
        HttpJsonMetricsProvider {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: Some("secret".to_string()),
            path: path.to_string(),
            retries: 1,
        }
    }

    #[test]
    fn url_joins_base_and_path() {
        assert_eq!(
            provider("https://data.example.com/", "v1/stock_metrics").url(),
            "https://data.example.com/v1/stock_metrics"
        );
        assert_eq!(
            provider("https://data.example.com", "/metrics").url(),
            "https://data.example.com/metrics"
        );
    }

    #[test]
    fn headers_carry_api_key() {
        let headers = provider("https://x", DEFAULT_PATH).headers().unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn parses_expected_shape() {
        let v = json!({
            "items": [{
                "symbol": "AAPL",
                "market_cap": 2_500_000_000_000_i64,
                "sma200": 0.08,
                "ps": 25.0,
                "gross_margin": 0.4,
                "profit_margin": 0.25,
                "operating_margin": 0.3,
            }]
        });

        let parsed: StockMetricsResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].symbol, "AAPL");
        assert!(validate_rows(&parsed.items).is_ok());
    }

    #[test]
    fn rejects_non_numeric_metrics_via_deserialize() {
        let v = json!({
            "items": [{
                "symbol": "AAPL",
                "market_cap": 1,
                "sma200": "0.08",
                "ps": 25.0,
                "gross_margin": 0.4,
                "profit_margin": 0.25,
                "operating_margin": 0.3,
            }]
        });

        assert!(serde_json::from_value::<StockMetricsResponse>(v).is_err());
    }
}
