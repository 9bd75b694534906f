//! API client for the forecaster HTTP service

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use url::Url;

/// Non-success answer from the service
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

/// API client for the forecaster
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Forecast consumption `request.horizon` hours ahead
    pub async fn predict(&self, request: &PredictRequest) -> Result<Prediction> {
        let response = self
            .client
            .post(self.url("predict")?)
            .json(request)
            .send()
            .await
            .context("Failed to send request")?;
        parse(response).await
    }

    /// Usage report for one building over an inclusive date range
    pub async fn usage(&self, building: &str, start_date: &str, end_date: &str) -> Result<UsageReport> {
        let mut url = self.url("metrics")?;
        url.query_pairs_mut()
            .append_pair("building", building)
            .append_pair("start_date", start_date)
            .append_pair("end_date", end_date);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;
        parse(response).await
    }

    /// Health report; an unhealthy service still answers with a body
    pub async fn health(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(self.url("healthz")?)
            .send()
            .await
            .context("Failed to send request")?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(ApiError { status, message }.into());
    }
    response.json().await.context("Failed to parse response")
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub horizon: u32,
    pub exogenous: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_consumption: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub total_consumption: f64,
    pub peak_demand: f64,
    pub peak_hour: String,
    pub average_consumption: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    /// Base64-encoded PNG of consumption over the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_graph: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_predict_posts_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(Matcher::PartialJson(json!({
                "horizon": 6,
                "exogenous": { "Winter": 1.0 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predicted_consumption": 3.25}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = PredictRequest {
            horizon: 6,
            exogenous: HashMap::from([("Winter".to_string(), 1.0)]),
        };
        let prediction = client.predict(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(prediction.predicted_consumption, 3.25);
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict")
            .with_status(400)
            .with_body(r#"{"error": "Missing exogenous feature: 'HVAC [kW]'"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = PredictRequest {
            horizon: 1,
            exogenous: HashMap::new(),
        };
        let err = client.predict(&request).await.unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "Missing exogenous feature: 'HVAC [kW]'");
    }

    #[tokio::test]
    async fn test_usage_sends_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("building".into(), "House 1".into()),
                Matcher::UrlEncoded("start_date".into(), "2024-01-01".into()),
                Matcher::UrlEncoded("end_date".into(), "2024-01-31".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"total_consumption": 120.5, "peak_demand": 9.1,
                    "peak_hour": "18:00", "average_consumption": 0.16}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report = client
            .usage("House 1", "2024-01-01", "2024-01-31")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.peak_hour, "18:00");
        assert_eq!(report.samples, None);
        assert_eq!(report.trend_graph, None);
    }

    #[tokio::test]
    async fn test_unhealthy_service_still_reports() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status": "unhealthy", "components":
                    {"model": {"status": "unhealthy", "message": "missing"}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report = client.health().await.unwrap();
        assert_eq!(report.status, "unhealthy");
        assert_eq!(report.components["model"].message.as_deref(), Some("missing"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
