//! API client for communicating with the prediction server

use anyhow::{Context, Result};
use eta_lib::{Band, ErrorDescriptor};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the prediction server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_get(path).await?;
        Self::decode(response).await
    }

    /// GET a probe endpoint whose body is meaningful on any status
    pub async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self.send_get(path).await?;
        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn send_get(&self, path: &str) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        self.client
            .get(url)
            .send()
            .await
            .context("Failed to send request")
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::from_body(status, &body).into());
        }

        response.json().await.context("Failed to parse response")
    }
}

/// Non-success response from the server
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {}", failure_detail(.descriptor, .body))]
pub struct ApiFailure {
    pub status: StatusCode,
    /// Present when the server described the failing stage
    pub descriptor: Option<ErrorDescriptor>,
    pub body: String,
}

impl ApiFailure {
    fn from_body(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            descriptor: serde_json::from_str(body).ok(),
            body: body.to_string(),
        }
    }
}

fn failure_detail(descriptor: &Option<ErrorDescriptor>, body: &str) -> String {
    match descriptor {
        Some(ErrorDescriptor {
            stage,
            detail,
            field: Some(field),
        }) => format!("{} on `{}`: {}", stage.as_str(), field, detail),
        Some(ErrorDescriptor { stage, detail, .. }) => format!("{}: {}", stage.as_str(), detail),
        None => body.to_string(),
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub duration_minutes: f64,
    pub band: Band,
    pub summary: String,
    pub model: ModelSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checksum: String,
}
