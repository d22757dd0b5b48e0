// HTTP insight generator
use crate::application::insight::{InsightGenerator, InsightRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpInsightClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightResponse {
    #[serde(default)]
    insight: Option<String>,
}

impl HttpInsightClient {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build insight HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl InsightGenerator for HttpInsightClient {
    async fn generate(&self, request: &InsightRequest) -> Result<String> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            points = request.points.len(),
            endpoint = %self.endpoint,
            "requesting insight"
        );
        let response = builder
            .send()
            .await
            .context("Failed to send insight request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Insight request failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InsightResponse>()
            .await
            .context("Failed to parse insight response")?;

        match data.insight.map(|text| text.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => anyhow::bail!("Insight response contained no text"),
        }
    }
}

/// Used when no insight endpoint is configured; every request reports failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledInsightGenerator;

#[async_trait]
impl InsightGenerator for DisabledInsightGenerator {
    async fn generate(&self, _request: &InsightRequest) -> Result<String> {
        anyhow::bail!("insight endpoint not configured")
    }
}
