//! HTTP client for the optional free-text advisor backend
//!
//! Best-effort only: routing, ranking and dedup never depend on this
//! output. Absence or failure drops the RESEARCH section, nothing else.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AdvisorClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

impl AdvisorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Free-text narration for a query. Untrusted enrichment; callers treat
    /// any error as "no research section".
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/generate", self.base_url);
        debug!("Requesting advisor narration from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest { prompt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Advisor error {}: {}", status, body);
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.text)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a running advisor backend
    async fn advisor_health_check_integration() {
        let client = AdvisorClient::new("http://127.0.0.1:8087");
        let health = client.health_check().await;
        assert!(health.is_ok());
    }
}
