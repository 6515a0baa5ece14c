//! Decorative fact lookups against fixed public APIs.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::{debug, warn};

use filedeck_common::facts::FactKind;

#[derive(Debug, thiserror::Error)]
#[error("Failed to fetch {kind} fact")]
pub struct FactError {
    pub kind: FactKind,
    pub reason: String,
}

#[derive(Clone)]
pub struct FactFetcher {
    client: Client,
    endpoints: HashMap<FactKind, String>,
}

impl FactFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let endpoints = FactKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.endpoint().to_string()))
            .collect();
        Ok(Self { client, endpoints })
    }

    /// Point one kind at a different endpoint.
    pub fn with_endpoint(mut self, kind: FactKind, url: impl Into<String>) -> Self {
        self.endpoints.insert(kind, url.into());
        self
    }

    pub async fn fetch(&self, kind: FactKind) -> Result<String, FactError> {
        let url = self
            .endpoints
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.endpoint());

        match self.fetch_from(kind, url).await {
            Ok(fact) => {
                debug!(kind = %kind, "Fact fetched");
                Ok(fact)
            }
            Err(e) => {
                warn!(kind = %kind, url = %url, error = %e, "Fact fetch failed");
                Err(FactError {
                    kind,
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    async fn fetch_from(&self, kind: FactKind, url: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("Fact request failed")?;

        if !resp.status().is_success() {
            bail!("Fact API returned HTTP {}", resp.status());
        }

        let body: serde_json::Value = resp.json().await.context("Fact API returned invalid JSON")?;
        kind.extract(&body)
            .with_context(|| format!("Fact API response has no string at {}", kind.pointer()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_extracts_field() {
        let base = serve(Router::new().route(
            "/advice",
            get(|| async { Json(serde_json::json!({ "slip": { "id": 1, "advice": "Drink water." } })) }),
        ))
        .await;

        let fetcher = FactFetcher::new()
            .unwrap()
            .with_endpoint(FactKind::Advice, format!("{}/advice", base));
        assert_eq!(fetcher.fetch(FactKind::Advice).await.unwrap(), "Drink water.");
    }

    #[tokio::test]
    async fn test_missing_field_is_fetch_failure() {
        let base = serve(Router::new().route(
            "/kanye",
            get(|| async { Json(serde_json::json!({ "unexpected": true })) }),
        ))
        .await;

        let fetcher = FactFetcher::new()
            .unwrap()
            .with_endpoint(FactKind::Kanye, format!("{}/kanye", base));
        let err = fetcher.fetch(FactKind::Kanye).await.unwrap_err();
        assert_eq!(err.kind, FactKind::Kanye);
        assert_eq!(err.to_string(), "Failed to fetch kanye fact");
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_failure() {
        let base = serve(Router::new()).await;
        let fetcher = FactFetcher::new()
            .unwrap()
            .with_endpoint(FactKind::Cat, format!("{}/missing", base));
        assert!(fetcher.fetch(FactKind::Cat).await.is_err());
    }
}
