// src/session.rs
use crate::ratelimit::RateGate;
use crate::types::{Config, RustReconError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared per-investigation state: one HTTP client and the per-backend rate
/// gate. Cheap to clone; all clones share the same budgets.
#[derive(Clone)]
pub struct Session {
    pub client: Client,
    gate: Arc<RateGate>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, RustReconError> {
        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| RustReconError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(|e| {
            RustReconError::ConfigError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Session {
            client,
            gate: Arc::new(RateGate::new(&config.rate_limits)),
        })
    }

    /// Admission check for one backend call; see RateGate for the policy
    /// split between blocking and rejecting classes.
    pub async fn acquire(&self, backend_id: &str) -> Result<(), RustReconError> {
        self.gate.acquire(backend_id).await
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, RustReconError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| RustReconError::TransportError(e.to_string()))
    }

    pub async fn get_with_retry(
        &self,
        url: &str,
        max_retries: u32,
    ) -> Result<reqwest::Response, RustReconError> {
        let mut retries = 0;
        loop {
            match self.get(url).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if retries >= max_retries {
                        return Err(e);
                    }
                    retries += 1;

                    // Exponential backoff
                    let delay = Duration::from_millis(100 * 2u64.pow(retries));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn get_json<T>(&self, url: &str) -> Result<T, RustReconError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.get(url).await?;

        if !response.status().is_success() {
            return Err(RustReconError::TransportError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RustReconError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        ok: bool,
    }

    #[tokio::test]
    async fn test_get_json() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/probe")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let session = Session::new(&Config::default()).unwrap();
        let probe: Probe = session
            .get_json(&format!("{}/probe", server.url()))
            .await
            .unwrap();
        assert!(probe.ok);
    }

    #[tokio::test]
    async fn test_get_json_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/probe")
            .with_status(500)
            .create_async()
            .await;

        let session = Session::new(&Config::default()).unwrap();
        let result: Result<Probe, _> = session.get_json(&format!("{}/probe", server.url())).await;
        assert!(matches!(result, Err(RustReconError::TransportError(_))));
    }

    #[tokio::test]
    async fn test_acquire_unknown_backend_is_ungated() {
        let session = Session::new(&Config::default()).unwrap();
        assert!(session.acquire("nonexistent").await.is_ok());
    }
}
