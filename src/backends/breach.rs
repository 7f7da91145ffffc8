// src/backends/breach.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, Query, RustReconError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

const HIBP_API: &str = "https://haveibeenpwned.com/api/v3";

#[derive(Debug, Deserialize)]
struct BreachEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "BreachDate", default)]
    breach_date: Option<String>,
    #[serde(rename = "PwnCount", default)]
    pwn_count: Option<u64>,
    #[serde(rename = "DataClasses", default)]
    data_classes: Vec<String>,
}

/// Have I Been Pwned breached-account lookup. Requires an API key; with no
/// key configured the call fails fast with MissingCredential before any
/// network traffic.
#[derive(Debug, Clone)]
pub struct BreachBackend {
    name: String,
    api_keys: Vec<String>,
    api_base: String,
    timeout: Duration,
}

impl Default for BreachBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BreachBackend {
    pub fn new() -> Self {
        Self {
            name: "breach".to_string(),
            api_keys: Vec::new(),
            api_base: HIBP_API.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(test)]
    fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base;
        self
    }

    fn get_random_api_key(&self) -> Option<&String> {
        if self.api_keys.is_empty() {
            None
        } else {
            use rand::seq::SliceRandom;
            self.api_keys.choose(&mut rand::thread_rng())
        }
    }
}

#[async_trait]
impl Backend for BreachBackend {
    fn backend_id(&self) -> &str {
        &self.name
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            needs_key: true,
            is_default: true,
        }
    }

    fn declared_timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(
        &self,
        query: &Query,
        session: &Session,
    ) -> Result<Vec<LookupResult>, RustReconError> {
        let api_key = self
            .get_random_api_key()
            .ok_or_else(|| RustReconError::MissingCredential(self.name.clone()))?;

        let url = format!(
            "{}/breachedaccount/{}?truncateResponse=false",
            self.api_base,
            urlencoding::encode(&query.resolved)
        );

        let response = session
            .client
            .get(&url)
            .header("hibp-api-key", api_key)
            .send()
            .await
            .map_err(|e| RustReconError::TransportError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            404 => Ok(vec![LookupResult::not_found(&self.name, query.clone())]),
            429 => Err(RustReconError::RateLimited(self.name.clone())),
            401 | 403 => Err(RustReconError::BackendError {
                backend_id: self.name.clone(),
                message: format!("API rejected credential: status {}", status),
            }),
            _ if status.is_success() => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| RustReconError::TransportError(e.to_string()))?;
                let entries: Vec<BreachEntry> = serde_json::from_str(&text)
                    .map_err(|e| RustReconError::ParseError(format!("{}\nBody: {}", e, text)))?;

                let breaches: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|b| {
                        json!({
                            "name": b.name,
                            "title": b.title,
                            "breach_date": b.breach_date,
                            "pwn_count": b.pwn_count,
                            "data_classes": b.data_classes,
                        })
                    })
                    .collect();

                let mut payload = BTreeMap::new();
                payload.insert("breach_count".to_string(), json!(entries.len()));
                payload.insert("breaches".to_string(), json!(breaches));
                Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
            }
            _ => Err(RustReconError::BackendError {
                backend_id: self.name.clone(),
                message: format!("API returned status: {}", status),
            }),
        }
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;
    use crate::types::{Config, LookupStatus};

    fn query() -> Query {
        let target = parse_target("victim@example.com", None).unwrap();
        Query {
            resolved: target.normalized.clone(),
            template_id: "target".to_string(),
            target,
        }
    }

    fn session() -> Session {
        Session::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        // Point at an unroutable base: if the backend ever tried the network
        // the error kind would differ.
        let backend = BreachBackend::new().with_api_base("http://127.0.0.1:1".to_string());
        let err = backend.invoke(&query(), &session()).await;
        assert!(matches!(err, Err(RustReconError::MissingCredential(_))));
    }

    #[tokio::test]
    async fn test_breached_account() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                "/breachedaccount/victim%40example.com?truncateResponse=false",
            )
            .match_header("hibp-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"[{"Name":"Adobe","Title":"Adobe","BreachDate":"2013-10-04","PwnCount":152445165,"DataClasses":["Email addresses","Passwords"]}]"#,
            )
            .create_async()
            .await;

        let backend = BreachBackend::new()
            .with_api_keys(vec!["test-key".to_string()])
            .with_api_base(server.url());
        let results = backend.invoke(&query(), &session()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, LookupStatus::Success);
        assert_eq!(results[0].payload["breach_count"], json!(1));
    }

    #[tokio::test]
    async fn test_clean_account_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                "/breachedaccount/victim%40example.com?truncateResponse=false",
            )
            .with_status(404)
            .create_async()
            .await;

        let backend = BreachBackend::new()
            .with_api_keys(vec!["test-key".to_string()])
            .with_api_base(server.url());
        let results = backend.invoke(&query(), &session()).await.unwrap();

        assert_eq!(results[0].status, LookupStatus::NotFound);
    }

    #[tokio::test]
    async fn test_quota_response_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                "/breachedaccount/victim%40example.com?truncateResponse=false",
            )
            .with_status(429)
            .create_async()
            .await;

        let backend = BreachBackend::new()
            .with_api_keys(vec!["test-key".to_string()])
            .with_api_base(server.url());
        let err = backend.invoke(&query(), &session()).await;

        assert!(matches!(err, Err(RustReconError::RateLimited(_))));
    }
}
