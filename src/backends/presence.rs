// src/backends/presence.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, Query, RustReconError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// Existence probe for one platform profile URL. The signal is two-staged:
/// HTTP 200 whose body carries none of the configured negative phrases means
/// the profile exists; 200 with a negative phrase, or 404/410, means it does
/// not. Anything else (403, 429, 5xx, unreadable body) is non-conclusive and
/// reported as an error, never coerced to found/not-found.
#[derive(Debug, Clone)]
pub struct PresenceBackend {
    name: String,
    negative_phrases: Vec<String>,
    timeout: Duration,
}

impl PresenceBackend {
    pub fn new(negative_phrases: Vec<String>) -> Self {
        Self {
            name: "presence".to_string(),
            negative_phrases: negative_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn body_is_negative(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        self.negative_phrases.iter().any(|p| lowered.contains(p))
    }

    fn result(&self, query: &Query, found: bool, status_code: u16) -> LookupResult {
        let mut payload = BTreeMap::new();
        payload.insert("platform".to_string(), json!(query.template_id));
        payload.insert("url".to_string(), json!(query.resolved));
        payload.insert("found".to_string(), json!(found));
        payload.insert("status_code".to_string(), json!(status_code));
        LookupResult::success(&self.name, query.clone(), payload)
    }
}

#[async_trait]
impl Backend for PresenceBackend {
    fn backend_id(&self) -> &str {
        &self.name
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            needs_key: false,
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
        // One retry absorbs transient connection failures; HTTP-level
        // responses are never retried.
        let response = session.get_with_retry(&query.resolved, 1).await?;
        let status = response.status();

        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Ok(vec![self.result(query, false, status.as_u16())]);
        }

        if status.is_success() {
            let body = response.text().await.map_err(|e| {
                RustReconError::BackendError {
                    backend_id: self.name.clone(),
                    message: format!("unreadable body from {}: {}", query.resolved, e),
                }
            })?;
            let found = !self.body_is_negative(&body);
            return Ok(vec![self.result(query, found, status.as_u16())]);
        }

        // 403, 429, 5xx and friends: the platform answered but the signal is
        // ambiguous. Surface the diagnostic instead of guessing.
        Err(RustReconError::BackendError {
            backend_id: self.name.clone(),
            message: format!(
                "non-conclusive response from {} ({}): status {}",
                query.template_id, query.resolved, status
            ),
        })
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}
