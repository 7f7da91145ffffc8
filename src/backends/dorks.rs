// src/backends/dorks.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, Query, RustReconError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// Search-engine link builder. The expander has already resolved the
/// `{query}` placeholder into the engine URL; this backend just materializes
/// the record. Pure — the investigator opens the links, not the tool.
#[derive(Debug, Clone)]
pub struct DorkBackend {
    name: String,
}

impl Default for DorkBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DorkBackend {
    pub fn new() -> Self {
        Self {
            name: "dorks".to_string(),
        }
    }
}

#[async_trait]
impl Backend for DorkBackend {
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
        Duration::from_secs(5)
    }

    async fn invoke(
        &self,
        query: &Query,
        _session: &Session,
    ) -> Result<Vec<LookupResult>, RustReconError> {
        let mut payload = BTreeMap::new();
        payload.insert("engine".to_string(), json!(query.template_id));
        payload.insert("url".to_string(), json!(query.resolved));
        Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}
