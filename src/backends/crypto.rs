// src/backends/crypto.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::target::is_crypto_address;
use crate::types::{BackendInfo, LookupResult, Query, RustReconError, Template};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// Crypto-address triage: validates the address shape and expands the
/// configured block-explorer link templates. Pure — no network call, so no
/// rate policy or timeout pressure applies.
#[derive(Debug, Clone)]
pub struct CryptoBackend {
    name: String,
    explorers: Vec<Template>,
}

impl CryptoBackend {
    pub fn new(explorers: Vec<Template>) -> Self {
        Self {
            name: "crypto".to_string(),
            explorers,
        }
    }

    fn address_type(address: &str) -> &'static str {
        if address.starts_with("bc1") {
            "bech32"
        } else if address.starts_with('3') {
            "p2sh"
        } else {
            "p2pkh"
        }
    }
}

#[async_trait]
impl Backend for CryptoBackend {
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
        let address = &query.resolved;

        if !is_crypto_address(address) {
            return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
        }

        let links: Vec<serde_json::Value> = self
            .explorers
            .iter()
            .map(|t| {
                json!({
                    "explorer": t.id,
                    "url": t.pattern.replace("{address}", address),
                })
            })
            .collect();

        let mut payload = BTreeMap::new();
        payload.insert("address".to_string(), json!(address));
        payload.insert(
            "address_type".to_string(),
            json!(Self::address_type(address)),
        );
        payload.insert("explorers".to_string(), json!(links));
        Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;
    use crate::types::{Config, LookupStatus, TargetKind, TemplateConfig};

    fn session() -> Session {
        Session::new(&Config::default()).unwrap()
    }

    fn backend() -> CryptoBackend {
        CryptoBackend::new(TemplateConfig::default().explorers)
    }

    fn query_for(address: &str) -> Query {
        let target = parse_target(address, Some(TargetKind::Crypto)).unwrap();
        Query {
            resolved: target.normalized.clone(),
            template_id: "target".to_string(),
            target,
        }
    }

    #[tokio::test]
    async fn test_valid_address_gets_explorer_links() {
        let query = query_for("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
        let results = backend().invoke(&query, &session()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, LookupStatus::Success);
        assert_eq!(results[0].payload["address_type"], json!("p2pkh"));
        let explorers = results[0].payload["explorers"].as_array().unwrap();
        assert_eq!(explorers.len(), 3);
        assert!(explorers[0]["url"]
            .as_str()
            .unwrap()
            .contains("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
    }

    #[tokio::test]
    async fn test_bech32_type() {
        let query = query_for("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq");
        let results = backend().invoke(&query, &session()).await.unwrap();
        assert_eq!(results[0].payload["address_type"], json!("bech32"));
    }

    #[tokio::test]
    async fn test_invalid_address_is_not_found() {
        let query = query_for("definitely-not-an-address");
        let results = backend().invoke(&query, &session()).await.unwrap();
        assert_eq!(results[0].status, LookupStatus::NotFound);
    }
}
