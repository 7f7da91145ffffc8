// src/backends/mod.rs
use crate::config::CredentialStore;
use crate::session::Session;
use crate::types::{BackendInfo, Config, LookupResult, Query, RustReconError};
use async_trait::async_trait;
use log::warn;
use std::time::Duration;

mod breach;
mod crypto;
mod dns;
mod dorks;
mod emailcheck;
mod portscan;
mod presence;
mod whois;

pub use breach::BreachBackend;
pub use crypto::CryptoBackend;
pub use dns::DnsBackend;
pub use dorks::DorkBackend;
pub use emailcheck::EmailCheckBackend;
pub use portscan::PortScanBackend;
pub use presence::PresenceBackend;
pub use whois::WhoisBackend;

/// One pluggable lookup unit. A backend turns a resolved query into zero or
/// more LookupResults (the port prober returns one per open port). Backends
/// hold no mutable state; rate accounting lives in the session's gate and is
/// acquired by the engine before invoke.
#[async_trait]
pub trait Backend: Send + Sync {
    fn backend_id(&self) -> &str;
    fn info(&self) -> BackendInfo;
    fn declared_timeout(&self) -> Duration;
    async fn invoke(
        &self,
        query: &Query,
        session: &Session,
    ) -> Result<Vec<LookupResult>, RustReconError>;
    fn clone_backend(&self) -> Box<dyn Backend>;
}

pub fn create_backend(
    name: &str,
    config: &Config,
    credentials: &CredentialStore,
) -> Option<Box<dyn Backend>> {
    let timeout = config.timeout_for(name);

    match name.to_lowercase().as_str() {
        "whois" => Some(Box::new(WhoisBackend::new().with_timeout(timeout))),
        "dns" => match DnsBackend::new(&config.resolver) {
            Ok(backend) => Some(Box::new(backend.with_timeout(timeout))),
            Err(e) => {
                warn!("Failed to initialize dns backend: {}", e);
                None
            }
        },
        "presence" => Some(Box::new(
            PresenceBackend::new(config.presence.negative_phrases.clone()).with_timeout(timeout),
        )),
        "emailcheck" => match EmailCheckBackend::new(&config.resolver) {
            Ok(backend) => Some(Box::new(backend.with_timeout(timeout))),
            Err(e) => {
                warn!("Failed to initialize emailcheck backend: {}", e);
                None
            }
        },
        "breach" => Some(Box::new(
            BreachBackend::new()
                .with_api_keys(credentials.keys_for("breach").to_vec())
                .with_timeout(timeout),
        )),
        "portscan" => Some(Box::new(
            PortScanBackend::new(config.portscan.clone()).with_timeout(timeout),
        )),
        "crypto" => Some(Box::new(CryptoBackend::new(
            config.templates.explorers.clone(),
        ))),
        "dorks" => Some(Box::new(DorkBackend::new())),
        _ => None,
    }
}

pub fn get_all_backends(config: &Config, credentials: &CredentialStore) -> Vec<Box<dyn Backend>> {
    config
        .backends
        .iter()
        .filter_map(|name| create_backend(name, config, credentials))
        .collect()
}

pub fn requires_api_key(backend_name: &str) -> bool {
    matches!(backend_name.to_lowercase().as_str(), "breach")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    #[test]
    fn test_create_backend() {
        let config = Config::default();
        let credentials = CredentialStore::empty();

        let backend = create_backend("whois", &config, &credentials);
        assert!(backend.is_some());

        let backend = create_backend("invalid", &config, &credentials);
        assert!(backend.is_none());
    }

    #[test]
    fn test_backend_timeout_override() {
        let mut config = Config::default();
        config
            .timeouts
            .insert("whois".to_string(), Duration::from_secs(5));
        let credentials = CredentialStore::empty();

        let backend = create_backend("whois", &config, &credentials).unwrap();
        assert_eq!(backend.declared_timeout(), Duration::from_secs(5));

        let backend = create_backend("presence", &config, &credentials).unwrap();
        assert_eq!(backend.declared_timeout(), config.timeout);
    }

    #[test]
    fn test_requires_api_key() {
        assert!(requires_api_key("breach"));
        assert!(!requires_api_key("whois"));
        assert!(!requires_api_key("invalid"));
    }

    #[tokio::test]
    async fn test_get_all_backends() {
        let config = Config::default();
        let credentials = CredentialStore::empty();
        let backends = get_all_backends(&config, &credentials);
        assert_eq!(backends.len(), config.backends.len());
    }
}
