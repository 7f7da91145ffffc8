// src/backends/dns.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, Query, ResolverSettings, RustReconError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use trust_dns_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;

const RECORD_TYPES: &[(RecordType, &str)] = &[
    (RecordType::A, "a"),
    (RecordType::AAAA, "aaaa"),
    (RecordType::MX, "mx"),
    (RecordType::NS, "ns"),
    (RecordType::TXT, "txt"),
    (RecordType::CNAME, "cname"),
    (RecordType::SOA, "soa"),
];

/// DNS record enumeration. Queries with the `subdomain` template id come
/// from the wordlist sweep and only need address resolution; everything else
/// gets the full record-type walk.
#[derive(Clone)]
pub struct DnsBackend {
    name: String,
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsBackend {
    pub fn new(settings: &ResolverSettings) -> Result<Self, RustReconError> {
        let resolver = if settings.use_system_resolver {
            TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
                RustReconError::ConfigError(format!("Failed to create system resolver: {}", e))
            })?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &settings.nameservers {
                let socket_addr = SocketAddr::from_str(ns).map_err(|e| {
                    RustReconError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e))
                })?;
                resolver_config.add_name_server(NameServerConfig {
                    socket_addr,
                    protocol: Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            let mut opts = ResolverOpts::default();
            opts.timeout = settings.timeout;
            opts.attempts = 2;

            TokioAsyncResolver::tokio(resolver_config, opts)
        };

        Ok(Self {
            name: "dns".to_string(),
            resolver,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn resolve_address(&self, query: &Query) -> Result<Vec<LookupResult>, RustReconError> {
        match self.resolver.lookup_ip(query.resolved.as_str()).await {
            Ok(lookup) => {
                let ips: Vec<String> = lookup.iter().map(|ip| ip.to_string()).collect();
                if ips.is_empty() {
                    return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
                }
                let mut payload = BTreeMap::new();
                payload.insert("ip_addresses".to_string(), json!(ips));
                Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    Ok(vec![LookupResult::not_found(&self.name, query.clone())])
                }
                _ => Err(RustReconError::TransportError(e.to_string())),
            },
        }
    }

    async fn enumerate_records(&self, query: &Query) -> Result<Vec<LookupResult>, RustReconError> {
        let mut payload: BTreeMap<String, Value> = BTreeMap::new();
        let mut total = 0usize;

        for (record_type, label) in RECORD_TYPES {
            match self.resolver.lookup(query.resolved.as_str(), *record_type).await {
                Ok(lookup) => {
                    let records: Vec<String> =
                        lookup.iter().map(|rdata| rdata.to_string()).collect();
                    if !records.is_empty() {
                        total += records.len();
                        payload.insert(label.to_string(), json!(records));
                    }
                }
                Err(e) => match e.kind() {
                    // NXDOMAIN and empty answers both land here; the type
                    // simply contributes no records.
                    ResolveErrorKind::NoRecordsFound { .. } => {}
                    _ => return Err(RustReconError::TransportError(e.to_string())),
                },
            }
        }

        if total == 0 {
            return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
        }

        payload.insert("record_count".to_string(), json!(total));
        Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
    }
}

#[async_trait]
impl Backend for DnsBackend {
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
        _session: &Session,
    ) -> Result<Vec<LookupResult>, RustReconError> {
        if query.template_id == "subdomain" {
            self.resolve_address(query).await
        } else {
            self.enumerate_records(query).await
        }
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolverSettings;

    #[tokio::test]
    async fn test_backend_construction() {
        let backend = DnsBackend::new(&ResolverSettings::default()).unwrap();
        assert_eq!(backend.backend_id(), "dns");
        assert!(!backend.info().needs_key);
    }

    #[tokio::test]
    async fn test_invalid_nameserver_rejected() {
        let settings = ResolverSettings {
            nameservers: vec!["not-an-address".to_string()],
            ..Default::default()
        };
        assert!(DnsBackend::new(&settings).is_err());
    }
}
