// src/backends/emailcheck.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::target::is_email;
use crate::types::{BackendInfo, LookupResult, Query, ResolverSettings, RustReconError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use trust_dns_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Deliverability check for one candidate address: syntactic validation plus
/// an MX lookup on the domain part. NotFound means the address cannot
/// receive mail (bad shape or no MX); Success carries the MX set.
#[derive(Clone)]
pub struct EmailCheckBackend {
    name: String,
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl EmailCheckBackend {
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
            TokioAsyncResolver::tokio(resolver_config, opts)
        };

        Ok(Self {
            name: "emailcheck".to_string(),
            resolver,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Backend for EmailCheckBackend {
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
        let address = &query.resolved;

        if !is_email(address) {
            return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
        }
        let domain = address
            .split_once('@')
            .map(|(_, d)| d)
            .ok_or_else(|| RustReconError::ParseError(format!("no domain in {}", address)))?;

        let mx_records = match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_string().to_lowercase()))
                    .collect();
                records.sort();
                records
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Vec::new(),
                _ => return Err(RustReconError::TransportError(e.to_string())),
            },
        };

        if mx_records.is_empty() {
            return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
        }

        let exchanges: Vec<String> = mx_records.iter().map(|(_, ex)| ex.clone()).collect();
        let mut payload = BTreeMap::new();
        payload.insert("address".to_string(), json!(address));
        payload.insert("domain".to_string(), json!(domain));
        payload.insert("valid_format".to_string(), json!(true));
        payload.insert("mx_records".to_string(), json!(exchanges));
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
    use crate::types::{Config, LookupStatus, TargetKind};

    fn session() -> Session {
        Session::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_address_is_not_found_without_network() {
        // A resolver pointed at a dead loopback port: a NotFound here proves
        // the syntactic check short-circuits before any lookup.
        let settings = ResolverSettings {
            nameservers: vec!["127.0.0.1:1".to_string()],
            timeout: Duration::from_millis(100),
            use_system_resolver: false,
        };
        let backend = EmailCheckBackend::new(&settings).unwrap();

        let target = parse_target("not-an-email", Some(TargetKind::Email)).unwrap();
        let query = Query {
            resolved: target.normalized.clone(),
            template_id: "target".to_string(),
            target,
        };
        let results = backend.invoke(&query, &session()).await.unwrap();
        assert_eq!(results[0].status, LookupStatus::NotFound);
    }
}
