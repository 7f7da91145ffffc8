// src/backends/portscan.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, PortScanConfig, Query, RustReconError};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// TCP connect probe over the configured port set. Returns one result per
/// OPEN port; closed or filtered ports contribute nothing, so callers must
/// treat the return as zero-or-more.
#[derive(Debug, Clone)]
pub struct PortScanBackend {
    name: String,
    config: PortScanConfig,
    timeout: Duration,
}

impl PortScanBackend {
    pub fn new(config: PortScanConfig) -> Self {
        Self {
            name: "portscan".to_string(),
            config,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the configured port set, e.g. from --ports.
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.config.common_ports = ports;
        self
    }

    async fn resolve_address(&self, host: &str) -> Result<IpAddr, RustReconError> {
        if let Ok(ip) = IpAddr::from_str(host) {
            return Ok(ip);
        }
        let mut addrs = tokio::net::lookup_host(format!("{}:0", host))
            .await
            .map_err(|e| RustReconError::TransportError(format!("{}: {}", host, e)))?;
        addrs
            .next()
            .map(|sa| sa.ip())
            .ok_or_else(|| RustReconError::TransportError(format!("{}: no addresses", host)))
    }

    async fn probe(ip: IpAddr, port: u16, connect_timeout: Duration) -> (u16, bool) {
        let addr = SocketAddr::new(ip, port);
        let open = matches!(
            timeout(connect_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        );
        (port, open)
    }

    fn service_name(port: u16) -> &'static str {
        match port {
            21 => "ftp",
            22 => "ssh",
            23 => "telnet",
            25 => "smtp",
            53 => "dns",
            80 => "http",
            110 => "pop3",
            143 => "imap",
            443 => "https",
            993 => "imaps",
            995 => "pop3s",
            1433 => "mssql",
            3306 => "mysql",
            3389 => "rdp",
            5432 => "postgresql",
            5900 => "vnc",
            8080 => "http-alt",
            8443 => "https-alt",
            _ => "unknown",
        }
    }
}

#[async_trait]
impl Backend for PortScanBackend {
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
        let ip = self.resolve_address(&query.resolved).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for port in &self.config.common_ports {
            let port = *port;
            let semaphore = semaphore.clone();
            let connect_timeout = self.config.connect_timeout;
            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                Self::probe(ip, port, connect_timeout).await
            });
        }

        let mut open_ports = Vec::new();
        while let Some((port, open)) = futures.next().await {
            if open {
                open_ports.push(port);
            }
        }
        // Completion order is arbitrary; sort so results are deterministic.
        open_ports.sort_unstable();

        let results = open_ports
            .into_iter()
            .map(|port| {
                let mut payload = BTreeMap::new();
                payload.insert("address".to_string(), json!(ip.to_string()));
                payload.insert("port".to_string(), json!(port));
                payload.insert("protocol".to_string(), json!("tcp"));
                payload.insert("service".to_string(), json!(Self::service_name(port)));
                LookupResult::success(&self.name, query.clone(), payload)
            })
            .collect();

        Ok(results)
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}
