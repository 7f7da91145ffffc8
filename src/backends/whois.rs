// src/backends/whois.rs
use crate::backends::Backend;
use crate::session::Session;
use crate::types::{BackendInfo, LookupResult, Query, RustReconError};
use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const IANA_WHOIS: &str = "whois.iana.org";

const NOT_FOUND_MARKERS: &[&str] = &[
    "no match for",
    "not found",
    "no entries found",
    "no data found",
    "the queried object does not exist",
];

/// WHOIS lookup over the native port-43 protocol. The IANA root is queried
/// first and its referral followed once to the authoritative registry.
#[derive(Debug, Clone)]
pub struct WhoisBackend {
    name: String,
    timeout: Duration,
}

impl Default for WhoisBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisBackend {
    pub fn new() -> Self {
        Self {
            name: "whois".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn raw_query(server: &str, query: &str) -> Result<String, RustReconError> {
        let mut stream = TcpStream::connect((server, 43))
            .await
            .map_err(|e| RustReconError::TransportError(format!("{}: {}", server, e)))?;

        stream
            .write_all(format!("{}\r\n", query).as_bytes())
            .await
            .map_err(|e| RustReconError::TransportError(format!("{}: {}", server, e)))?;

        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(|e| RustReconError::TransportError(format!("{}: {}", server, e)))?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Value after `key:` on one line, matched case-insensitively. Registry
    /// responses are ASCII in the label part but not always in values, so
    /// the prefix check avoids byte slicing across char boundaries.
    fn line_value<'a>(line: &'a str, needle: &str) -> Option<&'a str> {
        let trimmed = line.trim();
        let prefix = trimmed.get(..needle.len())?;
        if prefix.eq_ignore_ascii_case(needle) {
            let value = trimmed[needle.len()..].trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
        None
    }

    /// First value of a `key: value` line.
    fn field(response: &str, key: &str) -> Option<String> {
        let needle = format!("{}:", key);
        response
            .lines()
            .find_map(|line| Self::line_value(line, &needle).map(|v| v.to_string()))
    }

    /// All values of a repeated `key: value` line (name servers, status).
    fn fields(response: &str, key: &str) -> Vec<String> {
        let needle = format!("{}:", key);
        response
            .lines()
            .filter_map(|line| Self::line_value(line, &needle).map(|v| v.to_string()))
            .collect()
    }

    fn parse_payload(response: &str) -> BTreeMap<String, Value> {
        let mut payload = BTreeMap::new();

        let scalar_fields = [
            ("registrar", "Registrar"),
            ("creation_date", "Creation Date"),
            ("expiration_date", "Registry Expiry Date"),
            ("updated_date", "Updated Date"),
            ("registrant_organization", "Registrant Organization"),
            ("registrant_country", "Registrant Country"),
            // RIR responses for IP targets use a different vocabulary.
            ("net_name", "NetName"),
            ("org_name", "OrgName"),
            ("country", "Country"),
        ];
        for (key, label) in scalar_fields {
            if let Some(value) = Self::field(response, label) {
                payload.insert(key.to_string(), json!(value));
            }
        }

        let name_servers = Self::fields(response, "Name Server");
        if !name_servers.is_empty() {
            let lowered: Vec<String> = name_servers.iter().map(|s| s.to_lowercase()).collect();
            payload.insert("name_servers".to_string(), json!(lowered));
        }

        let status = Self::fields(response, "Domain Status");
        if !status.is_empty() {
            payload.insert("status".to_string(), json!(status));
        }

        payload
    }
}

#[async_trait]
impl Backend for WhoisBackend {
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
        let subject = &query.resolved;

        let root = Self::raw_query(IANA_WHOIS, subject).await?;
        let response = match Self::field(&root, "refer") {
            Some(server) => {
                debug!("[{}] {} referred to {}", self.name, subject, server);
                Self::raw_query(&server, subject).await?
            }
            None => root,
        };

        let lowered = response.to_lowercase();
        if NOT_FOUND_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Ok(vec![LookupResult::not_found(&self.name, query.clone())]);
        }

        let payload = Self::parse_payload(&response);
        if payload.is_empty() {
            return Err(RustReconError::ParseError(format!(
                "no structured WHOIS fields in response for {}",
                subject
            )));
        }

        Ok(vec![LookupResult::success(&self.name, query.clone(), payload)])
    }

    fn clone_backend(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Domain Name: EXAMPLE.COM
Registrar: Example Registrar, Inc.
Creation Date: 1995-08-14T04:00:00Z
Registry Expiry Date: 2026-08-13T04:00:00Z
Updated Date: 2025-08-14T07:01:44Z
Domain Status: clientDeleteProhibited
Domain Status: clientTransferProhibited
Name Server: A.IANA-SERVERS.NET
Name Server: B.IANA-SERVERS.NET
";

    #[test]
    fn test_parse_structured_fields() {
        let payload = WhoisBackend::parse_payload(SAMPLE);
        assert_eq!(payload["registrar"], json!("Example Registrar, Inc."));
        assert_eq!(payload["creation_date"], json!("1995-08-14T04:00:00Z"));
        assert_eq!(
            payload["name_servers"],
            json!(["a.iana-servers.net", "b.iana-servers.net"])
        );
        assert_eq!(
            payload["status"],
            json!(["clientDeleteProhibited", "clientTransferProhibited"])
        );
    }

    #[test]
    fn test_field_is_case_insensitive() {
        assert_eq!(
            WhoisBackend::field("registrar: Foo\n", "Registrar"),
            Some("Foo".to_string())
        );
        assert_eq!(WhoisBackend::field("Other: Foo\n", "Registrar"), None);
    }

    #[test]
    fn test_referral_field() {
        let root = "refer:        whois.verisign-grs.com\ndomain: COM\n";
        assert_eq!(
            WhoisBackend::field(root, "refer"),
            Some("whois.verisign-grs.com".to_string())
        );
    }

    #[test]
    fn test_unparseable_response_has_empty_payload() {
        let payload = WhoisBackend::parse_payload(">>> garbage <<<");
        assert!(payload.is_empty());
    }
}
