// src/normalize.rs
use crate::types::{InvestigationRecord, LookupResult};
use serde_json::json;

/// Map one backend outcome onto the uniform record shape. Every payload key
/// is carried over untouched; error detail (when present) lands under the
/// reserved `error`/`error_kind` keys. The timestamp reflects normalization
/// (completion), not dispatch.
pub fn normalize(result: &LookupResult, module: &str) -> InvestigationRecord {
    let mut data = result.payload.clone();
    if let Some(detail) = &result.error {
        data.insert("error_kind".to_string(), json!(detail.kind));
        data.insert("error".to_string(), json!(detail.message));
    }

    InvestigationRecord {
        target: result.query.target.normalized.clone(),
        module: module.to_string(),
        backend: result.backend_id.clone(),
        query: result.query.resolved.clone(),
        status: result.status,
        data,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;
    use crate::types::{ErrorDetail, LookupStatus, Query};
    use std::collections::BTreeMap;

    fn sample_result() -> LookupResult {
        let target = parse_target("example.com", None).unwrap();
        let query = Query {
            resolved: "example.com".to_string(),
            template_id: "target".to_string(),
            target,
        };
        let mut payload = BTreeMap::new();
        payload.insert("registrar".to_string(), json!("Example Registrar"));
        payload.insert("name_servers".to_string(), json!(["ns1.example.com"]));
        payload.insert("x_extra_field".to_string(), json!({"nested": 1}));
        LookupResult::success("whois", query, payload)
    }

    #[test]
    fn test_every_payload_key_is_preserved() {
        let result = sample_result();
        let record = normalize(&result, "whois");

        for key in result.payload.keys() {
            assert!(record.data.contains_key(key), "dropped key {}", key);
        }
        assert_eq!(record.data["x_extra_field"], json!({"nested": 1}));
        assert_eq!(record.target, "example.com");
        assert_eq!(record.module, "whois");
        assert_eq!(record.backend, "whois");
    }

    #[test]
    fn test_deterministic_except_timestamp() {
        let result = sample_result();
        let mut a = normalize(&result, "whois");
        let mut b = normalize(&result, "whois");
        a.timestamp = String::new();
        b.timestamp = String::new();
        assert_eq!(a, b);

        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn test_error_detail_lands_in_data() {
        let mut result = sample_result();
        result.status = LookupStatus::Error;
        result.error = Some(ErrorDetail {
            kind: "Timeout".to_string(),
            message: "whois: deadline exceeded".to_string(),
        });

        let record = normalize(&result, "whois");
        assert_eq!(record.status, LookupStatus::Error);
        assert_eq!(record.data["error_kind"], json!("Timeout"));
        assert_eq!(record.data["error"], json!("whois: deadline exceeded"));
        // Original payload still intact alongside the detail.
        assert_eq!(record.data["registrar"], json!("Example Registrar"));
    }
}
