// src/target.rs
use crate::types::{RustReconError, Target, TargetKind};
use regex::Regex;
use std::net::IpAddr;
use std::str::FromStr;
use url::Url;

/// Build a Target from raw user input, inferring the kind when none is forced.
pub fn parse_target(raw: &str, forced_kind: Option<TargetKind>) -> Result<Target, RustReconError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RustReconError::InvalidTarget("empty target".to_string()));
    }

    let kind = match forced_kind {
        Some(kind) => kind,
        None => infer_kind(trimmed),
    };

    Ok(Target {
        raw: trimmed.to_string(),
        kind,
        normalized: normalize(trimmed, kind),
    })
}

/// Inference order matters: email and IP shapes are unambiguous, crypto
/// addresses never contain dots, and anything left that looks like a
/// hostname is a domain. The remainder is treated as a username.
pub fn infer_kind(raw: &str) -> TargetKind {
    if is_email(raw) {
        return TargetKind::Email;
    }
    if IpAddr::from_str(raw).is_ok() {
        return TargetKind::Ip;
    }
    if is_phone(raw) {
        return TargetKind::Phone;
    }
    if is_crypto_address(raw) {
        return TargetKind::Crypto;
    }
    if let Some(host) = host_from_url(raw) {
        if is_valid_domain(&host) {
            return TargetKind::Domain;
        }
    }
    if is_valid_domain(raw) {
        return TargetKind::Domain;
    }
    TargetKind::Username
}

fn normalize(raw: &str, kind: TargetKind) -> String {
    match kind {
        TargetKind::Email => raw.to_lowercase(),
        TargetKind::Domain => host_from_url(raw)
            .unwrap_or_else(|| raw.to_string())
            .to_lowercase(),
        TargetKind::Username => raw.trim_start_matches('@').to_string(),
        TargetKind::Phone => raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect(),
        TargetKind::Ip => IpAddr::from_str(raw)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        TargetKind::Crypto => raw.to_string(),
    }
}

pub fn is_email(s: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email regex is valid");
    re.is_match(s)
}

/// International form only: leading +, then 7 to 15 digits, with common
/// separators tolerated.
pub fn is_phone(s: &str) -> bool {
    if !s.starts_with('+') {
        return false;
    }
    let digits: String = s[1..]
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    digits.len() >= 7 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Legacy base58 (1... / 3...) or bech32 (bc1...) Bitcoin address shapes.
pub fn is_crypto_address(s: &str) -> bool {
    let base58 = Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("base58 regex is valid");
    let bech32 = Regex::new(r"^bc1[a-z0-9]{11,71}$").expect("bech32 regex is valid");
    base58.is_match(s) || bech32.is_match(s)
}

/// Extract the hostname when the input is a URL rather than a bare domain.
fn host_from_url(s: &str) -> Option<String> {
    if !s.contains("://") {
        return None;
    }
    Url::parse(s)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    for part in parts {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        if !part.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }

        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }
    }

    true
}

/// Filesystem-safe form of a target for result file names.
pub fn sanitize_for_filename(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("sub.example.com"));
        assert!(!is_valid_domain("example"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("-example.com"));
        assert!(!is_valid_domain("example-.com"));
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("john.doe@example.com"), TargetKind::Email);
        assert_eq!(infer_kind("192.168.1.1"), TargetKind::Ip);
        assert_eq!(infer_kind("2001:db8::1"), TargetKind::Ip);
        assert_eq!(infer_kind("+14155552671"), TargetKind::Phone);
        assert_eq!(infer_kind("example.com"), TargetKind::Domain);
        assert_eq!(infer_kind("https://example.com/path"), TargetKind::Domain);
        assert_eq!(infer_kind("johndoe123"), TargetKind::Username);
        assert_eq!(
            infer_kind("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            TargetKind::Crypto
        );
        assert_eq!(
            infer_kind("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"),
            TargetKind::Crypto
        );
    }

    #[test]
    fn test_normalize() {
        let t = parse_target("@JohnDoe", Some(TargetKind::Username)).unwrap();
        assert_eq!(t.normalized, "JohnDoe");

        let t = parse_target("John.Doe@Example.COM", None).unwrap();
        assert_eq!(t.kind, TargetKind::Email);
        assert_eq!(t.normalized, "john.doe@example.com");

        let t = parse_target("+1 (415) 555-2671", None).unwrap();
        assert_eq!(t.kind, TargetKind::Phone);
        assert_eq!(t.normalized, "+14155552671");

        let t = parse_target("https://Example.com/login", None).unwrap();
        assert_eq!(t.normalized, "example.com");
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(parse_target("  ", None).is_err());
    }

    #[test]
    fn test_sanitize_for_filename() {
        assert_eq!(
            sanitize_for_filename("john.doe@example.com"),
            "john.doe_example.com"
        );
        assert_eq!(sanitize_for_filename("+1415555"), "_1415555");
    }
}
