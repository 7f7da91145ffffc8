// src/config.rs
use crate::types::{Config, OutputFormat, RatePolicy, RustReconError, Template};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk shape of config.toml. Everything is optional; whatever is present
/// overrides the built-in defaults. Durations are plain seconds.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    proxy: Option<String>,
    max_threads: Option<usize>,
    backends: Option<Vec<String>>,
    #[serde(default)]
    rate_limits: HashMap<String, RawRatePolicy>,
    #[serde(default)]
    timeouts_secs: HashMap<String, u64>,
    templates: Option<RawTemplates>,
    presence: Option<RawPresence>,
    portscan: Option<RawPortScan>,
    resolver: Option<RawResolver>,
    output: Option<RawOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
enum RawRatePolicy {
    Smooth { per_second: u32 },
    Quota { limit: u32, window_secs: u64 },
}

#[derive(Debug, Deserialize)]
struct RawTemplates {
    platforms: Option<HashMap<String, String>>,
    email_patterns: Option<HashMap<String, String>>,
    search_engines: Option<HashMap<String, String>>,
    explorers: Option<HashMap<String, String>>,
    subdomain_words: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPresence {
    negative_phrases: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPortScan {
    common_ports: Option<Vec<u16>>,
    connect_timeout_secs: Option<u64>,
    parallelism: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawResolver {
    nameservers: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    use_system_resolver: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    format: Option<String>,
    results_dir: Option<PathBuf>,
    save_results: Option<bool>,
    verbose: Option<bool>,
}

pub fn load_config(config_path: Option<&str>) -> Result<Config, RustReconError> {
    let mut config = Config::default();

    if let Some(path_str) = config_path {
        let path = Path::new(path_str);
        if !path.exists() {
            return Err(RustReconError::ConfigError(format!(
                "Config file not found: {}",
                path_str
            )));
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| RustReconError::ConfigError(format!("Failed to read config: {}", e)))?;
        let raw: RawConfig = toml::from_str(&contents)
            .map_err(|e| RustReconError::ConfigError(format!("Failed to parse config: {}", e)))?;
        apply_raw(&mut config, raw);
    }

    validate_config(&config)?;
    Ok(config)
}

fn apply_raw(config: &mut Config, raw: RawConfig) {
    if let Some(secs) = raw.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(ua) = raw.user_agent {
        config.user_agent = ua;
    }
    if raw.proxy.is_some() {
        config.proxy = raw.proxy;
    }
    if let Some(threads) = raw.max_threads {
        config.max_threads = threads;
    }
    if let Some(backends) = raw.backends {
        config.backends = backends;
    }
    for (backend, policy) in raw.rate_limits {
        let policy = match policy {
            RawRatePolicy::Smooth { per_second } => RatePolicy::Smooth { per_second },
            RawRatePolicy::Quota { limit, window_secs } => RatePolicy::Quota {
                limit,
                window: Duration::from_secs(window_secs),
            },
        };
        config.rate_limits.insert(backend, policy);
    }
    for (backend, secs) in raw.timeouts_secs {
        config.timeouts.insert(backend, Duration::from_secs(secs));
    }
    if let Some(templates) = raw.templates {
        if let Some(platforms) = templates.platforms {
            config.templates.platforms = to_templates(platforms);
        }
        if let Some(patterns) = templates.email_patterns {
            config.templates.email_patterns = to_templates(patterns);
        }
        if let Some(engines) = templates.search_engines {
            config.templates.search_engines = to_templates(engines);
        }
        if let Some(explorers) = templates.explorers {
            config.templates.explorers = to_templates(explorers);
        }
        if let Some(words) = templates.subdomain_words {
            config.templates.subdomain_words = words;
        }
    }
    if let Some(presence) = raw.presence {
        if let Some(phrases) = presence.negative_phrases {
            config.presence.negative_phrases = phrases;
        }
    }
    if let Some(portscan) = raw.portscan {
        if let Some(ports) = portscan.common_ports {
            config.portscan.common_ports = ports;
        }
        if let Some(secs) = portscan.connect_timeout_secs {
            config.portscan.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(parallelism) = portscan.parallelism {
            config.portscan.parallelism = parallelism;
        }
    }
    if let Some(resolver) = raw.resolver {
        if let Some(nameservers) = resolver.nameservers {
            config.resolver.nameservers = nameservers;
        }
        if let Some(secs) = resolver.timeout_secs {
            config.resolver.timeout = Duration::from_secs(secs);
        }
        if let Some(use_system) = resolver.use_system_resolver {
            config.resolver.use_system_resolver = use_system;
        }
    }
    if let Some(output) = raw.output {
        if let Some(format) = output.format {
            config.output.format = match format.to_lowercase().as_str() {
                "json" => OutputFormat::Json,
                "csv" => OutputFormat::Csv,
                _ => OutputFormat::Text,
            };
        }
        if let Some(dir) = output.results_dir {
            config.output.results_dir = dir;
        }
        if let Some(save) = output.save_results {
            config.output.save_results = save;
        }
        if let Some(verbose) = output.verbose {
            config.output.verbose = verbose;
        }
    }
}

/// Template maps are sorted by id so expansion order is stable across runs
/// regardless of toml table iteration order.
fn to_templates(map: HashMap<String, String>) -> Vec<Template> {
    let mut entries: Vec<(String, String)> = map.into_iter().collect();
    entries.sort();
    entries
        .into_iter()
        .map(|(id, pattern)| Template::new(id, pattern))
        .collect()
}

fn validate_config(config: &Config) -> Result<(), RustReconError> {
    if config.timeout.as_secs() == 0 {
        return Err(RustReconError::ConfigError(
            "timeout must be greater than 0".to_string(),
        ));
    }
    if config.max_threads == 0 {
        return Err(RustReconError::ConfigError(
            "max_threads must be greater than 0".to_string(),
        ));
    }
    if config.backends.is_empty() {
        return Err(RustReconError::ConfigError(
            "at least one backend must be enabled".to_string(),
        ));
    }
    Ok(())
}

/// API keys per backend, loaded from a document separate from the main
/// config. Multiple keys per backend are rotated at random per call.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    #[serde(default)]
    keys: HashMap<String, Vec<String>>,
}

impl CredentialStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: Option<&str>) -> Result<Self, RustReconError> {
        let mut store = Self::default();

        if let Some(path_str) = path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path).map_err(|e| {
                    RustReconError::ConfigError(format!("Failed to read credentials: {}", e))
                })?;
                let raw: RawCredentials = toml::from_str(&contents).map_err(|e| {
                    RustReconError::ConfigError(format!("Failed to parse credentials: {}", e))
                })?;
                store.keys = raw.keys;
            }
        }

        store.apply_env_overrides();
        Ok(store)
    }

    /// RUSTRECON_<BACKEND>_API_KEYS=key1,key2 overrides the file entry.
    fn apply_env_overrides(&mut self) {
        for (name, value) in env::vars() {
            if let Some(backend) = name
                .strip_prefix("RUSTRECON_")
                .and_then(|s| s.strip_suffix("_API_KEYS"))
            {
                let keys: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !keys.is_empty() {
                    self.keys.insert(backend.to_lowercase(), keys);
                }
            }
        }
    }

    pub fn insert(&mut self, backend: &str, keys: Vec<String>) {
        self.keys.insert(backend.to_string(), keys);
    }

    pub fn keys_for(&self, backend: &str) -> &[String] {
        self.keys.get(backend).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_key(&self, backend: &str) -> bool {
        !self.keys_for(backend).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_threads, 10);
        assert!(config.rate_limits.contains_key("whois"));
    }

    #[test]
    fn test_parse_raw_config() {
        let toml_str = r#"
            timeout_secs = 10
            max_threads = 4

            [rate_limits.breach]
            class = "quota"
            limit = 500
            window_secs = 86400

            [rate_limits.presence]
            class = "smooth"
            per_second = 2

            [output]
            format = "json"
            save_results = true
        "#;
        let raw: RawConfig = toml::from_str(toml_str).unwrap();
        let mut config = Config::default();
        apply_raw(&mut config, raw);

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_threads, 4);
        assert_eq!(
            config.rate_limits.get("breach"),
            Some(&RatePolicy::Quota {
                limit: 500,
                window: Duration::from_secs(86400)
            })
        );
        assert_eq!(
            config.rate_limits.get("presence"),
            Some(&RatePolicy::Smooth { per_second: 2 })
        );
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.save_results);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.timeout = Duration::from_secs(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_config_file_errors() {
        assert!(load_config(Some("/nonexistent/rustrecon.toml")).is_err());
    }

    #[test]
    fn test_credential_store() {
        let mut store = CredentialStore::empty();
        assert!(!store.has_key("breach"));
        store.insert("breach", vec!["k1".to_string(), "k2".to_string()]);
        assert!(store.has_key("breach"));
        assert_eq!(store.keys_for("breach").len(), 2);
        assert!(store.keys_for("unknown").is_empty());
    }

    #[test]
    fn test_parse_credentials_document() {
        let toml_str = r#"
            [keys]
            breach = ["abc123"]
            shodan = ["k1", "k2"]
        "#;
        let raw: RawCredentials = toml::from_str(toml_str).unwrap();
        assert_eq!(raw.keys.get("breach").unwrap().len(), 1);
        assert_eq!(raw.keys.get("shodan").unwrap().len(), 2);
    }
}
