// src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub max_threads: usize,
    pub rate_limits: HashMap<String, RatePolicy>,
    pub timeouts: HashMap<String, Duration>,
    pub backends: Vec<String>,
    pub templates: TemplateConfig,
    pub presence: PresenceConfig,
    pub portscan: PortScanConfig,
    pub resolver: ResolverSettings,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("whois".to_string(), RatePolicy::Smooth { per_second: 1 });
        rate_limits.insert("dns".to_string(), RatePolicy::Smooth { per_second: 10 });
        rate_limits.insert("presence".to_string(), RatePolicy::Smooth { per_second: 5 });
        rate_limits.insert("emailcheck".to_string(), RatePolicy::Smooth { per_second: 5 });
        rate_limits.insert("portscan".to_string(), RatePolicy::Smooth { per_second: 50 });
        rate_limits.insert(
            "breach".to_string(),
            RatePolicy::Quota {
                limit: 1000,
                window: Duration::from_secs(30 * 24 * 3600),
            },
        );

        Self {
            timeout: Duration::from_secs(30),
            user_agent: "RustRecon/0.1".to_string(),
            proxy: None,
            max_threads: 10,
            rate_limits,
            timeouts: HashMap::new(),
            backends: vec![
                "whois".to_string(),
                "dns".to_string(),
                "presence".to_string(),
                "emailcheck".to_string(),
                "breach".to_string(),
                "portscan".to_string(),
                "crypto".to_string(),
                "dorks".to_string(),
            ],
            templates: TemplateConfig::default(),
            presence: PresenceConfig::default(),
            portscan: PortScanConfig::default(),
            resolver: ResolverSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Declared timeout for a backend, falling back to the global default.
    pub fn timeout_for(&self, backend_id: &str) -> Duration {
        self.timeouts.get(backend_id).copied().unwrap_or(self.timeout)
    }
}

/// Static rate-limit class for one backend. Smooth limits block until the
/// next token; quota limits reject immediately so a scarce budget is never
/// consumed by a blocking wait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum RatePolicy {
    Smooth { per_second: u32 },
    Quota { limit: u32, window: Duration },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub platforms: Vec<Template>,
    pub email_patterns: Vec<Template>,
    pub search_engines: Vec<Template>,
    pub explorers: Vec<Template>,
    pub subdomain_words: Vec<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
            email_patterns: default_email_patterns(),
            search_engines: default_search_engines(),
            explorers: default_explorers(),
            subdomain_words: default_subdomain_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Body phrases that mark a 200 response as "profile does not exist".
    pub negative_phrases: Vec<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            negative_phrases: vec![
                "user not found".to_string(),
                "page not found".to_string(),
                "profile not found".to_string(),
                "account suspended".to_string(),
                "user does not exist".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanConfig {
    pub common_ports: Vec<u16>,
    pub connect_timeout: Duration,
    pub parallelism: usize,
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            common_ports: vec![
                21, 22, 23, 25, 53, 80, 110, 443, 993, 995, 1433, 3306, 3389, 5432, 5900,
                8080, 8443,
            ],
            connect_timeout: Duration::from_secs(3),
            parallelism: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub nameservers: Vec<String>,
    pub timeout: Duration,
    pub use_system_resolver: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "8.8.4.4:53".to_string(),
                "1.1.1.1:53".to_string(),
                "1.0.0.1:53".to_string(),
            ],
            timeout: Duration::from_secs(5),
            use_system_resolver: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub results_dir: PathBuf,
    pub save_results: bool,
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            results_dir: PathBuf::from("results"),
            save_results: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// The subject of an investigation. Immutable once built; `normalized` is the
/// form every template and backend sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub raw: String,
    pub kind: TargetKind,
    pub normalized: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Domain,
    Email,
    Username,
    Phone,
    Ip,
    Crypto,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Domain => "domain",
            TargetKind::Email => "email",
            TargetKind::Username => "username",
            TargetKind::Phone => "phone",
            TargetKind::Ip => "ip",
            TargetKind::Crypto => "crypto",
        }
    }
}

/// A configured pattern string; placeholders are extracted at expansion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub pattern: String,
}

impl Template {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
        }
    }
}

/// A template expanded against a target; one per dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub resolved: String,
    pub template_id: String,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupStatus {
    Success,
    NotFound,
    Error,
    RateLimited,
}

impl LookupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::Success => "success",
            LookupStatus::NotFound => "not-found",
            LookupStatus::Error => "error",
            LookupStatus::RateLimited => "rate-limited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

/// Raw outcome of one backend call. The payload is an ordered map so that
/// serialization is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub backend_id: String,
    pub query: Query,
    pub status: LookupStatus,
    pub payload: BTreeMap<String, serde_json::Value>,
    pub error: Option<ErrorDetail>,
}

impl LookupResult {
    pub fn success(
        backend_id: &str,
        query: Query,
        payload: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            query,
            status: LookupStatus::Success,
            payload,
            error: None,
        }
    }

    pub fn not_found(backend_id: &str, query: Query) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            query,
            status: LookupStatus::NotFound,
            payload: BTreeMap::new(),
            error: None,
        }
    }
}

/// The normalized, display-ready unit consumed by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub target: String,
    pub module: String,
    pub backend: String,
    pub query: String,
    pub status: LookupStatus,
    pub data: BTreeMap<String, serde_json::Value>,
    pub timestamp: String,
}

/// All records of one investigation run, as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub target: String,
    pub module: String,
    pub records: Vec<InvestigationRecord>,
    pub stats: BatchStats,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    pub queries_dispatched: usize,
    pub records: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
    pub rate_limited: usize,
    pub duration: Duration,
}

pub struct BackendInfo {
    pub name: String,
    pub needs_key: bool,
    pub is_default: bool,
}

#[derive(Debug, Error)]
pub enum RustReconError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Missing credential for backend: {0}")]
    MissingCredential(String),

    #[error("Timeout in {0}")]
    TimeoutError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Rate limit exhausted for backend: {0}")]
    RateLimited(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Backend error in {backend_id}: {message}")]
    BackendError { backend_id: String, message: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl RustReconError {
    /// Short tag carried in the error detail of a LookupResult.
    pub fn kind(&self) -> &'static str {
        match self {
            RustReconError::ConfigError(_) => "Config",
            RustReconError::TemplateError(_) => "Template",
            RustReconError::MissingCredential(_) => "MissingCredential",
            RustReconError::TimeoutError(_) => "Timeout",
            RustReconError::TransportError(_) => "TransportError",
            RustReconError::HttpError(_) => "TransportError",
            RustReconError::ParseError(_) => "Parse",
            RustReconError::RateLimited(_) => "RateLimited",
            RustReconError::PersistenceError(_) => "Persistence",
            RustReconError::BackendError { .. } => "Backend",
            RustReconError::InvalidTarget(_) => "InvalidTarget",
            RustReconError::Unknown(_) => "Unknown",
        }
    }
}

fn default_platforms() -> Vec<Template> {
    [
        ("github", "https://github.com/{username}"),
        ("twitter", "https://twitter.com/{username}"),
        ("instagram", "https://instagram.com/{username}"),
        ("linkedin", "https://linkedin.com/in/{username}"),
        ("facebook", "https://facebook.com/{username}"),
        ("reddit", "https://reddit.com/user/{username}"),
        ("youtube", "https://youtube.com/@{username}"),
        ("tiktok", "https://tiktok.com/@{username}"),
        ("pinterest", "https://pinterest.com/{username}"),
        ("tumblr", "https://{username}.tumblr.com"),
        ("medium", "https://medium.com/@{username}"),
        ("gitlab", "https://gitlab.com/{username}"),
        ("bitbucket", "https://bitbucket.org/{username}"),
        ("twitch", "https://twitch.tv/{username}"),
        ("steam", "https://steamcommunity.com/id/{username}"),
        ("soundcloud", "https://soundcloud.com/{username}"),
    ]
    .iter()
    .map(|(id, pattern)| Template::new(*id, *pattern))
    .collect()
}

fn default_email_patterns() -> Vec<Template> {
    [
        ("first.last", "{first}.{last}@{domain}"),
        ("firstlast", "{first}{last}@{domain}"),
        ("flast", "{fi}{last}@{domain}"),
        ("firstl", "{first}{li}@{domain}"),
        ("f.last", "{fi}.{last}@{domain}"),
        ("last.first", "{last}.{first}@{domain}"),
        ("last", "{last}@{domain}"),
        ("first", "{first}@{domain}"),
    ]
    .iter()
    .map(|(id, pattern)| Template::new(*id, *pattern))
    .collect()
}

fn default_search_engines() -> Vec<Template> {
    [
        ("google", "https://www.google.com/search?q={query}"),
        ("bing", "https://www.bing.com/search?q={query}"),
        ("duckduckgo", "https://duckduckgo.com/?q={query}"),
        (
            "google-github",
            "https://www.google.com/search?q=site%3Agithub.com+%22{query}%22",
        ),
        (
            "google-pastebin",
            "https://www.google.com/search?q=site%3Apastebin.com+%22{query}%22",
        ),
    ]
    .iter()
    .map(|(id, pattern)| Template::new(*id, *pattern))
    .collect()
}

fn default_explorers() -> Vec<Template> {
    [
        ("blockchain.com", "https://www.blockchain.com/btc/address/{address}"),
        ("blockcypher", "https://live.blockcypher.com/btc/address/{address}/"),
        ("btc.com", "https://btc.com/btc/address/{address}"),
    ]
    .iter()
    .map(|(id, pattern)| Template::new(*id, *pattern))
    .collect()
}

fn default_subdomain_words() -> Vec<String> {
    [
        "www", "mail", "ftp", "webmail", "smtp", "pop", "ns1", "ns2", "cpanel", "whm",
        "autodiscover", "autoconfig", "api", "admin", "dev", "test", "staging", "blog",
        "shop", "support", "help", "portal", "mobile", "cdn", "static", "assets",
        "images", "img", "video", "secure", "login", "auth", "ssh", "vpn", "git",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
