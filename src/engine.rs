// src/engine.rs
use crate::backends::{get_all_backends, Backend};
use crate::cli::Args;
use crate::config::{self, CredentialStore};
use crate::expand::{expand_all, AuxFields};
use crate::normalize::normalize;
use crate::session::Session;
use crate::sink::ResultSink;
use crate::types::{
    BatchReport, BatchStats, Config, ErrorDetail, LookupResult, LookupStatus, OutputFormat, Query,
    RustReconError, Target, TargetKind, Template,
};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Investigation modules a user can select. Each routes to exactly one
/// backend; what varies is how the target expands into queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Whois,
    Dns,
    Subdomains,
    Username,
    Emails,
    Breach,
    Ports,
    Crypto,
    Dorks,
}

impl Module {
    pub fn parse(s: &str) -> Option<Module> {
        match s.to_lowercase().as_str() {
            "whois" => Some(Module::Whois),
            "dns" => Some(Module::Dns),
            "subdomains" => Some(Module::Subdomains),
            "username" => Some(Module::Username),
            "emails" => Some(Module::Emails),
            "breach" => Some(Module::Breach),
            "ports" | "portscan" => Some(Module::Ports),
            "crypto" => Some(Module::Crypto),
            "dorks" | "search" => Some(Module::Dorks),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Module::Whois => "whois",
            Module::Dns => "dns",
            Module::Subdomains => "subdomains",
            Module::Username => "username",
            Module::Emails => "emails",
            Module::Breach => "breach",
            Module::Ports => "ports",
            Module::Crypto => "crypto",
            Module::Dorks => "dorks",
        }
    }

    pub fn backend_id(&self) -> &'static str {
        match self {
            Module::Whois => "whois",
            Module::Dns | Module::Subdomains => "dns",
            Module::Username => "presence",
            Module::Emails => "emailcheck",
            Module::Breach => "breach",
            Module::Ports => "portscan",
            Module::Crypto => "crypto",
            Module::Dorks => "dorks",
        }
    }

    /// Sensible module when the user gave a target but no -m flag.
    pub fn default_for(kind: TargetKind) -> Module {
        match kind {
            TargetKind::Domain => Module::Dns,
            TargetKind::Email => Module::Emails,
            TargetKind::Username => Module::Username,
            TargetKind::Phone => Module::Dorks,
            TargetKind::Ip => Module::Whois,
            TargetKind::Crypto => Module::Crypto,
        }
    }
}

pub struct ReconEngine {
    config: Config,
    session: Session,
    backends: HashMap<String, Box<dyn Backend>>,
    sink: ResultSink,
    cancelled: Arc<AtomicBool>,
    args: Args,
}

impl ReconEngine {
    pub async fn new(args: Args) -> Result<Self, RustReconError> {
        let mut config = config::load_config(args.config_path.as_deref())?;

        // Command line overrides
        if let Some(dir) = args.output_dir.clone() {
            config.output.results_dir = dir;
        }
        if args.save {
            config.output.save_results = true;
        }
        if args.verbose {
            config.output.verbose = true;
        }
        if args.json {
            config.output.format = OutputFormat::Json;
        }
        if args.csv {
            config.output.format = OutputFormat::Csv;
        }
        if let Some(max_threads) = args.max_threads {
            config.max_threads = max_threads;
        }
        if let Some(ports) = args.port_list() {
            config.portscan.common_ports = ports;
        }

        let credentials = CredentialStore::load(args.credentials_path.as_deref())?;
        let session = Session::new(&config)?;

        let backends: HashMap<String, Box<dyn Backend>> = get_all_backends(&config, &credentials)
            .into_iter()
            .map(|b| (b.backend_id().to_string(), b))
            .collect();
        if backends.is_empty() {
            return Err(RustReconError::ConfigError(
                "No valid backends configured".to_string(),
            ));
        }

        let sink = ResultSink::new(config.output.clone()).with_silent(args.silent);

        Ok(Self {
            config,
            session,
            backends,
            sink,
            cancelled: Arc::new(AtomicBool::new(false)),
            args,
        })
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Shared abort flag; setting it stops new dispatches immediately while
    /// in-flight calls run to completion or their declared timeout.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub async fn run(&self, module: Module, target: &Target) -> Result<BatchReport, RustReconError> {
        let start = Instant::now();

        let backend = self.backends.get(module.backend_id()).ok_or_else(|| {
            RustReconError::ConfigError(format!(
                "backend '{}' required by module '{}' is not enabled",
                module.backend_id(),
                module.name()
            ))
        })?;

        let queries = self.build_queries(module, target)?;
        if queries.is_empty() {
            return Err(RustReconError::TemplateError(format!(
                "module '{}' produced no queries for {}",
                module.name(),
                target.normalized
            )));
        }

        info!(
            "Dispatching {} queries for {} through {}",
            queries.len(),
            target.normalized,
            backend.backend_id()
        );

        let total = queries.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_threads.max(1)));
        let mut futures = FuturesUnordered::new();

        for query in queries {
            let backend = backend.clone_backend();
            let session = self.session.clone();
            let semaphore = semaphore.clone();
            let cancelled = self.cancelled.clone();

            futures.push(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                // Aborted before dispatch: no record at all, not a partial one.
                if cancelled.load(Ordering::Relaxed) {
                    return None;
                }
                Some(dispatch(backend, query, session).await)
            });
        }

        let progress = if !self.args.silent && total > 1 {
            Some(ProgressBar::new(total as u64))
        } else {
            None
        };

        let mut records = Vec::new();
        let mut dispatched = 0usize;
        while let Some(outcome) = futures.next().await {
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            if let Some(results) = outcome {
                dispatched += 1;
                for result in results {
                    // Timestamp reflects completion: normalize as results land.
                    records.push(normalize(&result, module.name()));
                }
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if self.cancelled.load(Ordering::Relaxed) {
            warn!(
                "Investigation aborted: {} of {} queries dispatched",
                dispatched, total
            );
        }

        for record in &records {
            self.sink.emit(record);
        }

        let stats = BatchStats {
            queries_dispatched: dispatched,
            records: records.len(),
            found: count(&records, LookupStatus::Success),
            not_found: count(&records, LookupStatus::NotFound),
            errors: count(&records, LookupStatus::Error),
            rate_limited: count(&records, LookupStatus::RateLimited),
            duration: start.elapsed(),
        };

        let report = BatchReport {
            target: target.normalized.clone(),
            module: module.name().to_string(),
            records,
            stats,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.sink.flush(&report).await?;

        Ok(report)
    }

    fn build_queries(&self, module: Module, target: &Target) -> Result<Vec<Query>, RustReconError> {
        let aux = AuxFields {
            first: self.args.first.clone(),
            last: self.args.last.clone(),
            words: None,
        };

        match module {
            Module::Whois => {
                self.require_kind(module, target, &[TargetKind::Domain, TargetKind::Ip])?;
                Ok(vec![self.identity_query(target)])
            }
            Module::Dns => {
                self.require_kind(module, target, &[TargetKind::Domain])?;
                Ok(vec![self.identity_query(target)])
            }
            Module::Subdomains => {
                self.require_kind(module, target, &[TargetKind::Domain])?;
                let aux = AuxFields {
                    words: Some(self.config.templates.subdomain_words.clone()),
                    ..aux
                };
                let sweep = [Template::new("subdomain", "{word}.{domain}")];
                Ok(expand_all(&sweep, target, &aux))
            }
            Module::Username => {
                self.require_kind(module, target, &[TargetKind::Username])?;
                Ok(expand_all(&self.config.templates.platforms, target, &aux))
            }
            Module::Emails => {
                self.require_kind(module, target, &[TargetKind::Email, TargetKind::Domain])?;
                let mut queries = Vec::new();
                if target.kind == TargetKind::Email {
                    queries.push(self.identity_query(target));
                }
                queries.extend(expand_all(
                    &self.config.templates.email_patterns,
                    target,
                    &aux,
                ));
                if queries.is_empty() {
                    return Err(RustReconError::TemplateError(
                        "email patterns need --first and --last for this target".to_string(),
                    ));
                }
                Ok(queries)
            }
            Module::Breach => {
                self.require_kind(module, target, &[TargetKind::Email, TargetKind::Username])?;
                Ok(vec![self.identity_query(target)])
            }
            Module::Ports => {
                self.require_kind(module, target, &[TargetKind::Domain, TargetKind::Ip])?;
                Ok(vec![self.identity_query(target)])
            }
            Module::Crypto => {
                self.require_kind(module, target, &[TargetKind::Crypto])?;
                Ok(vec![self.identity_query(target)])
            }
            Module::Dorks => Ok(expand_all(
                &self.config.templates.search_engines,
                target,
                &aux,
            )),
        }
    }

    fn identity_query(&self, target: &Target) -> Query {
        Query {
            resolved: target.normalized.clone(),
            template_id: "target".to_string(),
            target: target.clone(),
        }
    }

    fn require_kind(
        &self,
        module: Module,
        target: &Target,
        allowed: &[TargetKind],
    ) -> Result<(), RustReconError> {
        if allowed.contains(&target.kind) {
            Ok(())
        } else {
            Err(RustReconError::InvalidTarget(format!(
                "module '{}' does not accept {} targets",
                module.name(),
                target.kind.as_str()
            )))
        }
    }
}

fn count(records: &[crate::types::InvestigationRecord], status: LookupStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}

/// One rate-gated, deadline-bounded backend call. Failures become results,
/// never propagated errors: a single bad query must not sink the batch.
async fn dispatch(backend: Box<dyn Backend>, query: Query, session: Session) -> Vec<LookupResult> {
    if let Err(e) = session.acquire(backend.backend_id()).await {
        return vec![failure_result(backend.backend_id(), query, e)];
    }

    match tokio::time::timeout(backend.declared_timeout(), backend.invoke(&query, &session)).await {
        // A zero-result return (port probe with nothing open) still owes the
        // user a visible outcome.
        Ok(Ok(results)) if results.is_empty() => {
            vec![LookupResult::not_found(backend.backend_id(), query)]
        }
        Ok(Ok(results)) => results,
        Ok(Err(e)) => vec![failure_result(backend.backend_id(), query, e)],
        Err(_) => {
            let e = RustReconError::TimeoutError(format!(
                "{} exceeded {:?}",
                backend.backend_id(),
                backend.declared_timeout()
            ));
            vec![failure_result(backend.backend_id(), query, e)]
        }
    }
}

fn failure_result(backend_id: &str, query: Query, error: RustReconError) -> LookupResult {
    let status = match &error {
        RustReconError::RateLimited(_) => LookupStatus::RateLimited,
        _ => LookupStatus::Error,
    };
    LookupResult {
        backend_id: backend_id.to_string(),
        query,
        status,
        payload: BTreeMap::new(),
        error: Some(ErrorDetail {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;
    use clap::Parser;

    async fn engine_with(extra: &[&str]) -> ReconEngine {
        let mut argv = vec!["rustrecon", "--silent"];
        argv.extend(extra);
        ReconEngine::new(Args::parse_from(argv)).await.unwrap()
    }

    #[tokio::test]
    async fn test_module_parse_and_routing() {
        assert_eq!(Module::parse("whois"), Some(Module::Whois));
        assert_eq!(Module::parse("PORTS"), Some(Module::Ports));
        assert_eq!(Module::parse("nonsense"), None);
        assert_eq!(Module::Subdomains.backend_id(), "dns");
        assert_eq!(Module::Username.backend_id(), "presence");
    }

    #[tokio::test]
    async fn test_username_queries_cover_all_platforms() {
        let engine = engine_with(&[]).await;
        let target = parse_target("johndoe123", None).unwrap();
        let queries = engine.build_queries(Module::Username, &target).unwrap();

        assert_eq!(queries.len(), engine.config.templates.platforms.len());
        assert!(queries.iter().all(|q| q.resolved.contains("johndoe123")));
        assert_eq!(queries[0].resolved, "https://github.com/johndoe123");
    }

    #[tokio::test]
    async fn test_email_pattern_queries() {
        let engine = engine_with(&["--first", "john", "--last", "doe"]).await;
        let target = parse_target("example.com", None).unwrap();
        let queries = engine.build_queries(Module::Emails, &target).unwrap();

        let resolved: Vec<&str> = queries.iter().map(|q| q.resolved.as_str()).collect();
        assert!(resolved.contains(&"john.doe@example.com"));
        assert!(resolved.contains(&"jdoe@example.com"));
        assert_eq!(queries.len(), 8);
    }

    #[tokio::test]
    async fn test_email_patterns_without_names_fail_for_domain_target() {
        let engine = engine_with(&[]).await;
        let target = parse_target("example.com", None).unwrap();
        let err = engine.build_queries(Module::Emails, &target);
        assert!(matches!(err, Err(RustReconError::TemplateError(_))));
    }

    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let engine = engine_with(&[]).await;
        let target = parse_target("johndoe123", None).unwrap();
        let err = engine.build_queries(Module::Whois, &target);
        assert!(matches!(err, Err(RustReconError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_subdomain_sweep_uses_wordlist() {
        let engine = engine_with(&[]).await;
        let target = parse_target("example.com", None).unwrap();
        let queries = engine.build_queries(Module::Subdomains, &target).unwrap();

        assert_eq!(
            queries.len(),
            engine.config.templates.subdomain_words.len()
        );
        assert_eq!(queries[0].resolved, "www.example.com");
        assert!(queries.iter().all(|q| q.template_id == "subdomain"));
    }

    #[tokio::test]
    async fn test_dorks_run_end_to_end_with_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(&[
            "--save",
            "-o",
            dir.path().to_str().unwrap(),
        ])
        .await;
        let target = parse_target("johndoe123", None).unwrap();

        let report = engine.run(Module::Dorks, &target).await.unwrap();

        let engines = engine.config.templates.search_engines.len();
        assert_eq!(report.records.len(), engines);
        assert_eq!(report.stats.found, engines);
        assert_eq!(report.stats.errors, 0);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let name = files[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().starts_with("dorks_johndoe123_"));
    }

    #[tokio::test]
    async fn test_cancelled_run_produces_no_records() {
        let engine = engine_with(&[]).await;
        engine.cancel_flag().store(true, Ordering::Relaxed);
        let target = parse_target("johndoe123", None).unwrap();

        let report = engine.run(Module::Dorks, &target).await.unwrap();
        assert_eq!(report.stats.queries_dispatched, 0);
        assert!(report.records.is_empty());
    }
}
