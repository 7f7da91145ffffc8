// src/sink.rs
use crate::target::sanitize_for_filename;
use crate::types::{
    BatchReport, InvestigationRecord, LookupStatus, OutputConfig, OutputFormat, RustReconError,
};
use log::error;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Renders records to the terminal and optionally persists each batch to the
/// results directory. Display always happens; a failed write is reported and
/// swallowed so the investigation keeps its output.
pub struct ResultSink {
    config: OutputConfig,
    silent: bool,
}

impl ResultSink {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            silent: false,
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Live line for one completed record. Records arrive in completion
    /// order, so the line carries full identity (backend + query), not an
    /// index.
    pub fn emit(&self, record: &InvestigationRecord) {
        if self.silent {
            return;
        }

        let marker = match record.status {
            LookupStatus::Success => "+",
            LookupStatus::NotFound => "-",
            LookupStatus::Error => "!",
            LookupStatus::RateLimited => "#",
        };
        let mut line = format!(
            "[{}] [{}] {} ({})",
            marker, record.backend, record.query, record.status.as_str()
        );
        if self.config.verbose && !record.data.is_empty() {
            let data = serde_json::to_string(&record.data).unwrap_or_default();
            line.push_str(&format!(" {}", data));
        }
        println!("{}", Self::fit_terminal(&line));
    }

    /// Render the batch in the configured format and persist it when
    /// save_results is on. Returns the path written, if any.
    pub async fn flush(&self, report: &BatchReport) -> Result<Option<PathBuf>, RustReconError> {
        if !self.silent {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            self.write_output(&mut handle, report)?;
        }

        if !self.config.save_results {
            return Ok(None);
        }

        match self.persist(report) {
            Ok(path) => {
                if !self.silent {
                    println!("Results written to: {}", path.display());
                }
                Ok(Some(path))
            }
            Err(e) => {
                // Persistence trouble never costs the on-screen results.
                error!("Failed to persist results: {}", e);
                Ok(None)
            }
        }
    }

    fn persist(&self, report: &BatchReport) -> Result<PathBuf, RustReconError> {
        std::fs::create_dir_all(&self.config.results_dir).map_err(|e| {
            RustReconError::PersistenceError(format!(
                "Failed to create {}: {}",
                self.config.results_dir.display(),
                e
            ))
        })?;

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let filename = format!(
            "{}_{}_{}.json",
            sanitize_for_filename(&report.module),
            sanitize_for_filename(&report.target),
            stamp
        );
        let path = self.config.results_dir.join(filename);

        let json = serde_json::to_string_pretty(report)
            .map_err(|e| RustReconError::PersistenceError(format!("Serialization: {}", e)))?;
        let mut file = File::create(&path).map_err(|e| {
            RustReconError::PersistenceError(format!("Failed to create {}: {}", path.display(), e))
        })?;
        file.write_all(json.as_bytes()).map_err(|e| {
            RustReconError::PersistenceError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(path)
    }

    fn write_output<W: Write>(&self, writer: &mut W, report: &BatchReport) -> Result<(), RustReconError> {
        match self.config.format {
            OutputFormat::Text => self.write_text_output(writer, report),
            OutputFormat::Json => self.write_json_output(writer, report),
            OutputFormat::Csv => self.write_csv_output(writer, report),
        }
    }

    fn write_text_output<W: Write>(
        &self,
        writer: &mut W,
        report: &BatchReport,
    ) -> Result<(), RustReconError> {
        writeln!(writer, "\n[*] Target: {}", report.target)
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        writeln!(writer, "[*] Module: {}", report.module)
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        writeln!(
            writer,
            "[*] Queries: {} | Records: {} | Found: {} | Errors: {}",
            report.stats.queries_dispatched,
            report.stats.records,
            report.stats.found,
            report.stats.errors
        )
        .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        writeln!(writer, "[*] Duration: {:?}", report.stats.duration)
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        writeln!(writer, "\n[*] Results:")
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;

        for record in &report.records {
            let summary = Self::summarize_data(record);
            writeln!(
                writer,
                "{:<12} {:<12} {:<40} {}",
                record.status.as_str(),
                record.backend,
                record.query,
                summary
            )
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        }

        Ok(())
    }

    fn write_json_output<W: Write>(
        &self,
        writer: &mut W,
        report: &BatchReport,
    ) -> Result<(), RustReconError> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| RustReconError::PersistenceError(format!("Failed to serialize JSON: {}", e)))?;

        writeln!(writer, "{}", json).map_err(|e| RustReconError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    fn write_csv_output<W: Write>(
        &self,
        writer: &mut W,
        report: &BatchReport,
    ) -> Result<(), RustReconError> {
        writeln!(writer, "module,backend,target,query,status,timestamp,data")
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;

        for record in &report.records {
            let data = serde_json::to_string(&record.data).unwrap_or_default();
            writeln!(
                writer,
                "{},{},{},{},{},{},\"{}\"",
                record.module,
                record.backend,
                record.target,
                record.query,
                record.status.as_str(),
                record.timestamp,
                data.replace('"', "\"\"")
            )
            .map_err(|e| RustReconError::PersistenceError(e.to_string()))?;
        }

        Ok(())
    }

    /// Short single-line summary of the data map for the text table.
    fn summarize_data(record: &InvestigationRecord) -> String {
        let mut parts = Vec::new();
        for (key, value) in record.data.iter().take(3) {
            match value {
                serde_json::Value::Array(items) => parts.push(format!("{}={}", key, items.len())),
                serde_json::Value::Object(_) => parts.push(key.clone()),
                other => parts.push(format!("{}={}", key, other)),
            }
        }
        parts.join(" ")
    }

    fn fit_terminal(line: &str) -> String {
        let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(120);
        if line.chars().count() <= width {
            line.to_string()
        } else {
            let truncated: String = line.chars().take(width.saturating_sub(3)).collect();
            format!("{}...", truncated)
        }
    }
}

/// Read a persisted batch back; used by report tooling and tests.
pub fn read_report(path: &Path) -> Result<BatchReport, RustReconError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| RustReconError::PersistenceError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| RustReconError::PersistenceError(format!("{}: {}", path.display(), e)))
}
