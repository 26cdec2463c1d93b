use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::api::{ApiClient, Paginator, Transport};
use crate::endpoints::{EndpointDescriptor, Registry};
use crate::error::ConfigError;
use crate::export::{self, ExportOptions};
use crate::fsutil;

pub const SUMMARY_FILE: &str = "run_summary.json";

/// Process exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_COLLECTION_FAILURE: u8 = 1;
pub const EXIT_CONFIGURATION_ERROR: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Success,
    Partial,
    Failed,
}

impl EndpointStatus {
    pub fn name(&self) -> &'static str {
        match self {
            EndpointStatus::Success => "success",
            EndpointStatus::Partial => "partial",
            EndpointStatus::Failed => "failed",
        }
    }
}

/// Outcome for one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub endpoint: String,
    pub status: EndpointStatus,
    pub record_count: usize,
    pub pages: u32,
    pub skipped_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<RunResult>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.status == EndpointStatus::Success)
    }

    pub fn count(&self, status: EndpointStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_COLLECTION_FAILURE
        }
    }

    /// Log one line per endpoint plus totals
    pub fn log(&self) {
        tracing::info!("Run {} summary:", self.run_id);
        for result in &self.results {
            match &result.error {
                Some(error) => tracing::info!(
                    "  {:<12} {:<8} {:>7} record(s)  {}",
                    result.endpoint,
                    result.status.name(),
                    result.record_count,
                    error
                ),
                None => tracing::info!(
                    "  {:<12} {:<8} {:>7} record(s)",
                    result.endpoint,
                    result.status.name(),
                    result.record_count
                ),
            }
        }

        let total: usize = self.results.iter().map(|r| r.record_count).sum();
        let line = format!(
            "{} endpoint(s): {} success, {} partial, {} failed; {} record(s) exported",
            self.results.len(),
            self.count(EndpointStatus::Success),
            self.count(EndpointStatus::Partial),
            self.count(EndpointStatus::Failed),
            total
        );
        if self.is_success() {
            tracing::info!("{}", line);
        } else {
            tracing::error!("{}", line);
        }
    }

    /// Write the summary as pretty JSON next to the CSV files
    pub fn write_json(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(SUMMARY_FILE);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        fsutil::atomic_write(&path, content.as_bytes())
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;
        Ok(path)
    }
}

/// Drives every selected endpoint through collection and export, one at a time
pub struct Orchestrator<'a, T> {
    client: &'a ApiClient<T>,
    registry: Registry,
    output_dir: PathBuf,
    export: ExportOptions,
    max_pages: u32,
}

impl<'a, T: Transport> Orchestrator<'a, T> {
    pub fn new(
        client: &'a ApiClient<T>,
        registry: Registry,
        output_dir: PathBuf,
        export: ExportOptions,
        max_pages: u32,
    ) -> Self {
        Self {
            client,
            registry,
            output_dir,
            export,
            max_pages,
        }
    }

    /// Export the named endpoints, or every registered one when `names` is `None`
    ///
    /// Unknown names fail before any request is sent. Once collection starts,
    /// a failing endpoint is recorded and the run moves on to the next.
    pub async fn run(&self, names: Option<&[String]>) -> Result<RunSummary, ConfigError> {
        let selected = self.registry.select(names)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        tracing::info!(
            "Run {} starting: {} endpoint(s) -> {}",
            run_id,
            selected.len(),
            self.output_dir.display()
        );

        let mut results = Vec::with_capacity(selected.len());
        for endpoint in selected {
            results.push(self.run_endpoint(endpoint).await);
        }

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    async fn run_endpoint(&self, endpoint: &EndpointDescriptor) -> RunResult {
        tracing::info!("Fetching {} ({})", endpoint.name, endpoint.path);

        let collection = Paginator::new(self.client, endpoint, self.max_pages)
            .collect()
            .await;

        let mut result = RunResult {
            endpoint: endpoint.name.to_string(),
            status: EndpointStatus::Failed,
            record_count: 0,
            pages: collection.pages,
            skipped_records: collection.skipped,
            output_file: None,
            sha256: None,
            error: collection.error.as_ref().map(|e| e.to_string()),
        };

        if collection.records.is_empty() && !collection.is_complete() {
            tracing::error!("{}: nothing collected, no file written", endpoint.name);
            return result;
        }

        let path = self.output_dir.join(endpoint.output_file);
        match export::export(&collection.records, &path, &self.export) {
            Ok(report) => {
                result.status = if collection.is_complete() {
                    EndpointStatus::Success
                } else {
                    tracing::warn!(
                        "{}: partial export, {} record(s) written before failure",
                        endpoint.name,
                        report.rows
                    );
                    EndpointStatus::Partial
                };
                result.record_count = report.rows;
                result.skipped_records += report.skipped;
                result.output_file = Some(report.path);
                result.sha256 = Some(report.sha256);
            }
            Err(e) => {
                tracing::error!("{}: export failed: {}", endpoint.name, e);
                result.error = Some(match result.error.take() {
                    Some(fetch_error) => format!("{}; export failed: {}", fetch_error, e),
                    None => e.to_string(),
                });
            }
        }

        result
    }
}
