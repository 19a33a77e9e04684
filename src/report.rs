//! Report run coordinator.
//!
//! A run walks `Validating -> AggregatingInsights -> RenderingCharts ->
//! ComposingDocument -> Done`. Any error moves it straight to `Failed` and
//! nothing is written. Only one run may be active per generator.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::chart::render_report_charts;
use crate::compose::{render_pdf, report_file_name, ComposeOptions, ComposedDocument};
use crate::config::ReportConfig;
use crate::data::ingest::{fingerprint, validate_for_report, LoadedDataset};
use crate::error::{ReportError, ReportResult};
use crate::insight::{request_narrative_insights, InsightOptions, NarrativeService};
use crate::logging::{log, log_audit, obj, v_num, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Validating,
    AggregatingInsights,
    RenderingCharts,
    ComposingDocument,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::AggregatingInsights => "aggregating_insights",
            RunState::RenderingCharts => "rendering_charts",
            RunState::ComposingDocument => "composing_document",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle | Done | Failed, Validating) => true,
            (Validating, AggregatingInsights) => true,
            (AggregatingInsights, RenderingCharts) => true,
            (RenderingCharts, ComposingDocument) => true,
            (ComposingDocument, Done) => true,
            (Validating | AggregatingInsights | RenderingCharts | ComposingDocument, Failed) => {
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub bytes_written: usize,
    pub sha256: String,
    /// Fingerprint of the uploaded JSON the report was built from.
    pub input_sha256: String,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    pub message: String,
    pub error_kind: Option<&'static str>,
    pub artifact: Option<ReportArtifact>,
}

impl RunStatus {
    fn idle() -> Self {
        Self {
            state: RunState::Idle,
            message: String::new(),
            error_kind: None,
            artifact: None,
        }
    }
}

/// Destination for finished documents.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn persist(&self, file_name: &str, bytes: &[u8]) -> ReportResult<PathBuf>;
}

/// Writes documents into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn persist(&self, file_name: &str, bytes: &[u8]) -> ReportResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ReportError::Persist(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(file_name);
        // Write beside the target and rename so a reader never sees a torn file.
        let tmp = path.with_extension("pdf.part");
        std::fs::write(&tmp, bytes)
            .map_err(|e| ReportError::Persist(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| ReportError::Persist(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub insight: InsightOptions,
    pub comparison_count: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            insight: InsightOptions::default(),
            comparison_count: 10,
        }
    }
}

impl RunSettings {
    pub fn from_config(cfg: &ReportConfig) -> Self {
        Self {
            insight: InsightOptions {
                mode: cfg.insight_mode,
                driver_fraction: cfg.driver_fraction,
                driver_limit: cfg.driver_limit,
            },
            comparison_count: cfg.comparison_count,
        }
    }
}

/// Clears the busy flag when the run ends, however it ends.
struct RunGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(busy: &'a AtomicBool) -> ReportResult<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReportError::Busy)?;
        Ok(Self { busy })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct ReportGenerator {
    service: Arc<dyn NarrativeService>,
    store: Arc<dyn ArtifactStore>,
    settings: RunSettings,
    busy: AtomicBool,
    status: watch::Sender<RunStatus>,
}

impl ReportGenerator {
    pub fn new(
        service: Arc<dyn NarrativeService>,
        store: Arc<dyn ArtifactStore>,
        settings: RunSettings,
    ) -> Self {
        let (status, _) = watch::channel(RunStatus::idle());
        Self {
            service,
            store,
            settings,
            busy: AtomicBool::new(false),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn publish(&self, state: RunState, message: &str) {
        let current = self.status.borrow().state;
        if !current.can_advance_to(state) {
            log(
                Level::Error,
                Domain::Report,
                "illegal_transition",
                obj(&[("from", v_str(current.as_str())), ("state", v_str(state.as_str()))]),
            );
            return;
        }
        log(
            Level::Info,
            Domain::Report,
            "transition",
            obj(&[("state", v_str(state.as_str())), ("msg", v_str(message))]),
        );
        self.status.send_replace(RunStatus {
            state,
            message: message.to_string(),
            error_kind: None,
            artifact: None,
        });
    }

    /// Run the full pipeline using today's local date for the document.
    pub async fn generate(
        &self,
        dataset: Option<&LoadedDataset>,
        credential: Option<&str>,
    ) -> ReportResult<ReportArtifact> {
        self.generate_on(dataset, credential, Local::now().date_naive()).await
    }

    /// Run the full pipeline. A second call while one is in flight fails
    /// with `Busy` and leaves the active run's status alone.
    pub async fn generate_on(
        &self,
        dataset: Option<&LoadedDataset>,
        credential: Option<&str>,
        date: NaiveDate,
    ) -> ReportResult<ReportArtifact> {
        let _guard = match RunGuard::acquire(&self.busy) {
            Ok(guard) => guard,
            Err(err) => {
                let fields = obj(&[("kind", v_str(err.kind()))]);
                log(Level::Warn, Domain::Report, "run_rejected", fields);
                return Err(err);
            }
        };

        self.publish(RunState::Validating, "Generating report...");
        match self.run(dataset, credential, date).await {
            Ok(artifact) => {
                log(
                    Level::Info,
                    Domain::Report,
                    "run_done",
                    obj(&[
                        ("path", v_str(&artifact.path.display().to_string())),
                        ("pages", v_num(artifact.pages as f64)),
                        ("bytes", v_num(artifact.bytes_written as f64)),
                    ]),
                );
                self.status.send_replace(RunStatus {
                    state: RunState::Done,
                    message: format!(
                        "Report generated successfully! Saved to {}",
                        artifact.path.display()
                    ),
                    error_kind: None,
                    artifact: Some(artifact.clone()),
                });
                Ok(artifact)
            }
            Err(err) => {
                let from = self.status.borrow().state;
                log(
                    Level::Error,
                    Domain::Report,
                    "run_failed",
                    obj(&[
                        ("from", v_str(from.as_str())),
                        ("kind", v_str(err.kind())),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                self.status.send_replace(RunStatus {
                    state: RunState::Failed,
                    message: err.user_message(),
                    error_kind: Some(err.kind()),
                    artifact: None,
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        dataset: Option<&LoadedDataset>,
        credential: Option<&str>,
        date: NaiveDate,
    ) -> ReportResult<ReportArtifact> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ReportError::Validation("Please enter your Gemini API key".to_string())
            })?;
        let dataset = dataset
            .ok_or_else(|| ReportError::Validation("Please load JSON data first".to_string()))?;
        let data = dataset.data.as_ref();
        validate_for_report(data)?;

        self.publish(RunState::AggregatingInsights, "Analyzing data with Gemini AI...");
        let insights = request_narrative_insights(
            self.service.as_ref(),
            data,
            credential,
            &self.settings.insight,
        )
        .await?;

        self.publish(RunState::RenderingCharts, "Generating charts...");
        let charts = render_report_charts(data, self.settings.comparison_count).await?;

        self.publish(RunState::ComposingDocument, "Creating PDF report...");
        let opts = ComposeOptions {
            generated: date,
            driver_fraction: self.settings.insight.driver_fraction,
            driver_limit: self.settings.insight.driver_limit,
        };
        let ComposedDocument { bytes, pages } = render_pdf(data, &insights, &charts, &opts)?;

        let path = self.store.persist(&report_file_name(date), &bytes).await?;
        let sha256 = fingerprint(&bytes);
        log_audit("report_written", &dataset.sha256, &sha256);

        Ok(ReportArtifact {
            path,
            bytes_written: bytes.len(),
            sha256,
            input_sha256: dataset.sha256.clone(),
            pages,
        })
    }
}
