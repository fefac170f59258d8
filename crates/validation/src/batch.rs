//! Concurrent validation of many sources.
//!
//! Each source is loaded through a [`DatasetLoader`], converted to a dataset,
//! validated and filtered. Files run concurrently up to
//! `max_concurrent_files`; the CPU-bound part of each file runs on the
//! blocking pool. A failing file is recorded and the batch carries on.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use gaitspec_core::{
    Dataset, SchemaConfig, SpecVersion, Specification, StructuralError, Table, Time, Warning,
};
use gaitspec_progress::{CancellationToken, NoopProgress, ProgressCounter, ProgressSink};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::BatchConfig;
use crate::error::{Result, ValidationError};
use crate::filter::{FilterOutcome, FilterStats, StrideFilter};
use crate::report::ValidationReport;
use crate::validator::RangeValidator;

/// Loads one source into a table. Implemented by the data-loading layer.
#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Load `source` (a path, URL or key understood by the loader).
    async fn load(&self, source: &str) -> anyhow::Result<Table>;
}

/// Load every source, at most `max_concurrent` at a time, keeping input order.
pub async fn load_sources(
    loader: Arc<dyn DatasetLoader>,
    sources: &[String],
    max_concurrent: usize,
) -> Vec<(String, anyhow::Result<Table>)> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut set = JoinSet::new();
    for (index, source) in sources.iter().cloned().enumerate() {
        let loader = Arc::clone(&loader);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let loaded = match semaphore.acquire_owned().await {
                Ok(_permit) => load_isolated(loader, &source).await,
                Err(e) => Err(anyhow::anyhow!(e)),
            };
            (index, source, loaded)
        });
    }

    let mut loaded = Vec::with_capacity(sources.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(entry) => loaded.push(entry),
            Err(e) => tracing::warn!("Loader task failed: {}", e),
        }
    }
    loaded.sort_by_key(|(index, _, _)| *index);
    loaded.into_iter().map(|(_, source, table)| (source, table)).collect()
}

/// Run one load on its own task so a panicking loader fails only its source.
async fn load_isolated(loader: Arc<dyn DatasetLoader>, source: &str) -> anyhow::Result<Table> {
    let owned = source.to_string();
    match tokio::spawn(async move { loader.load(&owned).await }).await {
        Ok(loaded) => loaded,
        Err(e) if e.is_panic() => Err(anyhow::anyhow!("loader panicked on {}", source)),
        Err(e) => Err(anyhow::anyhow!("loader task failed on {}: {}", source, e)),
    }
}

/// A file that made it through validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValidation {
    /// Filtered dataset with statistics
    pub outcome: FilterOutcome,

    /// Report of the run
    pub report: ValidationReport,

    /// Warnings raised while turning the table into strides
    pub load_warnings: Vec<Warning>,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FileResult {
    /// Validated and filtered
    Validated(Box<FileValidation>),
    /// Rejected before any stride-level check
    StructuralFailure(StructuralError),
    /// Could not be loaded or validated
    Failed(String),
}

impl FileResult {
    /// Filter statistics; structural and other failures count as invalid.
    pub fn stats(&self, source: &str) -> FilterStats {
        match self {
            FileResult::Validated(file) => file.outcome.stats.clone(),
            FileResult::StructuralFailure(_) | FileResult::Failed(_) => {
                FilterStats::structural_failure(source)
            }
        }
    }
}

/// Result for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Source as given to the loader
    pub source: String,

    /// Result
    pub result: FileResult,
}

impl FileOutcome {
    /// The validation, when the file got that far.
    pub fn validation(&self) -> Option<&FileValidation> {
        match &self.result {
            FileResult::Validated(file) => Some(file),
            _ => None,
        }
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per source
    pub files: Vec<FileOutcome>,

    /// Version every file was validated against
    pub spec_version: SpecVersion,

    /// Batch start
    pub started_at: Time,

    /// Wall-clock duration
    pub duration_ms: u64,
}

impl BatchReport {
    /// Files validated.
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.validation().is_some()).count()
    }

    /// Files that failed to load or were structurally rejected.
    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    /// Files whose dataset is valid.
    pub fn valid_datasets(&self) -> usize {
        self.files
            .iter()
            .filter_map(FileOutcome::validation)
            .filter(|f| f.outcome.stats.dataset_valid)
            .count()
    }

    /// Filtered datasets of the validated files.
    pub fn filtered_datasets(&self) -> Vec<&Dataset> {
        self.files
            .iter()
            .filter_map(FileOutcome::validation)
            .map(|f| &f.outcome.dataset)
            .collect()
    }
}

/// Runs the load → validate → filter pipeline over many sources.
#[derive(Clone)]
pub struct BatchValidator {
    config: BatchConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl BatchValidator {
    /// Create a batch validator.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Report per-file progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Observe `token` for cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Validate every source against `spec`.
    ///
    /// Per-file failures end up in the report. Only cancellation aborts the
    /// batch.
    pub async fn validate_sources(
        &self,
        loader: Arc<dyn DatasetLoader>,
        sources: &[String],
        spec: Arc<Specification>,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let started_at = chrono::Utc::now();
        tracing::info!(
            "Batch validating {} sources against {} ({} at a time)",
            sources.len(),
            spec.version,
            self.config.max_concurrent_files
        );

        let counter = ProgressCounter::start(self.progress.as_ref(), "batch", sources.len(), 1);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_files.max(1)));
        let validator = RangeValidator::new(self.config.validation.clone())
            .with_cancellation(self.cancel.clone());
        let filter = StrideFilter::new().with_policy(self.config.validity);

        let mut set = JoinSet::new();
        for (index, source) in sources.iter().cloned().enumerate() {
            let loader = Arc::clone(&loader);
            let semaphore = Arc::clone(&semaphore);
            let spec = Arc::clone(&spec);
            let validator = validator.clone();
            let filter = filter.clone();
            let schema = self.config.schema.clone();
            let cancel = self.cancel.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                let result = match load_isolated(loader, &source).await {
                    Ok(table) => tokio::task::spawn_blocking(move || {
                        process(&table, &schema, &validator, &filter, &spec)
                    })
                    .await
                    .unwrap_or_else(|e| FileResult::Failed(format!("validation task failed: {}", e))),
                    Err(e) => FileResult::Failed(format!("{:#}", e)),
                };
                Some((index, FileOutcome { source, result }))
            });
        }

        let mut files = Vec::with_capacity(sources.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Some((index, outcome))) => {
                    match &outcome.result {
                        FileResult::Validated(_) => {}
                        FileResult::StructuralFailure(e) => {
                            tracing::warn!("{} rejected: {}", outcome.source, e)
                        }
                        FileResult::Failed(reason) => {
                            tracing::warn!("{} failed: {}", outcome.source, reason)
                        }
                    }
                    counter.tick();
                    files.push((index, outcome));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Batch task failed: {}", e),
            }
        }

        if self.cancel.is_cancelled() {
            tracing::warn!("Batch cancelled after {}/{} files", counter.processed(), sources.len());
            return Err(ValidationError::Cancelled {
                operation: "batch".to_string(),
                processed: counter.processed(),
                total: sources.len(),
            });
        }

        files.sort_by_key(|(index, _)| *index);
        if files.len() < sources.len() {
            let mut complete = Vec::with_capacity(sources.len());
            let mut reported = files.into_iter().peekable();
            for (index, source) in sources.iter().enumerate() {
                match reported.next_if(|(i, _)| *i == index) {
                    Some(entry) => complete.push(entry),
                    None => complete.push((
                        index,
                        FileOutcome {
                            source: source.clone(),
                            result: FileResult::Failed("batch task ended abnormally".to_string()),
                        },
                    )),
                }
            }
            files = complete;
        }
        let report = BatchReport {
            files: files.into_iter().map(|(_, outcome)| outcome).collect(),
            spec_version: spec.version,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Batch finished: {} validated, {} failed, {} valid datasets ({} ms)",
            report.succeeded(),
            report.failed(),
            report.valid_datasets(),
            report.duration_ms
        );
        Ok(report)
    }
}

fn process(
    table: &Table,
    schema: &SchemaConfig,
    validator: &RangeValidator,
    filter: &StrideFilter,
    spec: &Specification,
) -> FileResult {
    let (dataset, load_warnings) = match table.to_dataset(schema) {
        Ok(converted) => converted,
        Err(e) => return FileResult::StructuralFailure(e),
    };
    match validator.validate(&dataset, spec) {
        Ok(result) => {
            let outcome = filter.apply(&dataset, &result);
            let report = ValidationReport::build(&result, &outcome);
            FileResult::Validated(Box::new(FileValidation {
                outcome,
                report,
                load_warnings,
            }))
        }
        Err(ValidationError::Structural(e)) => FileResult::StructuralFailure(e),
        Err(e) => FileResult::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{knee_spec, KNEE};
    use gaitspec_core::{phase_percent, PHASE_POINTS};
    use gaitspec_progress::ProgressRecorder;
    use std::collections::HashMap;

    /// Serves prebuilt tables by name.
    struct MemoryLoader {
        tables: HashMap<String, Table>,
    }

    #[async_trait]
    impl DatasetLoader for MemoryLoader {
        async fn load(&self, source: &str) -> anyhow::Result<Table> {
            self.tables
                .get(source)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such source: {}", source))
        }
    }

    /// Walking table with one stride per knee value.
    fn walking_table(name: &str, knee: &[f64]) -> Table {
        let rows = knee.len() * PHASE_POINTS;
        let mut cycles = Vec::with_capacity(rows);
        let mut phases = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for (c, &v) in knee.iter().enumerate() {
            for i in 0..PHASE_POINTS {
                cycles.push((c + 1).to_string());
                phases.push(phase_percent(i));
                values.push(v);
            }
        }
        Table::new(name)
            .with_text("subject", vec!["S1".to_string(); rows])
            .with_text("trial", vec!["1".to_string(); rows])
            .with_text("cycle", cycles)
            .with_text("task", vec!["walking".to_string(); rows])
            .with_numeric("phase", phases)
            .with_numeric(KNEE, values)
    }

    fn loader() -> Arc<dyn DatasetLoader> {
        let mut tables = HashMap::new();
        tables.insert("good".to_string(), walking_table("good", &[0.5, 0.6, 0.7]));
        tables.insert("mixed".to_string(), walking_table("mixed", &[0.5, 1.5, 1.6, 0.4]));
        tables.insert(
            "timed".to_string(),
            Table::new("timed").with_numeric("time_s", vec![0.0, 0.01]),
        );
        Arc::new(MemoryLoader { tables })
    }

    /// Panics on one source, serves the rest from `inner`.
    struct PanickingLoader {
        inner: Arc<dyn DatasetLoader>,
        poison: &'static str,
    }

    #[async_trait]
    impl DatasetLoader for PanickingLoader {
        async fn load(&self, source: &str) -> anyhow::Result<Table> {
            if source == self.poison {
                panic!("corrupt file {}", source);
            }
            self.inner.load(source).await
        }
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_panicking_loader_fails_only_its_file() {
        let loader: Arc<dyn DatasetLoader> = Arc::new(PanickingLoader {
            inner: loader(),
            poison: "boom",
        });
        let report = BatchValidator::default()
            .validate_sources(
                Arc::clone(&loader),
                &sources(&["good", "boom", "mixed"]),
                Arc::new(knee_spec()),
            )
            .await
            .unwrap();

        let names: Vec<&str> = report.files.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(names, ["good", "boom", "mixed"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        match &report.files[1].result {
            FileResult::Failed(reason) => assert!(reason.contains("panicked")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(report.files[0].validation().unwrap().outcome.stats.valid, 3);

        let loaded = load_sources(loader, &sources(&["boom", "good"]), 2).await;
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].1.is_err());
        assert!(loaded[1].1.is_ok());
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order_and_isolates_failures() {
        let batch = BatchValidator::new(BatchConfig::default().with_max_concurrent_files(2));
        let report = batch
            .validate_sources(
                loader(),
                &sources(&["mixed", "missing", "good", "timed"]),
                Arc::new(knee_spec()),
            )
            .await
            .unwrap();

        let names: Vec<&str> = report.files.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(names, ["mixed", "missing", "good", "timed"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 2);

        let mixed = report.files[0].validation().unwrap();
        assert_eq!(mixed.outcome.stats.valid, 2);
        assert_eq!(mixed.outcome.stats.invalid, 2);

        assert!(matches!(&report.files[1].result, FileResult::Failed(r) if r.contains("no such source")));
        assert!(matches!(
            report.files[3].result,
            FileResult::StructuralFailure(StructuralError::NotPhaseIndexed { .. })
        ));
        assert!(!report.files[3].result.stats("timed").structural_valid);
    }

    #[tokio::test]
    async fn test_batch_reports_progress_per_file() {
        let recorder = Arc::new(ProgressRecorder::new());
        let batch = BatchValidator::default().with_progress(recorder.clone());
        batch
            .validate_sources(loader(), &sources(&["good", "mixed"]), Arc::new(knee_spec()))
            .await
            .unwrap();
        let processed: Vec<usize> = recorder.events().iter().map(|e| e.processed).collect();
        assert_eq!(processed, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_batch_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let batch = BatchValidator::default().with_cancellation(token);
        let err = batch
            .validate_sources(loader(), &sources(&["good", "mixed"]), Arc::new(knee_spec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Cancelled { processed: 0, total: 2, .. }));
    }

    #[tokio::test]
    async fn test_filtered_datasets_feed_downstream() {
        let report = BatchValidator::default()
            .validate_sources(loader(), &sources(&["good", "mixed"]), Arc::new(knee_spec()))
            .await
            .unwrap();
        let sizes: Vec<usize> = report.filtered_datasets().iter().map(|d| d.len()).collect();
        assert_eq!(sizes, vec![3, 2]);
        assert_eq!(report.valid_datasets(), 2);
    }

    #[tokio::test]
    async fn test_load_sources_keeps_order() {
        let loaded = load_sources(loader(), &sources(&["timed", "nope", "good"]), 1).await;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].0, "timed");
        assert!(loaded[1].1.is_err());
        assert_eq!(loaded[2].1.as_ref().unwrap().name, "good");
    }
}
