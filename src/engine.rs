//! Mapping engine for whole directories of documents
//!
//! Document files are read and parsed concurrently on tokio tasks, bounded by
//! a semaphore. Parsed documents are then mapped one at a time on the calling
//! task, since instances are `Rc` based, and all forests go through a single
//! linker pass when linking is enabled.

use futures::future::try_join_all;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DocumentError, MappingError, Result};
use crate::file_discovery::FileDiscovery;
use crate::linker::{LinkReport, Linker};
use crate::mapper::{Forest, Mapper};
use crate::registry::SchemaRegistry;
use crate::reporter::{Diagnostic, Level, Reporter};

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of documents read and parsed at the same time
    pub max_concurrent_loads: usize,
    /// Run the linker over all mapped forests
    pub link: bool,
    /// Stop mapping after the first document that fails
    pub fail_fast: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            link: false,
            fail_fast: false,
        }
    }
}

/// Outcome of mapping a single document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Document mapped into a forest
    Mapped { instances: usize },
    /// Document does not conform to the schema
    Invalid { message: String },
    /// Document could not be read or parsed
    Error { message: String },
}

impl DocumentStatus {
    pub fn is_mapped(&self) -> bool {
        matches!(self, DocumentStatus::Mapped { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, DocumentStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DocumentStatus::Error { .. })
    }
}

/// Result of mapping a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub path: PathBuf,
    pub status: DocumentStatus,
    /// Load and map time
    pub duration: Duration,
    /// Warnings reported while mapping this document
    pub warnings: usize,
}

impl DocumentResult {
    fn failed(path: PathBuf, error: &MappingError, duration: Duration, warnings: usize) -> Self {
        let message = error.to_string();
        let status = match error {
            MappingError::Validation(_) | MappingError::Structural(_) => {
                DocumentStatus::Invalid { message }
            }
            _ => DocumentStatus::Error { message },
        };
        Self {
            path,
            status,
            duration,
            warnings,
        }
    }
}

/// Outcome of the linker pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub report: Option<LinkReport>,
    /// First failed assignment, if any
    pub error: Option<String>,
    pub warnings: usize,
}

impl LinkSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated results of mapping multiple documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResults {
    pub total_files: usize,
    pub mapped_files: usize,
    pub invalid_files: usize,
    pub error_files: usize,
    pub total_instances: usize,
    pub total_warnings: usize,
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub file_results: Vec<DocumentResult>,
    pub link: Option<LinkSummary>,
}

impl MappingResults {
    /// Aggregate individual document results into a summary
    pub fn aggregate(file_results: Vec<DocumentResult>) -> Self {
        let total_files = file_results.len();
        let mut mapped_files = 0;
        let mut invalid_files = 0;
        let mut error_files = 0;
        let mut total_instances = 0;
        let mut total_warnings = 0;
        let mut total_duration = Duration::ZERO;

        for result in &file_results {
            match result.status {
                DocumentStatus::Mapped { instances } => {
                    mapped_files += 1;
                    total_instances += instances;
                }
                DocumentStatus::Invalid { .. } => invalid_files += 1,
                DocumentStatus::Error { .. } => error_files += 1,
            }
            total_warnings += result.warnings;
            total_duration += result.duration;
        }

        let average_duration = if total_files > 0 {
            total_duration / total_files as u32
        } else {
            Duration::ZERO
        };

        Self {
            total_files,
            mapped_files,
            invalid_files,
            error_files,
            total_instances,
            total_warnings,
            total_duration,
            average_duration,
            file_results,
            link: None,
        }
    }

    fn with_link(mut self, link: LinkSummary) -> Self {
        self.total_warnings += link.warnings;
        self.link = Some(link);
        self
    }

    /// Every document mapped and linking, if run, succeeded
    pub fn all_mapped(&self) -> bool {
        self.total_files > 0 && self.mapped_files == self.total_files && !self.link_failed()
    }

    pub fn has_errors(&self) -> bool {
        self.invalid_files > 0 || self.error_files > 0 || self.link_failed()
    }

    pub fn link_failed(&self) -> bool {
        self.link.as_ref().is_some_and(|link| !link.succeeded())
    }

    /// Mapped documents as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.mapped_files as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Forests of one engine run and their summary
#[derive(Debug)]
pub struct MappingSession {
    pub results: MappingResults,
    pub forests: Vec<Forest>,
}

/// Forwards to the session reporter and counts warnings
struct Tally {
    inner: Rc<dyn Reporter>,
    warnings: Cell<usize>,
}

impl Tally {
    fn new(inner: Rc<dyn Reporter>) -> Rc<Self> {
        Rc::new(Self {
            inner,
            warnings: Cell::new(0),
        })
    }
}

impl Reporter for Tally {
    fn report(&self, diagnostic: Diagnostic) {
        if diagnostic.level == Level::Warning {
            self.warnings.set(self.warnings.get() + 1);
        }
        self.inner.report(diagnostic);
    }
}

type Loaded = (PathBuf, Duration, std::result::Result<Document, DocumentError>);

/// Maps document files against one schema registry
pub struct MappingEngine {
    registry: Rc<SchemaRegistry>,
    reporter: Rc<dyn Reporter>,
    config: EngineConfig,
}

impl MappingEngine {
    pub fn new(
        registry: Rc<SchemaRegistry>,
        reporter: Rc<dyn Reporter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            reporter,
            config,
        }
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Discover documents under `path` and map them
    pub async fn map_path(
        &self,
        path: &Path,
        file_discovery: &FileDiscovery,
    ) -> Result<MappingSession> {
        let files = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            file_discovery.discover_files(path).await?
        };
        tracing::info!(files = files.len(), path = %path.display(), "discovered documents");
        self.map_files(files).await
    }

    /// Load, map and optionally link `files`
    ///
    /// Per-document failures end up in the results. Only task failures and
    /// linker misconfiguration are returned as errors.
    pub async fn map_files(&self, files: Vec<PathBuf>) -> Result<MappingSession> {
        let loaded = self.load_documents(files).await?;

        let mut file_results = Vec::with_capacity(loaded.len());
        let mut forests = Vec::new();

        for (path, load_duration, document) in loaded {
            let started = Instant::now();
            let tally = Tally::new(Rc::clone(&self.reporter));

            let outcome = document
                .map_err(MappingError::from)
                .and_then(|document| {
                    Mapper::new(Rc::clone(&self.registry), tally.clone()).parse(&document)
                });
            let duration = load_duration + started.elapsed();
            let warnings = tally.warnings.get();

            match outcome {
                Ok(forest) => {
                    tracing::debug!(path = %path.display(), instances = forest.len(), "mapped");
                    file_results.push(DocumentResult {
                        path,
                        status: DocumentStatus::Mapped {
                            instances: forest.len(),
                        },
                        duration,
                        warnings,
                    });
                    forests.push(forest);
                }
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "mapping failed");
                    file_results.push(DocumentResult::failed(path, &err, duration, warnings));
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        let results = MappingResults::aggregate(file_results);
        if !self.config.link || forests.is_empty() {
            return Ok(MappingSession { results, forests });
        }

        let tally = Tally::new(Rc::clone(&self.reporter));
        let linker = Linker::new(forests, vec![Rc::clone(&self.registry)], tally.clone())?;
        let summary = match linker.link() {
            Ok(report) => LinkSummary {
                report: Some(report),
                error: None,
                warnings: tally.warnings.get(),
            },
            Err(err) => LinkSummary {
                report: None,
                error: Some(err.to_string()),
                warnings: tally.warnings.get(),
            },
        };

        Ok(MappingSession {
            results: results.with_link(summary),
            forests: linker.into_forests(),
        })
    }

    /// Read and parse `files` concurrently, keeping their order
    async fn load_documents(&self, files: Vec<PathBuf>) -> Result<Vec<Loaded>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_loads.max(1),
        ));

        let load_tasks: Vec<_> = files
            .into_iter()
            .map(|file_path| {
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        MappingError::Concurrency {
                            details: "Failed to acquire load semaphore".to_string(),
                        }
                    })?;

                    let started = Instant::now();
                    let document = Document::load(&file_path).await;
                    Ok::<Loaded, MappingError>((file_path, started.elapsed(), document))
                })
            })
            .collect();

        let task_results =
            try_join_all(load_tasks)
                .await
                .map_err(|e| MappingError::Concurrency {
                    details: format!("Task join error: {}", e),
                })?;

        task_results.into_iter().collect()
    }
}
