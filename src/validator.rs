//! NFO document validation.
//!
//! Each call runs parse → schema-location lookup → schema load (through the
//! shared cache) → XSD check → optional recommended-field check. Failures
//! never escape: every outcome, panics included, lands in a
//! [`ValidationReport`]. Batches run concurrently on tokio tasks bounded by
//! a semaphore, all sharing one schema cache.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::SchemaCache;
use crate::document::{Element, parse_document};
use crate::error::{LibXml2Error, NfoError, Result};
use crate::file_discovery::FileDiscovery;
use crate::libxml2::{LibXml2Wrapper, ValidationResult, join_diagnostics};
use crate::media_type::MediaType;
use crate::schema_loader::{SchemaFetcher, SchemaLoader, SchemaReference};

/// Validation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Run the recommended-field check after a passing schema check
    pub strict: bool,
    /// Maximum number of files validated at once
    pub threads: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            threads: num_cpus::get(),
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    #[serde(rename = "valid")]
    pub is_valid: bool,
    /// Schema errors first, then strict-mode warnings
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failure(error: &NfoError) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.to_string()],
        }
    }
}

/// Result of validating a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileValidationResult {
    #[serde(rename = "file")]
    pub path: PathBuf,
    #[serde(flatten)]
    pub report: ValidationReport,
    #[serde(skip)]
    pub duration: Duration,
}

impl FileValidationResult {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid
    }
}

/// Aggregated results of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResults {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    #[serde(skip)]
    pub total_duration: Duration,
    pub file_results: Vec<FileValidationResult>,
}

impl ValidationResults {
    pub fn aggregate(file_results: Vec<FileValidationResult>) -> Self {
        let valid_files = file_results.iter().filter(|r| r.is_valid()).count();
        let total_duration: Duration = file_results.iter().map(|r| r.duration).sum();

        Self {
            total_files: file_results.len(),
            valid_files,
            invalid_files: file_results.len() - valid_files,
            total_duration,
            file_results,
        }
    }

    /// True when every file passed; an empty batch counts as passing
    pub fn all_valid(&self) -> bool {
        self.invalid_files == 0
    }
}

/// Warning emitted by the recommended-field check
pub fn missing_field_warning(field: &str, media_type: MediaType) -> String {
    format!(
        "Warning: Recommended field '{}' is missing for {}",
        field, media_type
    )
}

/// Recommended fields absent below the document's media-type element
pub fn recommended_field_warnings(root: &Element) -> Vec<String> {
    let Some(media) = root.child("media") else {
        return Vec::new();
    };
    let Some((media_type, element)) = media
        .children
        .iter()
        .find_map(|child| MediaType::from_str(&child.tag).ok().map(|t| (t, child)))
    else {
        return Vec::new();
    };

    media_type
        .recommended_fields()
        .iter()
        .filter(|field| element.find_descendant(field).is_none())
        .map(|field| missing_field_warning(field, media_type))
        .collect()
}

/// Validates NFO documents against the XSD named in their schema location.
///
/// Cloning is cheap; clones share the schema cache.
#[derive(Clone)]
pub struct NfoValidator {
    cache: SchemaCache,
    wrapper: LibXml2Wrapper,
    config: ValidationConfig,
}

impl NfoValidator {
    pub fn new(loader: SchemaLoader, config: ValidationConfig) -> Self {
        Self {
            cache: SchemaCache::new(loader),
            wrapper: LibXml2Wrapper::new(),
            config,
        }
    }

    pub fn with_fetcher(fetcher: Arc<dyn SchemaFetcher>, config: ValidationConfig) -> Self {
        Self::new(SchemaLoader::new(fetcher), config)
    }

    /// Validate using the configured strictness
    pub async fn validate(&self, content: &[u8]) -> ValidationReport {
        self.validate_with(content, self.config.strict).await
    }

    /// Validate one document; never fails, never panics
    pub async fn validate_with(&self, content: &[u8], strict: bool) -> ValidationReport {
        let outcome = AssertUnwindSafe(self.run(content, strict))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(error)) => {
                debug!("Validation failed: {}", error);
                ValidationReport::failure(&error)
            }
            Err(panic) => {
                let details = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "validation panicked".to_string());
                ValidationReport::failure(&NfoError::UnexpectedValidation { details })
            }
        }
    }

    async fn run(&self, content: &[u8], strict: bool) -> Result<ValidationReport> {
        let root = parse_document(content)?;
        let reference = SchemaReference::from_root(&root)?;
        let schema = self.cache.get_or_load(&reference.url).await?;

        let wrapper = self.wrapper;
        let document = content.to_vec();
        let result = tokio::task::spawn_blocking(move || {
            wrapper.validate_memory(&schema, &document, "document.nfo")
        })
        .await
        .map_err(|e| NfoError::UnexpectedValidation {
            details: e.to_string(),
        })?
        .map_err(|e| match e {
            LibXml2Error::InvalidXml { details } => NfoError::MalformedXml { details },
            other => NfoError::UnexpectedValidation {
                details: other.to_string(),
            },
        })?;

        if let ValidationResult::Invalid { diagnostics } = &result {
            return Err(NfoError::SchemaValidation {
                details: join_diagnostics(diagnostics),
            });
        }

        let mut report = ValidationReport::valid();
        if strict {
            report.errors.extend(recommended_field_warnings(&root));
        }
        Ok(report)
    }

    /// Validate a file on disk; read failures are reported, not raised
    pub async fn validate_file(&self, path: &Path) -> FileValidationResult {
        let start = Instant::now();
        let report = match tokio::fs::read(path).await {
            Ok(content) => self.validate(&content).await,
            Err(e) => ValidationReport::failure(&NfoError::UnexpectedValidation {
                details: format!("cannot read {}: {}", path.display(), e),
            }),
        };

        if !report.is_valid {
            warn!("{} is invalid: {}", path.display(), report.errors.join("; "));
        }

        FileValidationResult {
            path: path.to_path_buf(),
            report,
            duration: start.elapsed(),
        }
    }

    /// Validate many files concurrently; results keep the input order
    pub async fn validate_files(&self, files: Vec<PathBuf>) -> Result<ValidationResults> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.threads.max(1)));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let validator = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        NfoError::UnexpectedValidation {
                            details: e.to_string(),
                        }
                    })?;
                    Ok::<_, NfoError>(validator.validate_file(&path).await)
                })
            })
            .collect();

        let mut file_results = Vec::with_capacity(tasks.len());
        for result in try_join_all(tasks)
            .await
            .map_err(|e| NfoError::UnexpectedValidation {
                details: format!("validation task failed: {}", e),
            })?
        {
            file_results.push(result?);
        }

        Ok(ValidationResults::aggregate(file_results))
    }

    /// Discover files under `path` and validate them all
    pub async fn validate_path(
        &self,
        path: &Path,
        discovery: &FileDiscovery,
    ) -> Result<ValidationResults> {
        let files = discovery.discover_files(path).await?;
        self.validate_files(files).await
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }
}
