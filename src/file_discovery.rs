use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{NfoError, Result};

/// Extensions picked up by default when a directory is given
pub const DEFAULT_EXTENSIONS: &[&str] = &["nfo", "xml"];

/// Finds NFO documents under a directory for batch runs
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lowercase extensions without the dot
    extensions: Vec<String>,
    exclude_set: Option<GlobSet>,
    /// Descend into subdirectories
    recursive: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude_set: None,
            recursive: false,
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip paths matching any of the glob patterns
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            self.exclude_set = None;
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| NfoError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
            builder.add(glob);
        }

        self.exclude_set = Some(
            builder
                .build()
                .map_err(|e| NfoError::Config(format!("Failed to build exclude set: {}", e)))?,
        );
        Ok(self)
    }

    /// Files to process for `path`, sorted.
    ///
    /// A file is returned as-is regardless of its extension. A directory is
    /// scanned for matching files, descending only when recursive.
    /// Unreadable subdirectories are logged and skipped.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| traversal_error(path, e))?;

        if metadata.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        let mut top_level = true;

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if top_level => return Err(traversal_error(&dir, e)),
                Err(e) => {
                    warn!("Skipping {}: {}", dir.display(), e);
                    continue;
                }
            };
            top_level = false;

            let mut entries = entries;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| traversal_error(&dir, e))?
            {
                let entry_path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!("Skipping {}: {}", entry_path.display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if self.recursive && !self.is_excluded(&entry_path) {
                        pending.push(entry_path);
                    }
                } else if file_type.is_file() && self.should_process(&entry_path) {
                    files.push(entry_path);
                }
            }
        }

        files.sort();
        debug!("Discovered {} files under {}", files.len(), path.display());
        Ok(files)
    }

    /// Extension and exclude-pattern check for a single file
    pub fn should_process(&self, path: &Path) -> bool {
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()));

        matches_extension && !self.is_excluded(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_set
            .as_ref()
            .is_some_and(|set| set.is_match(path))
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn traversal_error(path: &Path, error: std::io::Error) -> NfoError {
    NfoError::FileSystemTraversal {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
