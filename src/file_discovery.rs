//! Document discovery for the `map` command
//!
//! Walks a directory tree asynchronously and keeps files whose extension is
//! listed and whose path passes the include/exclude globs. Results are sorted
//! so that mapping and linking see documents in a stable order.

use crate::error::{MappingError, Result};
use globset::{GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lowercase extensions without the dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// Directory levels below the root to descend into (None = unlimited)
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

fn build_glob_set(patterns: &[String], purpose: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                MappingError::Discovery(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        builder.add(glob);
    }

    builder.build().map(Some).map_err(|e| {
        MappingError::Discovery(format!("Failed to build {} glob set: {}", purpose, e))
    })
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only keep files matching at least one of `patterns`
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.include_set = build_glob_set(&patterns, "include")?;
        Ok(self)
    }

    /// Drop files matching any of `patterns`
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.exclude_set = build_glob_set(&patterns, "exclude")?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Documents under `path`, or `path` itself when it is a matching file
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;

        if metadata.is_file() {
            return Ok(if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut files = Vec::new();
        self.walk_directory(path, 0, &mut files).await?;
        files.sort();
        Ok(files)
    }

    fn walk_directory<'a>(
        &'a self,
        dir: &'a Path,
        depth: usize,
        files: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            let mut read_dir = fs::read_dir(dir).await?;

            while let Some(entry) = read_dir.next_entry().await? {
                let entry_path = entry.path();
                if entry_path.is_symlink() && !self.follow_symlinks {
                    continue;
                }

                // unreadable entries are skipped, not fatal
                let metadata = match fs::metadata(&entry_path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!(path = %entry_path.display(), error = %e, "skipping entry");
                        continue;
                    }
                };

                if metadata.is_file() {
                    if self.should_process(&entry_path) {
                        files.push(entry_path);
                    }
                } else if metadata.is_dir()
                    && self.max_depth.is_none_or(|max_depth| depth < max_depth)
                    && let Err(e) = self.walk_directory(&entry_path, depth + 1, files).await
                {
                    tracing::warn!(path = %entry_path.display(), error = %e, "skipping directory");
                }
            }

            Ok(())
        })
    }

    /// Extension check, then exclude globs, then include globs
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(path),
            None => true,
        }
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
