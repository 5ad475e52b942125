use std::path::{Path, PathBuf};
use ignore::WalkBuilder;

use crate::config::FilterConfig;
use crate::sink::is_sidecar_path;

/// Why a path was not digested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Directory,
    Sidecar,
    Temporary,
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    temp_prefixes: Vec<String>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

impl FileFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            temp_prefixes: config.temp_prefixes.clone(),
        }
    }

    /// Applies the noise rules in order: directories, sidecars, temp files.
    pub fn check<P: AsRef<Path>>(&self, path: P) -> Result<(), Rejection> {
        let path = path.as_ref();

        if path.is_dir() {
            return Err(Rejection::Directory);
        }
        if is_sidecar_path(path) {
            return Err(Rejection::Sidecar);
        }
        if self.is_temporary(path) {
            return Err(Rejection::Temporary);
        }
        Ok(())
    }

    pub fn should_digest<P: AsRef<Path>>(&self, path: P) -> bool {
        self.check(path).is_ok()
    }

    pub fn is_temporary<P: AsRef<Path>>(&self, path: P) -> bool {
        let Some(name) = path.as_ref().file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.temp_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }

    /// Every regular file under `root` that would be digested, sorted.
    pub fn digestible_files<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for result in WalkBuilder::new(root.as_ref())
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .build()
        {
            match result {
                Ok(entry) => {
                    let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                    if is_file && self.should_digest(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    tracing::warn!("Error walking directory: {}", err);
                }
            }
        }

        files.sort();
        files
    }
}
