//! Per-job scratch directory management.
//!
//! Every job gets its own directory under an explicit root, named after the
//! job identifier and nothing else. URL- or tool-supplied strings never feed
//! into the directory name, so two jobs can never collide and a crafted URL
//! can never escape the root. The pipeline writes here and never deletes;
//! reclamation is an external policy, because the caller still has to read
//! the produced file back.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// True when `s` is usable as a single path component: no separators, no
/// parent references, nothing that could traverse out of the root.
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.bytes().any(|b| matches!(b, b'/' | b'\\' | b'\0'))
}

/// Allocates and inspects job scratch directories under one root.
///
/// The root is passed in explicitly rather than read from ambient process
/// state (cwd, shared temp dir) so tests can redirect it.
#[derive(Debug, Clone)]
pub struct ScratchDirs {
    root: PathBuf,
}

impl ScratchDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (if absent) and return the scratch directory for a job.
    pub async fn allocate(&self, job_id: &str) -> Result<PathBuf> {
        if !is_safe_component(job_id) {
            return Err(Error::validation(format!(
                "unsafe job identifier: {job_id:?}"
            )));
        }
        let dir = self.root.join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Resolve a produced file inside a job's scratch directory, refusing
    /// identifiers or filenames that are not plain path components.
    pub fn job_file(&self, job_id: &str, filename: &str) -> Result<PathBuf> {
        if !is_safe_component(job_id) {
            return Err(Error::validation(format!(
                "unsafe job identifier: {job_id:?}"
            )));
        }
        if !is_safe_component(filename) {
            return Err(Error::validation(format!("unsafe filename: {filename:?}")));
        }
        Ok(self.root.join(job_id).join(filename))
    }
}

/// List filenames in `dir` carrying `extension`. An empty result is not an
/// error; the caller decides what an empty directory means.
pub async fn list_outputs(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}
