//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob, Pattern};

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers only ever see the old or the complete new file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write temporary file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(())
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
///
/// Non-existent paths are made absolute against the current directory and
/// lexically cleaned.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for comp in abs.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Map a source path into the temp tree.
///
/// Paths under the current directory keep their relative layout under
/// `temp_root`; anything else is re-rooted below it.
pub fn temp_path(temp_root: &Path, path: &Path) -> PathBuf {
    let root = normalize_path(temp_root);
    let path = normalize_path(path);
    let cwd = std::env::current_dir()
        .map(|d| normalize_path(&d))
        .unwrap_or_default();

    let rel: PathBuf = match path.strip_prefix(&cwd) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect(),
    };
    root.join(rel)
}

/// Ordered base directories used to resolve relative spec paths.
///
/// The order is: the including spec's directory (if any), the current
/// directory, then the output graph's directory.
#[derive(Debug, Clone, Default)]
pub struct SearchDirs {
    dirs: Vec<PathBuf>,
}

impl SearchDirs {
    pub fn new(include_dir: Option<&Path>, graph_dir: &Path) -> Self {
        let mut dirs = Vec::new();
        if let Some(d) = include_dir {
            dirs.push(d.to_path_buf());
        }
        dirs.push(PathBuf::from("."));
        dirs.push(graph_dir.to_path_buf());
        SearchDirs { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a relative path to the first existing candidate.
    pub fn resolve(&self, rel: &str) -> Option<PathBuf> {
        let path = Path::new(rel);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|d| d.join(path))
            .find(|p| p.exists())
            .map(|p| normalize_path(&p))
    }

    /// Expand a glob against the first base directory that yields matches.
    ///
    /// Returns an empty list when nothing matches anywhere.
    pub fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        if Path::new(pattern).is_absolute() {
            return glob_files(Path::new(""), pattern);
        }
        for dir in &self.dirs {
            let found = glob_files(dir, pattern)?;
            if !found.is_empty() {
                return Ok(found.iter().map(|p| normalize_path(p)).collect());
            }
        }
        Ok(Vec::new())
    }
}

/// Find files matching a glob pattern relative to a base directory.
///
/// Only `pattern` is a glob; `base` is matched literally.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    let base = Pattern::escape(&base.to_string_lossy());
    let full_pattern = Path::new(&base).join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    for entry in glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))? {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Render a path with forward slashes for the graph file.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
