//! Toolchain executable discovery.

use std::path::{Path, PathBuf};

use crate::core::Context;
use crate::util::process::is_executable;

use super::ProbeError;

/// Where executables are looked up.
///
/// Without a cross-compile root this is the process `PATH`; with one, a
/// fixed set of directories below the root.
#[derive(Debug, Clone, Default)]
pub struct ExecSearch {
    cross_root: Option<PathBuf>,
}

impl ExecSearch {
    pub fn new(cross_root: Option<PathBuf>) -> Self {
        ExecSearch { cross_root }
    }

    /// Read `__cross_compile_root` from the context.
    pub fn from_context(ctx: &Context) -> Result<Self, ProbeError> {
        let root = ctx
            .get_str("__cross_compile_root")?
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Ok(ExecSearch::new(root))
    }

    pub fn cross_root(&self) -> Option<&Path> {
        self.cross_root.as_deref()
    }

    /// Directories searched below the cross-compile root, in order.
    pub fn cross_dirs(root: &Path) -> Vec<PathBuf> {
        [
            "",
            "bin",
            "sbin",
            "local/bin",
            "local/sbin",
            "usr/bin",
            "usr/sbin",
            "usr/local/bin",
            "usr/local/sbin",
        ]
        .iter()
        .map(|sub| if sub.is_empty() { root.to_path_buf() } else { root.join(sub) })
        .collect()
    }

    /// Find an executable by name or path.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let as_path = Path::new(name);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            return is_executable(as_path).then(|| as_path.to_path_buf());
        }

        match self.cross_root {
            Some(ref root) => {
                let dirs = Self::cross_dirs(root);
                let found = dirs.iter().map(|d| d.join(name)).find(|p| is_executable(p));
                if found.is_none() {
                    tracing::debug!(
                        "`{}` not found below cross-compile root {}",
                        name,
                        root.display()
                    );
                }
                found
            }
            None => which::which(name).ok(),
        }
    }
}

/// Resolve the executable for a role.
///
/// An explicit `__<role>_path` wins; otherwise `__<role>_exec` is searched.
pub fn find_tool(ctx: &Context, search: &ExecSearch, role: &str) -> Result<PathBuf, ProbeError> {
    match find_optional_tool(ctx, search, role)? {
        Some(path) => Ok(path),
        None => Err(ProbeError::NotFound {
            role: role.to_string(),
            name: ctx
                .get_str(&format!("__{}_exec", role))?
                .unwrap_or_else(|| role.to_string()),
        }),
    }
}

/// Like [`find_tool`], but a tool that is not configured or not found is
/// `None`. An explicit path that is not executable is still an error.
pub fn find_optional_tool(
    ctx: &Context,
    search: &ExecSearch,
    role: &str,
) -> Result<Option<PathBuf>, ProbeError> {
    if let Some(path) = ctx.get_str(&format!("__{}_path", role))?.filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if !is_executable(&path) {
            return Err(ProbeError::NotExecutable {
                role: role.to_string(),
                path,
            });
        }
        tracing::debug!("{} = {} (explicit path)", role, path.display());
        return Ok(Some(path));
    }

    let Some(exec) = ctx.get_str(&format!("__{}_exec", role))?.filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let found = search.find(&exec);
    if let Some(ref path) = found {
        tracing::debug!("{} = {}", role, path.display());
    }
    Ok(found)
}
