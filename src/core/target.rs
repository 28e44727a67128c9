//! Target definitions - what gets built.
//!
//! A [`Target`] is a declared target after conditions have been applied and
//! every field has been formatted through the context. Its [`TargetKind`]
//! decides the output location and the rule that produces it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;

/// The kind of target being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Executable binary
    Executable,

    /// Shared library (.so / .dll)
    DynamicLibrary,

    /// Static archive (.a)
    StaticLibrary,
}

impl TargetKind {
    /// Directory under the temp root that receives this kind's output.
    pub fn output_dir(&self) -> &'static str {
        match self {
            TargetKind::Executable => "bin",
            TargetKind::DynamicLibrary | TargetKind::StaticLibrary => "lib",
        }
    }

    /// Get the typical file extension for this target kind.
    pub fn extension(&self, windows: bool) -> &'static str {
        match self {
            TargetKind::Executable if windows => "exe",
            TargetKind::Executable => "",
            TargetKind::DynamicLibrary if windows => "dll",
            TargetKind::DynamicLibrary => "so",
            TargetKind::StaticLibrary => "a",
        }
    }

    /// Get the typical file prefix for this target kind.
    pub fn prefix(&self, windows: bool) -> &'static str {
        match self {
            TargetKind::Executable => "",
            TargetKind::DynamicLibrary | TargetKind::StaticLibrary if windows => "",
            TargetKind::DynamicLibrary | TargetKind::StaticLibrary => "lib",
        }
    }

    /// Get the output filename for a target.
    ///
    /// A name that already carries the prefix or extension is not decorated
    /// twice.
    pub fn output_filename(&self, name: &str, windows: bool) -> String {
        let prefix = self.prefix(windows);
        let ext = self.extension(windows);

        let mut file = if name.starts_with(prefix) {
            name.to_string()
        } else {
            format!("{}{}", prefix, name)
        };
        if !ext.is_empty() && !file.ends_with(&format!(".{}", ext)) {
            file.push('.');
            file.push_str(ext);
        }
        file
    }

    /// Full output path under `temp_root`.
    pub fn output_path(&self, temp_root: &Path, name: &str, windows: bool) -> PathBuf {
        temp_root
            .join(self.output_dir())
            .join(self.output_filename(name, windows))
    }

    /// Check if this is a library (static or dynamic).
    pub fn is_library(&self) -> bool {
        matches!(self, TargetKind::StaticLibrary | TargetKind::DynamicLibrary)
    }

    /// Spec spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Executable => "executable",
            TargetKind::DynamicLibrary => "dynamic_library",
            TargetKind::StaticLibrary => "static_library",
        }
    }
}

impl FromStr for TargetKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "executable" => Ok(TargetKind::Executable),
            "dynamic_library" => Ok(TargetKind::DynamicLibrary),
            "static_library" => Ok(TargetKind::StaticLibrary),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library name used for `-l`: the file name without `lib` prefix and
/// without a library extension.
pub fn link_name(file_name: &str) -> &str {
    let stem = file_name.strip_prefix("lib").unwrap_or(file_name);
    [".so", ".dll", ".dylib", ".a", ".lib"]
        .iter()
        .find_map(|ext| stem.strip_suffix(ext))
        .unwrap_or(stem)
}

/// A fully formatted target, ready for planning.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Target name, unique within its section
    pub name: String,

    /// What kind of artifact to produce
    pub kind: TargetKind,

    /// Source globs, not yet expanded
    pub sources: Vec<String>,

    /// Dependency references (plugin, file or target name)
    pub dependencies: Vec<String>,

    /// Include directories, folded into compile flags as `-I`
    pub include_dirs: Vec<String>,

    /// Preprocessor defines, folded into compile flags as `-D`
    pub defines: Vec<String>,

    pub cflags: String,
    pub cppflags: String,
    pub asflags: String,
    pub ldflags: String,

    /// Source pattern to rule chain, checked before the built-ins
    pub rule_map: IndexMap<String, String>,
}

impl Target {
    /// Output path of this target under `temp_root`.
    pub fn output_path(&self, temp_root: &Path, windows: bool) -> PathBuf {
        self.kind.output_path(temp_root, &self.name, windows)
    }
}
