//! Generation options and their layering.
//!
//! Options come from four places, lowest to highest precedence:
//! - Built-in defaults
//! - Project options file: `.assemblage/config.toml`
//! - Reserved keys written in the spec file itself
//! - Command-line options
//!
//! Every option ends up in the root context as a double-underscore key.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::core::{Context, Value};

/// Default spec file name.
pub const SPEC_FILE_NAME: &str = "build.toml";

/// Default graph file name inside the temp directory.
pub const GRAPH_FILE_NAME: &str = "build.ninja";

/// Default probe timeout, in seconds.
pub const DEFAULT_PROBE_TIMEOUT: u64 = 30;

/// Built-in defaults for reserved keys.
pub fn defaults() -> Vec<(&'static str, Value)> {
    vec![
        ("__temp_path", Value::from("./build")),
        ("__cc_exec", Value::from("cc")),
        ("__cpp_exec", Value::from("c++")),
        ("__as_exec", Value::from("as")),
        ("__ar_exec", Value::from("ar")),
        ("__objcopy_exec", Value::from("objcopy")),
        ("__probe", Value::from(true)),
        ("__probe_timeout", Value::from(DEFAULT_PROBE_TIMEOUT as i64)),
    ]
}

/// Options that may be set from the options file or the command line.
///
/// Keys use the long command-line option names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GenerateOptions {
    pub force_generate: Option<bool>,
    pub temp_path: Option<PathBuf>,

    pub cc_exec: Option<String>,
    pub cpp_exec: Option<String>,
    pub as_exec: Option<String>,
    pub ar_exec: Option<String>,
    pub ld_exec: Option<String>,
    pub objcopy_exec: Option<String>,

    pub cc_path: Option<PathBuf>,
    pub cpp_path: Option<PathBuf>,
    pub as_path: Option<PathBuf>,
    pub ar_path: Option<PathBuf>,
    pub ld_path: Option<PathBuf>,
    pub objcopy_path: Option<PathBuf>,

    /// Root of a cross toolchain; executables are searched below it
    pub cross_compile_root: Option<PathBuf>,

    pub system: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub abi: Option<String>,

    /// Extra flags baked into the compile and link rules
    pub cc_flags: Option<String>,
    pub cpp_flags: Option<String>,
    pub ld_flags: Option<String>,

    pub no_probe: Option<bool>,
    pub probe_timeout: Option<u64>,
    pub jobs: Option<u32>,
}

impl GenerateOptions {
    /// Load options from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse options file: {}", path.display()))
    }

    /// Load the project options file under `root`, if there is one.
    pub fn load_project(root: &Path) -> Result<Self> {
        let path = project_config_path(root);
        if path.exists() {
            tracing::debug!("loading options from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge another set of options into this one (other takes precedence).
    pub fn merge(&mut self, other: GenerateOptions) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            force_generate, temp_path, cc_exec, cpp_exec, as_exec, ar_exec, ld_exec,
            objcopy_exec, cc_path, cpp_path, as_path, ar_path, ld_path, objcopy_path,
            cross_compile_root, system, os, arch, abi, cc_flags, cpp_flags, ld_flags,
            no_probe, probe_timeout, jobs,
        );
    }

    /// The options as reserved context entries. Unset options are skipped.
    pub fn to_values(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = Vec::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                out.push((format!("__{}", key), v));
            }
        };
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| Value::from(p.display().to_string()));
        let text = |s: &Option<String>| s.as_ref().map(|s| Value::from(s.as_str()));

        put("force_generate", self.force_generate.map(Value::from));
        put("temp_path", path(&self.temp_path));
        put("cc_exec", text(&self.cc_exec));
        put("cpp_exec", text(&self.cpp_exec));
        put("as_exec", text(&self.as_exec));
        put("ar_exec", text(&self.ar_exec));
        put("ld_exec", text(&self.ld_exec));
        put("objcopy_exec", text(&self.objcopy_exec));
        put("cc_path", path(&self.cc_path));
        put("cpp_path", path(&self.cpp_path));
        put("as_path", path(&self.as_path));
        put("ar_path", path(&self.ar_path));
        put("ld_path", path(&self.ld_path));
        put("objcopy_path", path(&self.objcopy_path));
        put("cross_compile_root", path(&self.cross_compile_root));
        put("system", text(&self.system));
        put("os", text(&self.os));
        put("arch", text(&self.arch));
        put("abi", text(&self.abi));
        put("cc_flags", text(&self.cc_flags));
        put("cpp_flags", text(&self.cpp_flags));
        put("ld_flags", text(&self.ld_flags));
        put("probe", self.no_probe.map(|n| Value::from(!n)));
        put("probe_timeout", self.probe_timeout.map(|t| Value::from(t as i64)));
        put("jobs", self.jobs.map(|j| Value::from(j as i64)));
        out
    }
}

/// Project options file path (`.assemblage/config.toml`).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".assemblage").join("config.toml")
}

/// Layer defaults, the options file and CLI options onto a spec context.
///
/// The spec's own reserved keys beat the file and the defaults; the CLI
/// beats everything.
pub fn apply_options(ctx: &mut Context, file: &GenerateOptions, cli: &GenerateOptions) {
    for (key, value) in file.to_values() {
        if !ctx.has(&key) {
            ctx.set(&key, value);
        }
    }
    for (key, value) in defaults() {
        if !ctx.has(key) {
            ctx.set(key, value);
        }
    }
    ctx.merge_values(cli.to_values());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_project_options() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".assemblage")).unwrap();
        std::fs::write(
            project_config_path(tmp.path()),
            "cc-exec = \"clang\"\nno-probe = true\njobs = 4\n",
        )
        .unwrap();

        let opts = GenerateOptions::load_project(tmp.path()).unwrap();
        assert_eq!(opts.cc_exec.as_deref(), Some("clang"));
        assert_eq!(opts.no_probe, Some(true));
        assert_eq!(opts.jobs, Some(4));
    }

    #[test]
    fn test_missing_project_options_is_default() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            GenerateOptions::load_project(tmp.path()).unwrap(),
            GenerateOptions::default()
        );
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = GenerateOptions {
            cc_exec: Some("gcc".into()),
            jobs: Some(2),
            ..Default::default()
        };
        base.merge(GenerateOptions {
            cc_exec: Some("clang".into()),
            ..Default::default()
        });
        assert_eq!(base.cc_exec.as_deref(), Some("clang"));
        assert_eq!(base.jobs, Some(2));
    }

    #[test]
    fn test_apply_options_precedence() {
        let mut ctx = Context::new();
        ctx.set("__cc_exec", "spec-cc");
        ctx.set("__cpp_exec", "spec-cpp");

        let file = GenerateOptions {
            cc_exec: Some("file-cc".into()),
            ar_exec: Some("file-ar".into()),
            ..Default::default()
        };
        let cli = GenerateOptions {
            cpp_exec: Some("cli-cpp".into()),
            no_probe: Some(true),
            ..Default::default()
        };
        apply_options(&mut ctx, &file, &cli);

        assert_eq!(ctx.get_raw("__cc_exec"), Some(Value::from("spec-cc")));
        assert_eq!(ctx.get_raw("__cpp_exec"), Some(Value::from("cli-cpp")));
        assert_eq!(ctx.get_raw("__ar_exec"), Some(Value::from("file-ar")));
        assert_eq!(ctx.get_raw("__as_exec"), Some(Value::from("as")));
        assert_eq!(ctx.get_raw("__probe"), Some(Value::from(false)));
    }
}
