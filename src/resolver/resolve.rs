//! The dependency resolver.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::core::target::link_name;
use crate::core::{Target, TargetKind};
use crate::plugins::PluginRegistry;
use crate::util::diagnostic::{DependsOnExecutableError, UnresolvedDependencyError};
use crate::util::fs::{display_path, SearchDirs};
use crate::util::shell_words;

use super::{DependencyError, DependencyRef, ResolvedDeps};

/// Resolves dependency references against one section's targets.
#[derive(Debug)]
pub struct DependencyResolver<'a> {
    targets: &'a IndexMap<String, Target>,
    plugins: &'a PluginRegistry,
    search: &'a SearchDirs,
    temp_root: &'a Path,
    windows: bool,
    /// The link rule runs the compiler driver, so linker-only options need
    /// `-Wl,`.
    link_driver: bool,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        targets: &'a IndexMap<String, Target>,
        plugins: &'a PluginRegistry,
        search: &'a SearchDirs,
        temp_root: &'a Path,
    ) -> Self {
        DependencyResolver {
            targets,
            plugins,
            search,
            temp_root,
            windows: false,
            link_driver: true,
        }
    }

    pub fn windows(mut self, windows: bool) -> Self {
        self.windows = windows;
        self
    }

    pub fn link_driver(mut self, link_driver: bool) -> Self {
        self.link_driver = link_driver;
        self
    }

    /// Resolve every reference of `target`, in order.
    pub fn resolve(&self, target: &str, refs: &[String]) -> Result<ResolvedDeps, DependencyError> {
        let mut out = ResolvedDeps::default();
        for reference in refs {
            match DependencyRef::parse(reference) {
                Some(DependencyRef::Plugin { name, param }) => {
                    self.resolve_plugin(target, reference, name, param, &mut out)?
                }
                Some(DependencyRef::Named(name)) => self.resolve_named(target, name, &mut out)?,
                None => {
                    return Err(DependencyError::InvalidPluginRef {
                        target: target.to_string(),
                        reference: reference.clone(),
                    })
                }
            }
        }
        Ok(out)
    }

    fn resolve_plugin(
        &self,
        target: &str,
        reference: &str,
        name: &str,
        param: &str,
        out: &mut ResolvedDeps,
    ) -> Result<(), DependencyError> {
        let found = self
            .plugins
            .resolve(name, param)
            .map_err(|source| DependencyError::Plugin {
                target: target.to_string(),
                dependency: reference.to_string(),
                source,
            })?;
        tracing::debug!("{}: `{}` resolved by plugin", target, reference);

        let tokens = |text: &str, kind: &'static str| {
            shell_words::split(text).map_err(|source| DependencyError::PluginFlags {
                plugin: name.to_string(),
                kind,
                source,
            })
        };
        out.cflags.extend(tokens(&found.cflags, "cflags")?);
        out.cppflags.extend(tokens(&found.cppflags, "cppflags")?);
        out.ldflags.extend(tokens(&found.ldflags, "ldflags")?);
        out.link_inputs.extend(found.deps);
        for file in found.implicit_files {
            out.implicit(file);
        }
        Ok(())
    }

    fn resolve_named(
        &self,
        target: &str,
        name: &str,
        out: &mut ResolvedDeps,
    ) -> Result<(), DependencyError> {
        let files = self
            .search
            .glob(name)
            .map_err(|e| DependencyError::Pattern {
                pattern: name.to_string(),
                message: format!("{:#}", e),
            })?;
        if !files.is_empty() {
            if self.lookup_target(name).is_some() {
                tracing::warn!(
                    "{}: `{}` matches a file, which shadows the target of the same name",
                    target,
                    name
                );
            }
            for file in &files {
                self.add_file(file, out);
            }
            return Ok(());
        }

        let Some(dep) = self.lookup_target(name) else {
            return Err(UnresolvedDependencyError {
                target: target.to_string(),
                dependency: name.to_string(),
            }
            .into());
        };
        self.add_target(target, dep, out)
    }

    /// Find a target by bare name, `lib<name>` or `lib<name>.a`.
    fn lookup_target(&self, name: &str) -> Option<&'a Target> {
        let targets = self.targets;
        let mut name = name;
        if let Some(t) = targets.get(name) {
            return Some(t);
        }
        if let Some(stripped) = name.strip_prefix("lib") {
            name = stripped;
            if let Some(t) = targets.get(name) {
                return Some(t);
            }
        }
        name.strip_suffix(".a").and_then(|stripped| targets.get(stripped))
    }

    /// A library or object file on disk.
    fn add_file(&self, file: &Path, out: &mut ResolvedDeps) {
        let path = display_path(file);
        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        for include in [dir.join("include"), dir.join("..").join("include")] {
            if include.is_dir() {
                out.compile_flag(format!("-I{}", display_path(&normalize(&include))));
            }
        }

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "so" | "dll" | "dylib" => {
                self.library_flags(dir, link_name(&file_name), true, out);
                out.implicit(path);
            }
            "a" | "lib" => {
                self.library_flags(dir, link_name(&file_name), false, out);
                out.implicit(path);
            }
            _ => out.link_inputs.push(path),
        }
    }

    /// Another target of the section.
    fn add_target(
        &self,
        target: &str,
        dep: &Target,
        out: &mut ResolvedDeps,
    ) -> Result<(), DependencyError> {
        if dep.kind == TargetKind::Executable {
            return Err(DependsOnExecutableError {
                target: target.to_string(),
                dependency: dep.name.clone(),
            }
            .into());
        }

        for include in &dep.include_dirs {
            let dir = self
                .search
                .resolve(include)
                .map(|p| display_path(&p))
                .unwrap_or_else(|| include.clone());
            out.compile_flag(format!("-I{}", dir));
        }

        let output = dep.output_path(self.temp_root, self.windows);
        let dir = output.parent().unwrap_or(self.temp_root);
        let file_name = dep.kind.output_filename(&dep.name, self.windows);
        self.library_flags(
            dir,
            link_name(&file_name),
            dep.kind == TargetKind::DynamicLibrary,
            out,
        );
        out.implicit(display_path(&output));
        tracing::debug!("{}: depends on target `{}`", target, dep.name);
        Ok(())
    }

    fn library_flags(&self, dir: &Path, name: &str, dynamic: bool, out: &mut ResolvedDeps) {
        let dir = display_path(dir);
        let search = format!("-L{}", dir);
        if !out.ldflags.contains(&search) {
            out.ldflags.push(search);
        }
        out.ldflags.push(format!("-l{}", name));
        if dynamic && !self.windows {
            if self.link_driver {
                out.ldflags.push(format!("-Wl,-rpath,{}", dir));
            } else {
                out.ldflags.push("-rpath".to_string());
                out.ldflags.push(dir);
            }
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    crate::util::fs::normalize_path(path)
}
