//! Target planning.
//!
//! For every declared target, in order:
//!
//! 1. apply the `conditions` whose expression holds for the platform facts
//! 2. format every field through the context
//! 3. expand `sources` globs and pick a rule chain per source
//! 4. resolve `dependencies`
//! 5. emit the stage edges, the link or archive edge and a phony alias
//!
//! Targets are planned into a scratch sink first; nothing reaches the real
//! sink unless every target of the section planned cleanly.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::rule_chain::{is_cpp_source, RuleChainError, RuleMap};
use crate::builder::toolchain::{ARCHIVE_RULE, LINK_RULE, SHARED_LINK_RULE};
use crate::core::spec::TargetDecl;
use crate::core::{
    ConditionError, Context, ContextError, PlatformFacts, SpecError, Target, TargetKind,
};
use crate::graph::ninja::escape;
use crate::graph::{BuildOptions, GraphSink, RecordingSink};
use crate::plugins::PluginRegistry;
use crate::resolver::{DependencyError, DependencyResolver, ResolvedDeps};
use crate::util::diagnostic::{suggestions, Diagnostic, NoRuleError};
use crate::util::fs::{display_path, normalize_path, temp_path, SearchDirs};
use crate::util::shell_words;

/// Errors raised while planning targets.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum PlanError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    NoRule(#[from] NoRuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("invalid source pattern `{pattern}`: {message}")]
    Sources { pattern: String, message: String },

    #[error("in target `{target}`")]
    InTarget {
        target: String,
        #[source]
        source: Box<PlanError>,
    },

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    RuleChain(#[from] RuleChainError),

    #[error("{} target(s) failed to plan", .0.len())]
    Multiple(Vec<PlanError>),
}

impl PlanError {
    fn in_target(target: &str, err: impl Into<PlanError>) -> PlanError {
        PlanError::InTarget {
            target: target.to_string(),
            source: Box::new(err.into()),
        }
    }

    /// One diagnostic per underlying failure.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            PlanError::Multiple(errors) => errors.iter().flat_map(|e| e.diagnostics()).collect(),
            PlanError::InTarget { target, source } => source
                .diagnostics()
                .into_iter()
                .map(|d| d.with_context(format!("in target `{}`", target)))
                .collect(),
            PlanError::Dependency(e) => vec![e.to_diagnostic()],
            PlanError::NoRule(e) => vec![Diagnostic::error(e.to_string())
                .with_context(format!("in target `{}`", e.target))
                .with_suggestion(suggestions::NO_RULE)],
            other => {
                let mut diag = Diagnostic::error(other.to_string());
                let mut cause = std::error::Error::source(other);
                while let Some(e) = cause {
                    diag = diag.with_context(e.to_string());
                    cause = e.source();
                }
                vec![diag]
            }
        }
    }
}

/// The result of planning one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTarget {
    pub name: String,
    pub kind: TargetKind,
    /// The link or archive output
    pub output: String,
    /// Terminal object of every source
    pub objects: Vec<String>,
}

/// Plans the targets of one spec section.
#[derive(Debug)]
pub struct TargetPlanner<'a> {
    ctx: &'a Context,
    plugins: &'a PluginRegistry,
    search: &'a SearchDirs,
    facts: PlatformFacts,
    temp_root: PathBuf,
    assemble_stage: bool,
    link_driver: bool,
}

impl<'a> TargetPlanner<'a> {
    pub fn new(
        ctx: &'a Context,
        plugins: &'a PluginRegistry,
        search: &'a SearchDirs,
    ) -> Result<Self, PlanError> {
        let temp_root = normalize_path(Path::new(&ctx.get_str_or("__temp_path", "./build")?));
        let link_driver = ctx
            .get("__ld_driver")?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Ok(TargetPlanner {
            ctx,
            plugins,
            search,
            facts: PlatformFacts::from_context(ctx)?,
            temp_root,
            assemble_stage: ctx.get_bool("__assemble_stage")?,
            link_driver,
        })
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    fn windows(&self) -> bool {
        self.facts.is_windows()
    }

    /// Apply conditions and format every field of a declaration.
    pub fn prepare(&self, decl: &TargetDecl) -> Result<Target, PlanError> {
        self.prepare_inner(decl)
            .map_err(|e| PlanError::in_target(&decl.name, e))
    }

    fn prepare_inner(&self, decl: &TargetDecl) -> Result<Target, PlanError> {
        let mut decl = decl.clone();
        for cond in std::mem::take(&mut decl.conditions) {
            let expr = self.ctx.format(&cond.condition)?;
            if self.facts.eval(&expr)? {
                tracing::debug!("{}: condition `{}` holds", decl.name, expr);
                decl.apply(&cond);
            }
        }

        let ctx = self.ctx;
        let list = |items: &[String]| -> Result<Vec<String>, ContextError> {
            items.iter().map(|s| ctx.format(s)).collect()
        };

        let name = ctx.format(&decl.name)?;
        let kind_text = ctx.format(&decl.kind)?;
        let kind = kind_text
            .parse::<TargetKind>()
            .map_err(|_| SpecError::UnknownTargetType {
                target: name.clone(),
                kind: kind_text.clone(),
            })?;

        let rule_map = decl
            .rule_map
            .iter()
            .map(|(pattern, chain)| Ok((pattern.clone(), ctx.format(chain)?)))
            .collect::<Result<IndexMap<_, _>, ContextError>>()?;

        Ok(Target {
            name,
            kind,
            sources: list(&decl.sources)?,
            dependencies: list(&decl.dependencies)?,
            include_dirs: list(&decl.include_dirs)?,
            defines: list(&decl.defines)?,
            cflags: ctx.format(&decl.cflags)?,
            cppflags: ctx.format(&decl.cppflags)?,
            asflags: ctx.format(&decl.asflags)?,
            ldflags: ctx.format(&decl.ldflags)?,
            rule_map,
        })
    }

    /// Prepare every declaration and key them by name. Duplicate names are
    /// an error.
    pub fn target_map(&self, decls: &[TargetDecl]) -> Result<IndexMap<String, Target>, PlanError> {
        let mut targets = IndexMap::new();
        let mut errors = Vec::new();
        for decl in decls {
            match self.prepare(decl) {
                Ok(target) if targets.contains_key(&target.name) => {
                    errors.push(PlanError::Spec(SpecError::Duplicate {
                        kind: "target",
                        name: target.name,
                    }));
                }
                Ok(target) => {
                    targets.insert(target.name.clone(), target);
                }
                Err(e) => errors.push(e),
            }
        }
        collect(errors)?;
        Ok(targets)
    }

    /// Plan every target of a section into `sink`.
    ///
    /// Failures of independent targets are collected and reported together;
    /// on any failure nothing is written to `sink`.
    pub fn plan_all(
        &self,
        decls: &[TargetDecl],
        sink: &mut dyn GraphSink,
    ) -> Result<Vec<PlannedTarget>, PlanError> {
        let targets = self.target_map(decls)?;

        let mut scratch = RecordingSink::new();
        let mut planned = Vec::with_capacity(targets.len());
        let mut errors = Vec::new();
        for target in targets.values() {
            let mut edges = RecordingSink::new();
            match self.plan_target(target, &targets, &mut edges) {
                Ok(p) => {
                    edges.replay(&mut scratch);
                    planned.push(p);
                }
                Err(e) => errors.push(e),
            }
        }
        collect(errors)?;

        scratch.replay(sink);
        Ok(planned)
    }

    /// Plan a single target. `targets` is the section's name map.
    pub fn plan_target(
        &self,
        target: &Target,
        targets: &IndexMap<String, Target>,
        sink: &mut dyn GraphSink,
    ) -> Result<PlannedTarget, PlanError> {
        let windows = self.windows();
        let rule_map = RuleMap::with_custom(&target.rule_map, self.assemble_stage)
            .map_err(|e| PlanError::in_target(&target.name, e))?;

        // Resolve sources and chains before emitting anything.
        let mut sources = Vec::new();
        for pattern in &target.sources {
            for source in self.expand_sources(pattern)? {
                let Some(chain) = rule_map.select(&source) else {
                    return Err(NoRuleError {
                        target: target.name.clone(),
                        source_path: source,
                    }
                    .into());
                };
                sources.push((source, chain.clone()));
            }
        }

        let deps = DependencyResolver::new(targets, self.plugins, self.search, &self.temp_root)
            .windows(windows)
            .link_driver(self.link_driver)
            .resolve(&target.name, &target.dependencies)?;
        let flags = self.compile_flags(target, &deps);

        let mut objects = Vec::with_capacity(sources.len());
        for (source, chain) in &sources {
            let flags_text = if is_cpp_source(source) {
                &flags.cpp
            } else {
                &flags.c
            };
            let mut input = source.clone();
            let mut output = display_path(&temp_path(&self.temp_root, Path::new(source)));
            for stage in chain.stages() {
                output.push_str(&stage.suffix);
                let stage_flags = if stage.rule.starts_with("__as") {
                    &target.asflags
                } else {
                    flags_text
                };
                tracing::debug!("{}: {} -> {} ({})", target.name, input, output, stage.rule);
                sink.build(
                    &[output.clone()],
                    &stage.rule,
                    &BuildOptions::default()
                        .inputs([input.as_str()])
                        .variable(format!("{}_flags", stage.rule), escape(stage_flags)),
                );
                input = output.clone();
            }
            objects.push(output);
        }

        let output = display_path(&target.output_path(&self.temp_root, windows));
        let inputs = objects.iter().chain(deps.link_inputs.iter()).cloned();
        let options = BuildOptions::default()
            .inputs(inputs)
            .implicit(deps.implicit.iter().cloned());

        match target.kind {
            TargetKind::StaticLibrary => {
                sink.build(&[output.clone()], ARCHIVE_RULE, &options);
            }
            TargetKind::Executable | TargetKind::DynamicLibrary => {
                let rule = match target.kind {
                    TargetKind::DynamicLibrary => SHARED_LINK_RULE,
                    _ => LINK_RULE,
                };
                let ldflags = join_flags([target.ldflags.as_str(), deps.ldflags_text().as_str()]);
                sink.build(
                    &[output.clone()],
                    rule,
                    &options.variable(format!("{}_flags", rule), escape(&ldflags)),
                );
            }
        }

        sink.build(
            &[target.name.clone()],
            "phony",
            &BuildOptions::default().inputs([output.as_str()]),
        );

        tracing::info!(
            "planned {} `{}` ({} sources) -> {}",
            target.kind,
            target.name,
            objects.len(),
            output
        );

        Ok(PlannedTarget {
            name: target.name.clone(),
            kind: target.kind,
            output,
            objects,
        })
    }

    /// Expand one `sources` entry into display paths.
    fn expand_sources(&self, pattern: &str) -> Result<Vec<String>, PlanError> {
        let found = self
            .search
            .glob(pattern)
            .map_err(|e| PlanError::Sources {
                pattern: pattern.to_string(),
                message: format!("{:#}", e),
            })?;
        if !found.is_empty() {
            return Ok(found.iter().map(|p| display_path(p)).collect());
        }
        if pattern.contains(['*', '?', '[']) {
            tracing::warn!("source pattern `{}` matched no files", pattern);
            return Ok(Vec::new());
        }
        // A plain path that does not exist yet, e.g. a generated file.
        Ok(vec![pattern.to_string()])
    }

    fn compile_flags(&self, target: &Target, deps: &ResolvedDeps) -> CompileFlags {
        let mut extra = Vec::new();
        if target.kind == TargetKind::DynamicLibrary && !self.windows() {
            extra.push("-fPIC".to_string());
        }
        for dir in &target.include_dirs {
            let dir = self
                .search
                .resolve(dir)
                .map(|p| display_path(&p))
                .unwrap_or_else(|| dir.clone());
            extra.push(format!("-I{}", dir));
        }
        for define in &target.defines {
            extra.push(format!("-D{}", define));
        }
        let extra = shell_words::join(&extra);

        CompileFlags {
            c: join_flags([target.cflags.as_str(), extra.as_str(), deps.cflags_text().as_str()]),
            cpp: join_flags([
                target.cppflags.as_str(),
                extra.as_str(),
                deps.cppflags_text().as_str(),
            ]),
        }
    }
}

struct CompileFlags {
    c: String,
    cpp: String,
}

fn join_flags<'s>(parts: impl IntoIterator<Item = &'s str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect(mut errors: Vec<PlanError>) -> Result<(), PlanError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(PlanError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::SpecFile;
    use crate::test_support::ProjectFixture;

    fn context(fixture: &ProjectFixture) -> Context {
        let mut ctx = Context::new();
        ctx.set(
            "__temp_path",
            fixture.root().join("build").display().to_string(),
        );
        ctx.set("__os", "linux");
        ctx
    }

    fn decls(fixture: &ProjectFixture) -> Vec<TargetDecl> {
        SpecFile::load(&fixture.root().join("build.toml"))
            .unwrap()
            .targets
    }

    fn plan(fixture: &ProjectFixture, ctx: &Context) -> Result<RecordingSink, PlanError> {
        let plugins = PluginRegistry::with_builtins();
        let search = SearchDirs::new(Some(fixture.root()), fixture.root());
        let planner = TargetPlanner::new(ctx, &plugins, &search).unwrap();
        let mut sink = RecordingSink::new();
        planner.plan_all(&decls(fixture), &mut sink)?;
        Ok(sink)
    }

    fn rule_of<'s>(sink: &'s RecordingSink, suffix: &str) -> (&'s str, &'s BuildOptions) {
        sink.builds()
            .find(|(outs, _, _)| outs[0].ends_with(suffix))
            .map(|(_, rule, opts)| (rule, opts))
            .unwrap_or_else(|| panic!("no edge producing *{}", suffix))
    }

    #[test]
    fn test_util_app_graph() {
        let fixture = ProjectFixture::util_app();
        let ctx = context(&fixture);
        let sink = plan(&fixture, &ctx).unwrap();

        let edges: Vec<_> = sink.builds().collect();
        assert_eq!(edges.len(), 6);

        let (rule, opts) = rule_of(&sink, "util.c.o");
        assert_eq!(rule, "__cc");
        assert!(opts.inputs[0].ends_with("util.c"));

        let (rule, opts) = rule_of(&sink, "lib/libutil.a");
        assert_eq!(rule, "__ar");
        assert!(opts.inputs[0].ends_with("util.c.o"));

        let (rule, _) = rule_of(&sink, "main.c.o");
        assert_eq!(rule, "__cc");

        let (rule, opts) = rule_of(&sink, "bin/app");
        assert_eq!(rule, "__ld");
        assert!(opts.implicit.iter().any(|p| p.ends_with("lib/libutil.a")));
        assert!(opts.variables["__ld_flags"].contains("-lutil"));
        assert_eq!(opts.inputs.len(), 1);

        let (rule, opts) = sink.build_for("util").unwrap();
        assert_eq!(rule, "phony");
        assert!(opts.inputs[0].ends_with("lib/libutil.a"));
        assert_eq!(sink.build_for("app").unwrap().0, "phony");
    }

    #[test]
    fn test_missing_rule_emits_nothing() {
        let fixture = ProjectFixture::new();
        fixture.spec(
            r#"
[[target]]
name = "ok"
type = "static_library"
sources = ["ok.c"]

[[target]]
name = "bad"
type = "executable"
sources = ["x.rs"]
"#,
        );
        fixture.file("ok.c", "");
        fixture.file("x.rs", "");
        let ctx = context(&fixture);

        let err = plan(&fixture, &ctx).unwrap_err();
        assert!(matches!(err, PlanError::NoRule(_)));
        assert!(err.to_string().contains("x.rs"));
    }

    #[test]
    fn test_errors_are_accumulated() {
        let fixture = ProjectFixture::new();
        fixture.spec(
            r#"
[[target]]
name = "a"
type = "executable"
sources = ["a.rs"]

[[target]]
name = "b"
type = "plugin"

[[target]]
name = "c"
type = "executable"
dependencies = ["nowhere"]
"#,
        );
        fixture.file("a.rs", "");
        let ctx = context(&fixture);

        let err = plan(&fixture, &ctx).unwrap_err();
        // The bad type fails while building the map, before planning.
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].format(false).contains("unknown target type"));

        fixture.spec(
            r#"
[[target]]
name = "a"
type = "executable"
sources = ["a.rs"]

[[target]]
name = "c"
type = "executable"
dependencies = ["nowhere"]
"#,
        );
        let err = plan(&fixture, &ctx).unwrap_err();
        match err {
            PlanError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected two errors, got {}", other),
        }
    }

    #[test]
    fn test_duplicate_target_names() {
        let fixture = ProjectFixture::new();
        fixture.spec(
            r#"
[[target]]
name = "same"
type = "executable"

[[target]]
name = "{dup}"
type = "static_library"
"#,
        );
        let mut ctx = context(&fixture);
        ctx.set("dup", "same");

        let err = plan(&fixture, &ctx).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Spec(SpecError::Duplicate { kind: "target", .. })
        ));
    }

    #[test]
    fn test_conditions_and_flags() {
        let fixture = ProjectFixture::new();
        fixture.spec(
            r#"
[[target]]
name = "core"
type = "dynamic_library"
sources = ["src/*.cpp"]
include_dirs = ["include"]
defines = ["CORE=1"]
cppflags = "-O2"

[[target.conditions]]
condition = "os == 'linux'"
defines = ["CORE=1", "ON_LINUX"]

[[target.conditions]]
condition = "os == 'windows'"
defines = ["ON_WINDOWS"]
"#,
        );
        fixture.file("src/a.cpp", "");
        fixture.file("src/b.cpp", "");
        fixture.file("include/core.h", "");
        let ctx = context(&fixture);
        let sink = plan(&fixture, &ctx).unwrap();

        let (rule, opts) = rule_of(&sink, "a.cpp.o");
        assert_eq!(rule, "__cpp");
        let flags = &opts.variables["__cpp_flags"];
        assert!(flags.starts_with("-O2 -fPIC -I"));
        assert!(flags.contains("-DON_LINUX"));
        assert!(!flags.contains("ON_WINDOWS"));

        let (rule, opts) = rule_of(&sink, "lib/libcore.so");
        assert_eq!(rule, "__ld_shared");
        assert_eq!(opts.inputs.len(), 2);
        assert!(opts.variables.contains_key("__ld_shared_flags"));
        assert!(!opts.variables.contains_key("__ld_flags"));
    }

    #[test]
    fn test_flag_variables_escape_dollar() {
        let fixture = ProjectFixture::new();
        fixture.spec(
            r#"
[[target]]
name = "app"
type = "executable"
sources = ["main.c"]
cflags = "-DPRICE=$5"
ldflags = "-Wl,-rpath,$ORIGIN/../lib"
"#,
        );
        fixture.file("main.c", "");
        let ctx = context(&fixture);
        let sink = plan(&fixture, &ctx).unwrap();

        let (_, opts) = rule_of(&sink, "main.c.o");
        assert_eq!(opts.variables["__cc_flags"], "-DPRICE=$$5");
        let (_, opts) = rule_of(&sink, "bin/app");
        assert_eq!(opts.variables["__ld_flags"], "-Wl,-rpath,$$ORIGIN/../lib");

        let mut writer = crate::graph::NinjaWriter::new();
        sink.replay(&mut writer);
        assert!(writer
            .finish()
            .contains("  __ld_flags = -Wl,-rpath,$$ORIGIN/../lib\n"));
    }

    #[test]
    fn test_assemble_stage_chain() {
        let fixture = ProjectFixture::util_app();
        let mut ctx = context(&fixture);
        ctx.set("__assemble_stage", true);
        let sink = plan(&fixture, &ctx).unwrap();

        let (rule, opts) = rule_of(&sink, "util.c.s");
        assert_eq!(rule, "__cc_s");
        assert!(opts.variables.contains_key("__cc_s_flags"));

        let (rule, opts) = rule_of(&sink, "util.c.s.o");
        assert_eq!(rule, "__as_c");
        assert!(opts.inputs[0].ends_with("util.c.s"));

        let (_, opts) = rule_of(&sink, "lib/libutil.a");
        assert!(opts.inputs[0].ends_with("util.c.s.o"));
    }

    #[test]
    fn test_windows_output_names() {
        let fixture = ProjectFixture::util_app();
        let mut ctx = context(&fixture);
        ctx.set("__os", "windows");
        let sink = plan(&fixture, &ctx).unwrap();

        assert!(sink.builds().any(|(outs, _, _)| outs[0].ends_with("bin/app.exe")));
        let (_, opts) = rule_of(&sink, "bin/app.exe");
        assert!(!opts.variables["__ld_flags"].contains("rpath"));
    }
}
