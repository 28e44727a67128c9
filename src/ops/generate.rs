//! Implementation of `assemblage generate`.
//!
//! Generation loads the spec, layers the options onto its context, discovers
//! the toolchain, and walks the spec (and every spec it includes) into a
//! [`GraphSink`]. The rendered graph is written through a temporary file, so
//! a failed run leaves any previous `build.ninja` untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use crate::builder::plan::{PlannedTarget, TargetPlanner};
use crate::builder::toolchain::Toolchain;
use crate::core::{Context, SpecError, SpecFile, Value, INCLUDE_PATH_KEY};
use crate::graph::{BuildOptions, GraphSink, NinjaWriter, RuleOptions};
use crate::plugins::external::ExternalPlugin;
use crate::plugins::PluginRegistry;
use crate::util::config::{apply_options, GRAPH_FILE_NAME, SPEC_FILE_NAME};
use crate::util::fs::{display_path, normalize_path, write_atomic, SearchDirs};
use crate::util::GenerateOptions;

/// What to generate and with which options.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Spec file; `./build.toml` when unset
    pub config: Option<PathBuf>,

    /// Command-line options, highest precedence
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn spec_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| Path::new(".").join(SPEC_FILE_NAME))
    }
}

/// Result of a generate call.
#[derive(Debug, Clone)]
pub struct Generated {
    pub graph_path: PathBuf,
    /// False when an existing graph was reused
    pub regenerated: bool,
    /// Targets of every section, in emission order
    pub targets: Vec<PlannedTarget>,
}

/// A loaded spec and its fully layered root context.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub path: PathBuf,
    pub spec: SpecFile,
    pub ctx: Context,
}

impl LoadedSpec {
    /// Load the spec named by `request` and apply every option layer.
    pub fn load(request: &GenerateRequest) -> Result<Self> {
        let path = normalize_path(&request.spec_path());
        let spec = SpecFile::load(&path)?;

        let mut ctx = Context::from_toml(spec.raw.clone());
        ctx.set(INCLUDE_PATH_KEY, display_path(&path));

        let project_root = path.parent().unwrap_or_else(|| Path::new("."));
        let file_options = GenerateOptions::load_project(project_root)?;
        apply_options(&mut ctx, &file_options, &request.options);

        Ok(LoadedSpec { path, spec, ctx })
    }

    /// Directory holding the generated graph.
    pub fn temp_root(&self) -> Result<PathBuf> {
        let temp = self.ctx.get_str_or("__temp_path", "./build")?;
        Ok(normalize_path(Path::new(&temp)))
    }

    pub fn graph_path(&self) -> Result<PathBuf> {
        Ok(self.temp_root()?.join(GRAPH_FILE_NAME))
    }
}

/// Generate the graph file unless a usable one already exists.
pub fn generate(request: &GenerateRequest) -> Result<Generated> {
    let loaded = LoadedSpec::load(request)?;
    generate_loaded(loaded)
}

/// Generate from an already loaded spec.
pub fn generate_loaded(loaded: LoadedSpec) -> Result<Generated> {
    let LoadedSpec { path, spec, mut ctx } = loaded;
    let temp_root = normalize_path(Path::new(&ctx.get_str_or("__temp_path", "./build")?));
    let graph_path = temp_root.join(GRAPH_FILE_NAME);

    if graph_path.exists() && !ctx.get_bool("__force_generate")? {
        tracing::info!("reusing {}", graph_path.display());
        return Ok(Generated {
            graph_path,
            regenerated: false,
            targets: Vec::new(),
        });
    }

    let mut writer = NinjaWriter::new();
    writer.comment(&format!(
        "Generated by assemblage from {}. Do not edit.",
        display_path(&path)
    ));
    let targets = generate_graph(&spec, &mut ctx, &mut writer)
        .with_context(|| format!("failed to generate from {}", path.display()))?;

    write_atomic(&graph_path, &writer.finish())?;
    tracing::info!(
        "wrote {} ({} targets)",
        graph_path.display(),
        targets.len()
    );

    Ok(Generated {
        graph_path,
        regenerated: true,
        targets,
    })
}

/// Emit the toolchain section and the whole spec tree into `sink`.
///
/// The toolchain results are stored in `ctx` so included specs inherit them.
pub fn generate_graph(
    spec: &SpecFile,
    ctx: &mut Context,
    sink: &mut dyn GraphSink,
) -> Result<Vec<PlannedTarget>> {
    let toolchain = Toolchain::detect(ctx).context("toolchain discovery failed")?;
    toolchain.store(ctx);
    toolchain.emit_rules(ctx, sink)?;

    let mut plugins = PluginRegistry::with_builtins();
    write_section(ctx, spec, &mut plugins, sink)
}

/// Emit one spec file: variables, pools, rules, builds, targets, then
/// includes, subninjas and defaults.
fn write_section(
    ctx: &Context,
    spec: &SpecFile,
    plugins: &mut PluginRegistry,
    sink: &mut dyn GraphSink,
) -> Result<Vec<PlannedTarget>> {
    let spec_path = ctx.get_str(INCLUDE_PATH_KEY)?;
    let spec_dir = spec_path.as_deref().and_then(|p| Path::new(p).parent());
    let graph_dir = normalize_path(Path::new(&ctx.get_str_or("__temp_path", "./build")?));
    let search = SearchDirs::new(spec_dir, &graph_dir);

    for decl in &spec.plugins {
        let plugin = ExternalPlugin::load(decl, &search)?;
        plugins.register(
            &decl.name,
            Box::new(plugin),
            spec_path.as_deref().unwrap_or(SPEC_FILE_NAME),
        )?;
    }

    for name in spec.variable_names() {
        if let Some(value) = ctx.get_str(name)? {
            sink.variable(name, &value);
        }
    }

    let mut seen = HashSet::new();
    for pool in &spec.pools {
        let name = ctx.format(&pool.name)?;
        if !seen.insert(name.clone()) {
            return Err(SpecError::Duplicate { kind: "pool", name }.into());
        }
        sink.pool(&name, pool.depth);
    }

    let mut seen = HashSet::new();
    for rule in &spec.rules {
        let name = ctx.format(&rule.name)?;
        if !seen.insert(name.clone()) {
            return Err(SpecError::Duplicate { kind: "rule", name }.into());
        }
        let text = |s: &Option<String>| s.as_deref().map(|s| ctx.format(s)).transpose();
        let options = RuleOptions {
            description: text(&rule.description)?,
            depfile: text(&rule.depfile)?,
            generator: rule.generator,
            pool: text(&rule.pool)?,
            restat: rule.restat,
            rspfile: text(&rule.rspfile)?,
            rspfile_content: text(&rule.rspfile_content)?,
            deps: text(&rule.deps)?,
        };
        sink.rule(&name, &ctx.format(&rule.command)?, &options);
    }

    for build in &spec.builds {
        let list = |items: &[String]| {
            items
                .iter()
                .map(|s| ctx.format(s))
                .collect::<Result<Vec<_>, _>>()
        };
        let outputs = list(&build.outputs)?;
        let mut options = BuildOptions {
            inputs: list(&build.inputs)?,
            implicit: list(&build.implicit)?,
            order_only: list(&build.order_only)?,
            implicit_outputs: list(&build.implicit_outputs)?,
            ..Default::default()
        };
        for (key, raw) in &build.variables {
            let value = ctx.format_value(&Value::from(raw.clone()))?;
            let Some(text) = value.to_text() else {
                bail!(
                    "build variable `{}` of `{}` must be a scalar, found a {}",
                    key,
                    outputs.join(" "),
                    value.kind()
                );
            };
            options.variables.insert(key.clone(), text);
        }
        sink.build(&outputs, &ctx.format(&build.rule)?, &options);
    }

    let mut planned = TargetPlanner::new(ctx, plugins, &search)?.plan_all(&spec.targets, sink)?;

    for include in &spec.includes {
        let name = ctx.format(include)?;
        let path = resolve_include(&search, &name)
            .with_context(|| format!("include file not found: {}", name))?;
        let shown = display_path(&path);

        if shown.ends_with(".ninja") {
            sink.include(&shown);
            continue;
        }

        tracing::info!("including {}", shown);
        let included = SpecFile::load(&path)?;
        let child = ctx.child(Context::from_toml(included.raw.clone()), &shown);
        let targets = write_section(&child, &included, plugins, sink)
            .with_context(|| format!("in included spec {}", shown))?;
        planned.extend(targets);
    }

    for subninja in &spec.subninjas {
        let name = ctx.format(subninja)?;
        let file = if name.ends_with(".ninja") {
            name.clone()
        } else {
            format!("{}.ninja", name)
        };
        let path = search
            .resolve(&file)
            .filter(|p| p.is_file())
            .with_context(|| format!("subninja file not found: {}", name))?;
        sink.subninja(&display_path(&path));
    }

    let defaults = spec
        .defaults
        .iter()
        .map(|d| ctx.format(d))
        .collect::<Result<Vec<_>, _>>()?;
    if !defaults.is_empty() {
        sink.default(&defaults);
    }

    Ok(planned)
}

/// Locate an included file. Names without a `.toml` or `.ninja` extension
/// try `<name>.toml` first, then `<name>.ninja`.
fn resolve_include(search: &SearchDirs, name: &str) -> Option<PathBuf> {
    let candidates = if name.ends_with(".toml") || name.ends_with(".ninja") {
        vec![name.to_string()]
    } else {
        vec![format!("{}.toml", name), format!("{}.ninja", name)]
    };
    candidates
        .iter()
        .find_map(|c| search.resolve(c))
        .filter(|p| p.is_file())
}
