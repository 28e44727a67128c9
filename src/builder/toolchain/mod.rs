//! Toolchain discovery and the rules it contributes to the graph.
//!
//! Each compile role resolves to a [`Tool`]: an executable plus the magic
//! flags it needs, split around the input file. Flags come from probing the
//! driver's dry-run output, or from `__<role>_magic_flags` when given.
//!
//! Executable lookup priority:
//! 1. Explicit `__<role>_path`
//! 2. `__<role>_exec` searched below `__cross_compile_root`
//! 3. `__<role>_exec` searched on `PATH`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::{Context, ContextError};
use crate::graph::{GraphSink, RuleOptions};
use crate::util::config::DEFAULT_PROBE_TIMEOUT;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::process::ProcessError;
use crate::util::shell_words::{self, ShellWordsError};

mod detect;
pub mod probe;

pub use detect::{find_optional_tool, find_tool, ExecSearch};
pub use probe::{detect_magic_flags, Discovered, ProbeRequest};

/// Name of the pool that serializes link steps.
pub const LINK_POOL: &str = "__link_pool";

/// Link rule for executables.
pub const LINK_RULE: &str = "__ld";

/// Link rule for dynamic libraries.
pub const SHARED_LINK_RULE: &str = "__ld_shared";

/// Archive rule for static libraries.
pub const ARCHIVE_RULE: &str = "__ar";

/// Toolchain discovery errors.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("can not find executable `{name}` for {role}")]
    NotFound { role: String, name: String },

    #[error("executable file not exists or can not execute: {} ({role})", path.display())]
    NotExecutable { role: String, path: PathBuf },

    #[error("failed to prepare probe scratch files: {0}")]
    Scratch(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("probe of {} exited with status {code:?}\n{output}", driver.display())]
    Failed {
        driver: PathBuf,
        code: Option<i32>,
        output: String,
    },

    #[error("probe of {} printed no usable command line\n{output}", driver.display())]
    NoCandidate { driver: PathBuf, output: String },

    #[error("invalid magic flags for {role}")]
    Flags {
        role: String,
        #[source]
        source: ShellWordsError,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ProbeError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ProbeError::NotFound { .. } | ProbeError::NotExecutable { .. } => {
                diag.with_suggestion(suggestions::MISSING_TOOL)
            }
            ProbeError::Failed { .. } | ProbeError::NoCandidate { .. } => {
                diag.with_suggestion(suggestions::PROBE_FAILED)
            }
            _ => diag,
        }
    }
}

/// An executable with the flags it always needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub exec: PathBuf,
    /// Flags placed before the input file
    pub before_input: Vec<String>,
    /// Flags placed after the input file
    pub after_input: Vec<String>,
    /// Whether `exec` is the compiler driver itself (and so understands
    /// `-MMD`)
    pub is_driver: bool,
    /// Whether the flags were discovered by probing
    pub probed: bool,
}

impl Tool {
    /// Build a tool from an argument list that may contain `$in`.
    pub fn from_args(exec: PathBuf, args: Vec<String>, is_driver: bool, probed: bool) -> Self {
        let (before_input, after_input) = match args.iter().position(|a| a == probe::IN) {
            Some(pos) => (args[..pos].to_vec(), args[pos + 1..].to_vec()),
            None => (args, Vec::new()),
        };
        Tool {
            exec,
            before_input,
            after_input,
            is_driver,
            probed,
        }
    }

    /// A driver run in `mode_flags` with explicit extra flags.
    pub fn unprobed(driver: &Path, mode_flags: &[&str], magic: &[String]) -> Self {
        let args = mode_flags
            .iter()
            .map(|s| s.to_string())
            .chain(magic.iter().cloned())
            .collect();
        Tool::from_args(driver.to_path_buf(), args, true, false)
    }

    /// Magic flags as text, with `$in` marking the input position.
    pub fn magic_flags(&self) -> String {
        let mut parts = self.before_input.clone();
        parts.push(probe::IN.to_string());
        parts.extend(self.after_input.iter().cloned());
        render(&parts)
    }

    /// Rule command for this tool.
    ///
    /// `extra` is baked in as-is; `flags_var` names the edge variable that
    /// carries per-target flags. Link commands take their flags after the
    /// input so libraries follow the objects that need them.
    pub fn command(&self, extra: &str, flags_var: &str, depfile: bool, flags_after_input: bool) -> String {
        let mut parts = vec![render_token(&self.exec.display().to_string())];
        parts.push(render(&self.before_input));

        let flags = format!("{} ${}", extra, flags_var);
        if !flags_after_input {
            parts.push(flags.clone());
        }
        if depfile && self.is_driver {
            parts.push("-MMD -MT $out -MF $out.d".to_string());
        }
        parts.push(probe::IN.to_string());
        if flags_after_input {
            parts.push(flags);
        }
        parts.push(render(&self.after_input));
        parts.push(format!("-o {}", probe::OUT));

        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn render_token(token: &str) -> String {
    if token == probe::IN || token == probe::OUT {
        token.to_string()
    } else {
        crate::graph::ninja::escape(&shell_words::quote(token))
    }
}

fn render(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| render_token(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Source language of a compile role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    C,
    Cpp,
}

impl Lang {
    fn role(&self) -> &'static str {
        match self {
            Lang::C => "cc",
            Lang::Cpp => "cpp",
        }
    }

    fn probe_ext(&self) -> &'static str {
        match self {
            Lang::C => "c",
            Lang::Cpp => "cpp",
        }
    }

    fn probe_source(&self) -> &'static str {
        match self {
            Lang::C => "int main(void) { return 0; }\n",
            Lang::Cpp => "int main() { return 0; }\n",
        }
    }
}

/// Compile, compile-to-assembly and assemble tools for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LangTools {
    pub compile: Tool,
    pub compile_asm: Tool,
    pub assemble: Tool,
    /// The driver hands assembly to a separate assembler
    pub assemble_stage: bool,
}

/// The resolved toolchain for one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toolchain {
    pub c: LangTools,
    pub cpp: LangTools,
    pub ld: Tool,
    /// The link tool run in `-shared` mode
    pub ld_shared: Tool,
    pub ar: PathBuf,
    pub objcopy: Option<PathBuf>,
    /// Sources compile through assembly and a separate assemble step
    pub assemble_stage: bool,
}

impl Toolchain {
    /// Resolve executables and discover magic flags.
    pub fn detect(ctx: &Context) -> Result<Toolchain, ProbeError> {
        let search = ExecSearch::from_context(ctx)?;
        let probing = ctx
            .get("__probe")?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let timeout = Duration::from_secs(
            ctx.get("__probe_timeout")?
                .and_then(|v| v.as_int())
                .and_then(|t| u64::try_from(t).ok())
                .unwrap_or(DEFAULT_PROBE_TIMEOUT),
        );
        let scratch = PathBuf::from(ctx.get_str_or("__temp_path", "./build")?).join(".probe");
        let as_name = ctx.get_str_or("__as_exec", "as")?;

        let prober = Prober {
            ctx,
            search: &search,
            probing,
            timeout,
            scratch: &scratch,
            as_name: exec_stem(Path::new(&as_name)),
        };

        let cc_driver = find_tool(ctx, &search, "cc")?;
        let cpp_driver = find_tool(ctx, &search, "cpp")?;
        let c = prober.language(Lang::C, &cc_driver)?;
        let cpp = prober.language(Lang::Cpp, &cpp_driver)?;
        let ld = prober.linker(&cpp_driver, LinkMode::Executable)?;
        let ld_shared = prober.linker(&cpp_driver, LinkMode::Shared)?;
        let ar = find_tool(ctx, &search, "ar")?;
        let objcopy = find_optional_tool(ctx, &search, "objcopy")?;

        let assemble_stage = ctx.get_bool("__assemble_stage")? || c.assemble_stage || cpp.assemble_stage;
        if assemble_stage {
            tracing::info!("toolchain requires an explicit assemble stage");
        }

        Ok(Toolchain {
            c,
            cpp,
            ld,
            ld_shared,
            ar,
            objcopy,
            assemble_stage,
        })
    }

    /// Cache the results under reserved keys.
    pub fn store(&self, ctx: &mut Context) {
        let roles = [
            ("cc", &self.c.compile),
            ("cc_s", &self.c.compile_asm),
            ("as_c", &self.c.assemble),
            ("cpp", &self.cpp.compile),
            ("cpp_s", &self.cpp.compile_asm),
            ("as_cpp", &self.cpp.assemble),
            ("ld", &self.ld),
            ("ld_shared", &self.ld_shared),
        ];
        for (role, tool) in roles {
            ctx.set(
                &format!("__{}_probed_exec", role),
                tool.exec.display().to_string(),
            );
            ctx.set(&format!("__{}_probed_flags", role), tool.magic_flags());
        }
        ctx.set("__assemble_stage", self.assemble_stage);
        ctx.set("__ld_driver", self.ld.is_driver);
    }

    /// Emit the link pool and the toolchain rules.
    pub fn emit_rules(&self, ctx: &Context, sink: &mut dyn GraphSink) -> Result<(), ContextError> {
        let cc_flags = ctx.get_str_or("__cc_flags", "")?;
        let cpp_flags = ctx.get_str_or("__cpp_flags", "")?;
        let ld_flags = ctx.get_str_or("__ld_flags", "")?;

        sink.pool(LINK_POOL, 1);

        let compile = |tool: &Tool, desc: &str| RuleOptions {
            description: Some(desc.to_string()),
            depfile: tool.is_driver.then(|| "$out.d".to_string()),
            deps: tool.is_driver.then(|| "gcc".to_string()),
            ..Default::default()
        };
        let plain = |desc: &str| RuleOptions {
            description: Some(desc.to_string()),
            ..Default::default()
        };

        let c = &self.c;
        let cpp = &self.cpp;
        sink.rule(
            "__cc",
            &c.compile.command(&cc_flags, "__cc_flags", true, false),
            &compile(&c.compile, "compile(c) $out"),
        );
        sink.rule(
            "__cpp",
            &cpp.compile.command(&cpp_flags, "__cpp_flags", true, false),
            &compile(&cpp.compile, "compile(cpp) $out"),
        );
        sink.rule(
            "__cc_s",
            &c.compile_asm.command(&cc_flags, "__cc_s_flags", false, false),
            &plain("compile(c) $out"),
        );
        sink.rule(
            "__cpp_s",
            &cpp.compile_asm.command(&cpp_flags, "__cpp_s_flags", false, false),
            &plain("compile(cpp) $out"),
        );
        sink.rule(
            "__as_c",
            &c.assemble.command("", "__as_c_flags", false, false),
            &plain("assemble $out"),
        );
        sink.rule(
            "__as_cpp",
            &cpp.assemble.command("", "__as_cpp_flags", false, false),
            &plain("assemble $out"),
        );
        sink.rule(
            ARCHIVE_RULE,
            &format!("{} rcs $out $in", render_token(&self.ar.display().to_string())),
            &plain("archive $out"),
        );
        let link = |desc: &str| RuleOptions {
            description: Some(desc.to_string()),
            pool: Some(LINK_POOL.to_string()),
            ..Default::default()
        };
        sink.rule(
            LINK_RULE,
            &self.ld.command(&ld_flags, "__ld_flags", false, true),
            &link("link $out"),
        );
        sink.rule(
            SHARED_LINK_RULE,
            &self.ld_shared.command(&ld_flags, "__ld_shared_flags", false, true),
            &link("link(shared) $out"),
        );
        if let Some(ref objcopy) = self.objcopy {
            sink.rule(
                "__objcopy",
                &format!(
                    "{} $__objcopy_flags $in $out",
                    render_token(&objcopy.display().to_string())
                ),
                &plain("objcopy $out"),
            );
        }
        Ok(())
    }
}

/// What a link step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkMode {
    Executable,
    Shared,
}

impl LinkMode {
    fn mode_flags(self) -> &'static [&'static str] {
        match self {
            LinkMode::Executable => &[],
            LinkMode::Shared => &["-shared"],
        }
    }

    fn role(self) -> &'static str {
        match self {
            LinkMode::Executable => "ld",
            LinkMode::Shared => "ld_shared",
        }
    }
}

struct Prober<'a> {
    ctx: &'a Context,
    search: &'a ExecSearch,
    probing: bool,
    timeout: Duration,
    scratch: &'a Path,
    as_name: String,
}

impl Prober<'_> {
    fn magic(&self, role: &str) -> Result<Option<Vec<String>>, ProbeError> {
        match self.ctx.get_str(&format!("__{}_magic_flags", role))? {
            Some(text) => shell_words::split(&text)
                .map(Some)
                .map_err(|source| ProbeError::Flags {
                    role: role.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn discover(
        &self,
        driver: &Path,
        lang: Lang,
        mode: &[&str],
        out_ext: &str,
    ) -> Result<Discovered, ProbeError> {
        let req = ProbeRequest {
            driver,
            in_ext: lang.probe_ext(),
            out_ext,
            mode_flags: mode,
            source: lang.probe_source(),
        };
        detect_magic_flags(&req, self.scratch, self.search, self.timeout)
    }

    fn language(&self, lang: Lang, driver: &Path) -> Result<LangTools, ProbeError> {
        let role = lang.role();
        let magic = self.magic(role)?;

        if !self.probing || magic.is_some() {
            let magic = magic.unwrap_or_default();
            tracing::debug!("{}: using {} without probing", role, driver.display());
            return Ok(LangTools {
                compile: Tool::unprobed(driver, &["-c"], &magic),
                compile_asm: Tool::unprobed(driver, &["-S"], &magic),
                assemble: Tool::unprobed(driver, &["-c"], &[]),
                assemble_stage: false,
            });
        }

        tracing::info!("probing {} ({})", role, driver.display());
        let found = self.discover(driver, lang, &["-c"], "o")?;

        if exec_stem(&found.exec) == self.as_name {
            tracing::debug!("{}: driver delegates to assembler {}", role, found.exec.display());
            let assemble = Tool::from_args(found.exec, found.args, false, true);
            let asm = self.discover(driver, lang, &["-S"], "s")?;
            let is_driver = same_file(&asm.exec, driver);
            return Ok(LangTools {
                compile: Tool::unprobed(driver, &["-c"], &[]),
                compile_asm: Tool::from_args(asm.exec, asm.args, is_driver, true),
                assemble,
                assemble_stage: true,
            });
        }

        let is_driver = same_file(&found.exec, driver);
        Ok(LangTools {
            compile: Tool::from_args(found.exec, found.args, is_driver, true),
            compile_asm: Tool::unprobed(driver, &["-S"], &[]),
            assemble: Tool::unprobed(driver, &["-c"], &[]),
            assemble_stage: false,
        })
    }

    /// The link tool: an explicit `ld` override, else the C++ driver.
    ///
    /// Executables and dynamic libraries are probed separately since the
    /// driver picks different start files for each.
    fn linker(&self, cpp_driver: &Path, mode: LinkMode) -> Result<Tool, ProbeError> {
        let magic = self.magic("ld")?;
        let mode_flags = mode.mode_flags();

        if let Some(ld) = find_optional_tool(self.ctx, self.search, "ld")? {
            let args = mode_flags
                .iter()
                .map(|s| s.to_string())
                .chain(magic.unwrap_or_default())
                .collect();
            return Ok(Tool::from_args(ld, args, false, false));
        }
        if !self.probing || magic.is_some() {
            return Ok(Tool::unprobed(cpp_driver, mode_flags, &magic.unwrap_or_default()));
        }

        tracing::info!("probing {} ({})", mode.role(), cpp_driver.display());
        let out_ext = match mode {
            LinkMode::Executable => "out",
            LinkMode::Shared => "so",
        };
        let req = ProbeRequest {
            driver: cpp_driver,
            in_ext: "o",
            out_ext,
            mode_flags,
            source: "",
        };
        let found = detect_magic_flags(&req, self.scratch, self.search, self.timeout)?;
        let is_driver = same_file(&found.exec, cpp_driver);
        Ok(Tool::from_args(found.exec, found.args, is_driver, true))
    }
}

/// File name without directory or `.exe`.
fn exec_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".exe").unwrap_or(&name).to_string()
}

fn same_file(a: &Path, b: &Path) -> bool {
    crate::util::fs::normalize_path(a) == crate::util::fs::normalize_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphRecord, RecordingSink};

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_tool_splits_at_input() {
        let tool = Tool::from_args(
            PathBuf::from("/usr/lib/collect2"),
            words("-m elf crt1.o $in -lc crtn.o"),
            false,
            true,
        );
        assert_eq!(tool.before_input, words("-m elf crt1.o"));
        assert_eq!(tool.after_input, words("-lc crtn.o"));
        assert_eq!(tool.magic_flags(), "-m elf crt1.o $in -lc crtn.o");
    }

    #[test]
    fn test_compile_command_with_depfile() {
        let tool = Tool::unprobed(Path::new("/usr/bin/cc"), &["-c"], &[]);
        assert_eq!(
            tool.command("-pipe", "__cc_flags", true, false),
            "/usr/bin/cc -c -pipe $__cc_flags -MMD -MT $out -MF $out.d $in -o $out"
        );
    }

    #[test]
    fn test_link_command_flags_follow_input() {
        let tool = Tool::from_args(
            PathBuf::from("/usr/lib/collect2"),
            words("crt1.o $in crtn.o"),
            false,
            true,
        );
        assert_eq!(
            tool.command("", "__ld_flags", true, true),
            "/usr/lib/collect2 crt1.o $in $__ld_flags crtn.o -o $out"
        );
    }

    #[test]
    fn test_command_quotes_paths() {
        let tool = Tool::unprobed(Path::new("/opt/my cc/bin/cc"), &["-c"], &[]);
        assert!(tool
            .command("", "__cc_flags", false, false)
            .starts_with("'/opt/my cc/bin/cc' -c"));
    }

    #[test]
    fn test_exec_stem() {
        assert_eq!(exec_stem(Path::new("/usr/bin/as")), "as");
        assert_eq!(exec_stem(Path::new("C:/mingw/bin/as.exe")), "as");
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_without_probing() {
        use crate::test_support::{fake_toolchain_context, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let mut ctx = fake_toolchain_context(tmp.path(), FakeDriver::SingleLine);
        ctx.set("__probe", false);
        ctx.set("__cc_magic_flags", "-m64");

        let tc = Toolchain::detect(&ctx).unwrap();
        assert!(!tc.assemble_stage);
        assert!(!tc.c.compile.probed);
        assert_eq!(tc.c.compile.before_input, words("-c -m64"));
        assert!(tc.ld.is_driver);
        assert_eq!(tc.ld_shared.before_input, words("-shared"));

        let mut sink = RecordingSink::new();
        tc.emit_rules(&ctx, &mut sink).unwrap();
        assert_eq!(
            sink.rule_names(),
            vec![
                "__cc",
                "__cpp",
                "__cc_s",
                "__cpp_s",
                "__as_c",
                "__as_cpp",
                "__ar",
                "__ld",
                "__ld_shared"
            ]
        );
        assert!(matches!(
            &sink.records[0],
            GraphRecord::Pool { name, depth: 1 } if name == LINK_POOL
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_two_stage_driver_sets_assemble_stage() {
        use crate::test_support::{fake_toolchain_context, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = fake_toolchain_context(tmp.path(), FakeDriver::TwoStage);

        let tc = Toolchain::detect(&ctx).unwrap();
        assert!(tc.assemble_stage);
        assert_eq!(exec_stem(&tc.c.assemble.exec), "as");
        assert_eq!(tc.c.assemble.before_input, words("--64"));
        assert_eq!(exec_stem(&tc.c.compile_asm.exec), "cc1");
        assert_eq!(tc.c.compile_asm.before_input, words("-quiet"));
        assert_eq!(exec_stem(&tc.ld.exec), "collect2");
        assert_eq!(tc.ld.before_input, words("crt1.o"));
        assert_eq!(tc.ld.after_input, words("-lc crtn.o"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shared_link_probed_separately() {
        use crate::test_support::{fake_toolchain_context, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = fake_toolchain_context(tmp.path(), FakeDriver::TwoStage);

        let tc = Toolchain::detect(&ctx).unwrap();
        assert_eq!(exec_stem(&tc.ld_shared.exec), "collect2");
        assert_eq!(tc.ld_shared.before_input, words("-shared crti.o crtbeginS.o"));
        assert!(!tc.ld_shared.before_input.contains(&"crt1.o".to_string()));
        assert_eq!(tc.ld_shared.after_input, words("-lc crtn.o"));

        let mut sink = RecordingSink::new();
        tc.emit_rules(&ctx, &mut sink).unwrap();
        let shared = sink
            .records
            .iter()
            .find_map(|r| match r {
                GraphRecord::Rule { name, command, .. } if name == SHARED_LINK_RULE => {
                    Some(command.clone())
                }
                _ => None,
            })
            .unwrap();
        assert!(shared.contains("-shared crti.o crtbeginS.o $in $__ld_shared_flags"));
        assert!(!shared.contains("crt1.o"));
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_ld_gets_shared_mode() {
        use crate::test_support::{fake_toolchain_context, write_script, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let mut ctx = fake_toolchain_context(tmp.path(), FakeDriver::SingleLine);
        let ld = tmp.path().join("bin/ld");
        write_script(&ld, "exit 0");
        ctx.set("__ld_path", ld.display().to_string());

        let tc = Toolchain::detect(&ctx).unwrap();
        assert!(tc.ld.before_input.is_empty());
        assert_eq!(tc.ld_shared.before_input, words("-shared"));
    }

    #[cfg(unix)]
    #[test]
    fn test_store_caches_results() {
        use crate::test_support::{fake_toolchain_context, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let mut ctx = fake_toolchain_context(tmp.path(), FakeDriver::SingleLine);
        let tc = Toolchain::detect(&ctx).unwrap();
        tc.store(&mut ctx);

        assert_eq!(ctx.get_raw("__assemble_stage"), Some(false.into()));
        let flags = ctx.get_raw("__cc_probed_flags").unwrap();
        assert!(flags.as_str().unwrap().contains("-emit-obj"));
    }

    #[test]
    fn test_probe_error_suggestions() {
        let missing = ProbeError::NotFound {
            role: "cc".into(),
            name: "clang-99".into(),
        };
        let text = missing.to_diagnostic().format(false);
        assert!(text.contains("can not find executable `clang-99` for cc"));
        assert!(text.contains("--cross-compile-root"));

        let failed = ProbeError::NoCandidate {
            driver: PathBuf::from("/usr/bin/cc"),
            output: String::new(),
        };
        assert!(failed.to_diagnostic().format(false).contains("--no-probe"));
    }
}
