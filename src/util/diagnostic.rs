//! User-friendly diagnostic messages.
//!
//! Every fatal configuration error names the construct at fault and, where
//! one exists, a concrete way to fix it.

use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no spec file is found.
    pub const NO_SPEC: &str = "help: Pass `--config <file>` or create `build.toml`";

    /// Suggestion when a source has no rule.
    pub const NO_RULE: &str =
        "help: Add a `rule_map` entry to the target, e.g. `\"\\\\.s$\" = \"__as_c\"`";

    /// Suggestion when a dependency cannot be resolved.
    pub const UNRESOLVED: &str =
        "help: Declare a target with that name, use `@plugin:<name>//<param>`, or point at a file";

    /// Suggestion when a target depends on an executable.
    pub const DEPENDS_ON_EXECUTABLE: &str =
        "help: Only `static_library` and `dynamic_library` targets can be dependencies";

    /// Suggestion for a malformed plugin reference.
    pub const PLUGIN_SYNTAX: &str = "help: Plugin references look like `@plugin:pkg-config//zlib`";

    /// Suggestion when a toolchain executable is missing.
    pub const MISSING_TOOL: &str =
        "help: Set `--cc-path`/`--cpp-path` or `--cross-compile-root`";

    /// Suggestion when probing fails.
    pub const PROBE_FAILED: &str =
        "help: Pass `--no-probe` or set `__cc_magic_flags` to skip probing";
}

/// A fatal error as shown to the user: what failed, where, and how to fix it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// Construct chain, innermost first (`in target `app``, causes, ...)
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render for a terminal. `color` bolds the `error:` label.
    pub fn format(&self, color: bool) -> String {
        let label = if color { "\x1b[1;31merror\x1b[0m" } else { "error" };
        let mut out = format!("{}: {}\n", label, self.message);
        for line in &self.context {
            out.push_str("  = ");
            out.push_str(line);
            out.push('\n');
        }
        if !self.suggestions.is_empty() {
            out.push('\n');
            for suggestion in &self.suggestions {
                out.push_str(suggestion);
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// A source file matched no rule-map pattern.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("can not map rule for source: {source_path}")]
#[diagnostic(
    code(assemblage::plan::no_rule),
    help("add a `rule_map` entry matching this file to the target")
)]
pub struct NoRuleError {
    pub target: String,
    pub source_path: String,
}

/// A dependency reference matched no plugin, file or target.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("unresolved dependency `{dependency}` of target `{target}`")]
#[diagnostic(
    code(assemblage::resolve::unresolved),
    help("declare a target with that name, use `@plugin:<name>//<param>`, or point at a file")
)]
pub struct UnresolvedDependencyError {
    pub target: String,
    pub dependency: String,
}

/// A target depends on an executable target.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("target `{target}` can not depend on executable `{dependency}`")]
#[diagnostic(
    code(assemblage::plan::depends_on_executable),
    help("only static and dynamic libraries can be dependencies")
)]
pub struct DependsOnExecutableError {
    pub target: String,
    pub dependency: String,
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("unresolved dependency `zlib` of target `app`")
            .with_context("in target `app`")
            .with_suggestion(suggestions::UNRESOLVED);

        let output = diag.format(false);
        assert_eq!(
            output.lines().next(),
            Some("error: unresolved dependency `zlib` of target `app`")
        );
        assert!(output.contains("  = in target `app`\n"));
        assert!(output.contains("\nhelp: Declare a target"));
        assert!(diag.format(true).starts_with("\x1b[1;31merror"));
    }

    #[test]
    fn test_miette_codes() {
        let err = NoRuleError {
            target: "app".into(),
            source_path: "x.rs".into(),
        };
        assert_eq!(err.code().unwrap().to_string(), "assemblage::plan::no_rule");
        assert!(err.to_string().contains("x.rs"));

        let err = DependsOnExecutableError {
            target: "app".into(),
            dependency: "tool".into(),
        };
        assert_eq!(
            err.code().unwrap().to_string(),
            "assemblage::plan::depends_on_executable"
        );
    }
}
