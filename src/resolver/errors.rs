//! Dependency resolution errors and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::plugins::PluginError;
use crate::util::diagnostic::{
    suggestions, DependsOnExecutableError, Diagnostic, UnresolvedDependencyError,
};
use crate::util::shell_words::ShellWordsError;

/// Error while resolving a target's dependency list.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum DependencyError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unresolved(#[from] UnresolvedDependencyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    DependsOnExecutable(#[from] DependsOnExecutableError),

    #[error("invalid plugin reference `{reference}` in target `{target}`")]
    InvalidPluginRef { target: String, reference: String },

    #[error("dependency `{dependency}` of target `{target}`")]
    Plugin {
        target: String,
        dependency: String,
        #[source]
        source: PluginError,
    },

    #[error("plugin `{plugin}` returned malformed {kind}")]
    PluginFlags {
        plugin: String,
        kind: &'static str,
        #[source]
        source: ShellWordsError,
    },

    #[error("invalid dependency pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
}

impl DependencyError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DependencyError::Unresolved(e) => Diagnostic::error(e.to_string())
                .with_context("no plugin, file or target matches this name")
                .with_suggestion(suggestions::UNRESOLVED),

            DependencyError::DependsOnExecutable(e) => Diagnostic::error(e.to_string())
                .with_suggestion(suggestions::DEPENDS_ON_EXECUTABLE),

            DependencyError::InvalidPluginRef { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::PLUGIN_SYNTAX),

            DependencyError::Plugin { source, .. } => {
                let mut diag = Diagnostic::error(self.to_string());
                let mut cause: Option<&dyn std::error::Error> = Some(source);
                while let Some(e) = cause {
                    diag = diag.with_context(e.to_string());
                    cause = e.source();
                }
                diag
            }

            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_diagnostic() {
        let err = DependencyError::from(UnresolvedDependencyError {
            target: "app".into(),
            dependency: "missing".into(),
        });
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("unresolved dependency `missing` of target `app`"));
        assert!(text.contains("help:"));
    }

    #[test]
    fn test_plugin_error_chain_in_context() {
        let err = DependencyError::Plugin {
            target: "app".into(),
            dependency: "@plugin:pkg-config//zlib".into(),
            source: PluginError::Call {
                name: "pkg-config".into(),
                param: "zlib".into(),
                source: Box::new(PluginError::Unknown { name: "x".into() }),
            },
        };
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("plugin `pkg-config` failed for parameter `zlib`"));
        assert!(text.contains("unknown plugin `x`"));
    }
}
