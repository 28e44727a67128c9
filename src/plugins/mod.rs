//! Library plugins.
//!
//! A plugin answers a `@plugin:<name>//<param>` dependency reference with
//! the flags and files needed to use an external library. Plugins are
//! either compiled in ([`builtin`]) or user-declared programs run as
//! subprocesses ([`external`]).

pub mod builtin;
pub mod external;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::process::{ProcessBuilder, ProcessError};

pub use builtin::ConfigTool;
pub use external::ExternalPlugin;

/// What a plugin contributes to a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginOutput {
    /// Extra link inputs
    pub deps: Vec<String>,
    /// Files the link step must wait for
    pub implicit_files: Vec<String>,
    pub cflags: String,
    pub cppflags: String,
    pub ldflags: String,
}

/// Errors raised while registering or calling plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin `{name}` is already registered (by {existing})")]
    Duplicate { name: String, existing: String },

    #[error("unknown plugin `{name}`")]
    Unknown { name: String },

    #[error("plugin `{name}`: program not found: {}", path.display())]
    ProgramNotFound { name: String, path: PathBuf },

    #[error("plugin `{name}`: program is not executable: {}", path.display())]
    NotExecutable { name: String, path: PathBuf },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("`{command}` exited with status {code:?}\n{stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` printed invalid plugin output")]
    InvalidOutput {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("plugin `{name}` failed for parameter `{param}`")]
    Call {
        name: String,
        param: String,
        #[source]
        source: Box<PluginError>,
    },
}

/// How long a plugin program may run.
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// A resolver for external libraries.
pub trait LibraryPlugin: fmt::Debug + Send + Sync {
    /// Resolve one parameter (usually a package name).
    fn resolve(&self, param: &str) -> Result<PluginOutput, PluginError>;
}

#[derive(Debug)]
struct Registered {
    plugin: Box<dyn LibraryPlugin>,
    origin: String,
}

/// Name to plugin map. Populated once, read-only afterwards.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Registered>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    /// A registry holding the built-in config-tool plugins.
    pub fn with_builtins() -> Self {
        let mut registry = PluginRegistry::new();
        for tool in builtin::config_tools() {
            let name = tool.name.to_string();
            registry
                .register(&name, Box::new(tool), "built-in")
                .expect("built-in plugin names are distinct");
        }
        registry
    }

    /// Register a plugin. Re-registering a name is an error naming the
    /// first registration.
    pub fn register(
        &mut self,
        name: &str,
        plugin: Box<dyn LibraryPlugin>,
        origin: &str,
    ) -> Result<(), PluginError> {
        if let Some(existing) = self.plugins.get(name) {
            return Err(PluginError::Duplicate {
                name: name.to_string(),
                existing: existing.origin.clone(),
            });
        }
        tracing::debug!("registered plugin `{}` ({})", name, origin);
        self.plugins.insert(
            name.to_string(),
            Registered {
                plugin,
                origin: origin.to_string(),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Call a plugin. Failures are wrapped with the plugin name and
    /// parameter.
    pub fn resolve(&self, name: &str, param: &str) -> Result<PluginOutput, PluginError> {
        let registered = self.plugins.get(name).ok_or_else(|| PluginError::Unknown {
            name: name.to_string(),
        })?;
        tracing::debug!("resolving `{}` with plugin `{}`", param, name);
        registered
            .plugin
            .resolve(param)
            .map_err(|e| PluginError::Call {
                name: name.to_string(),
                param: param.to_string(),
                source: Box::new(e),
            })
    }
}

/// Run a plugin program and return its stdout.
pub(crate) fn capture(cmd: &ProcessBuilder, timeout: Duration) -> Result<String, PluginError> {
    let output = cmd.exec_with_timeout(timeout)?;
    if !output.status.success() {
        return Err(PluginError::Failed {
            command: cmd.display_command(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
