//! User-declared plugins backed by an external program.
//!
//! The program is run with the parameter as its only argument and must
//! print one JSON object:
//!
//! ```json
//! {"deps": [], "implicit_files": [], "cflags": "", "cppflags": "", "ldflags": ""}
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::spec::PluginDecl;
use crate::util::fs::SearchDirs;
use crate::util::process::{is_executable, ProcessBuilder};

use super::{capture, LibraryPlugin, PluginError, PluginOutput, DEFAULT_PLUGIN_TIMEOUT};

#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    pub name: String,
    pub program: PathBuf,
    pub timeout: Duration,
}

impl ExternalPlugin {
    /// Validate a declaration. The program must exist and be executable
    /// now, not at first use.
    pub fn load(decl: &PluginDecl, search: &SearchDirs) -> Result<Self, PluginError> {
        let program = search
            .resolve(&decl.path)
            .ok_or_else(|| PluginError::ProgramNotFound {
                name: decl.name.clone(),
                path: PathBuf::from(&decl.path),
            })?;
        if !is_executable(&program) {
            return Err(PluginError::NotExecutable {
                name: decl.name.clone(),
                path: program,
            });
        }
        Ok(ExternalPlugin {
            name: decl.name.clone(),
            program,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl LibraryPlugin for ExternalPlugin {
    fn resolve(&self, param: &str) -> Result<PluginOutput, PluginError> {
        let cmd = ProcessBuilder::new(&self.program).arg(param);
        let stdout = capture(&cmd, self.timeout)?;
        serde_json::from_str(stdout.trim()).map_err(|source| PluginError::InvalidOutput {
            command: cmd.display_command(),
            source,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::write_script;
    use tempfile::TempDir;

    fn decl(name: &str, path: &str) -> PluginDecl {
        PluginDecl {
            name: name.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_load_resolves_relative_to_spec_dir() {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("tools/find-foo"), "exit 0");
        let search = SearchDirs::new(Some(dir.path()), dir.path());

        let plugin = ExternalPlugin::load(&decl("foo", "tools/find-foo"), &search).unwrap();
        assert!(plugin.program().ends_with("tools/find-foo"));
    }

    #[test]
    fn test_load_rejects_missing_and_plain_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plain"), "").unwrap();
        let search = SearchDirs::new(Some(dir.path()), dir.path());

        assert!(matches!(
            ExternalPlugin::load(&decl("x", "no-such-program"), &search),
            Err(PluginError::ProgramNotFound { .. })
        ));
        assert!(matches!(
            ExternalPlugin::load(&decl("x", "plain"), &search),
            Err(PluginError::NotExecutable { .. })
        ));
    }

    #[test]
    fn test_resolve_parses_json() {
        let dir = TempDir::new().unwrap();
        let program = dir.path().join("find-foo");
        write_script(
            &program,
            r#"echo "{\"deps\": [\"/opt/$1/lib/lib$1.a\"], \"cflags\": \"-I/opt/$1/include\"}""#,
        );
        let plugin = ExternalPlugin {
            name: "foo".into(),
            program,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        };

        let out = plugin.resolve("bar").unwrap();
        assert_eq!(out.deps, vec!["/opt/bar/lib/libbar.a".to_string()]);
        assert_eq!(out.cflags, "-I/opt/bar/include");
        assert_eq!(out.cppflags, "");
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let program = dir.path().join("find-foo");
        write_script(&program, "echo not json");
        let plugin = ExternalPlugin {
            name: "foo".into(),
            program,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        };

        assert!(matches!(
            plugin.resolve("bar"),
            Err(PluginError::InvalidOutput { .. })
        ));
    }
}
