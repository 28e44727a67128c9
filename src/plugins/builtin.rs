//! Built-in plugins wrapping `*-config` style tools.

use std::time::Duration;

use crate::util::process::ProcessBuilder;

use super::{capture, LibraryPlugin, PluginError, PluginOutput, DEFAULT_PLUGIN_TIMEOUT};

/// A `*-config` program queried once per flag kind.
#[derive(Debug, Clone)]
pub struct ConfigTool {
    /// Plugin name, also the default program name
    pub name: &'static str,
    /// Environment variable overriding the program path
    pub env_var: &'static str,
    pub cflags_args: &'static [&'static str],
    pub cppflags_args: &'static [&'static str],
    pub ldflags_args: &'static [&'static str],
    pub timeout: Duration,
}

/// The built-in table.
pub fn config_tools() -> Vec<ConfigTool> {
    vec![
        ConfigTool::new("pkg-config", "PKG_CONFIG", &["--cflags"], &["--cflags"], &["--libs"]),
        ConfigTool::new("llvm-config", "LLVM_CONFIG", &["--cflags"], &["--cxxflags"], &["--libs"]),
        ConfigTool::new("fltk-config", "FLTK_CONFIG", &["--cflags"], &["--cflags"], &["--ldflags"]),
        ConfigTool::new("odbc_config", "ODBC_CONFIG", &["--cflags"], &["--cflags"], &["--libs"]),
        ConfigTool::new("wx-config", "WX_CONFIG", &["--cxxflags"], &["--cxxflags"], &["--libs"]),
    ]
}

impl ConfigTool {
    pub fn new(
        name: &'static str,
        env_var: &'static str,
        cflags_args: &'static [&'static str],
        cppflags_args: &'static [&'static str],
        ldflags_args: &'static [&'static str],
    ) -> Self {
        ConfigTool {
            name,
            env_var,
            cflags_args,
            cppflags_args,
            ldflags_args,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }

    /// Program to run: the environment override, else the plugin name.
    pub fn program(&self) -> String {
        std::env::var(self.env_var)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.name.to_string())
    }

    fn query(&self, program: &str, args: &[&str], param: &str) -> Result<String, PluginError> {
        let mut cmd = ProcessBuilder::new(program).args(args);
        if !param.is_empty() {
            cmd = cmd.arg(param);
        }
        Ok(capture(&cmd, self.timeout)?.trim().to_string())
    }
}

impl LibraryPlugin for ConfigTool {
    fn resolve(&self, param: &str) -> Result<PluginOutput, PluginError> {
        self.resolve_with(&self.program(), param)
    }
}

impl ConfigTool {
    fn resolve_with(&self, program: &str, param: &str) -> Result<PluginOutput, PluginError> {
        let cflags = self.query(program, self.cflags_args, param)?;
        let cppflags = if self.cppflags_args == self.cflags_args {
            cflags.clone()
        } else {
            self.query(program, self.cppflags_args, param)?
        };
        let ldflags = self.query(program, self.ldflags_args, param)?;

        Ok(PluginOutput {
            deps: Vec::new(),
            implicit_files: Vec::new(),
            cflags,
            cppflags,
            ldflags,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::write_script;
    use tempfile::TempDir;

    fn fake_config(dir: &TempDir) -> String {
        let program = dir.path().join("fake-config");
        write_script(
            &program,
            r#"case "$1" in
  --cflags) echo "-I/opt/$2/include" ;;
  --cxxflags) echo "-I/opt/$2/include -std=c++17" ;;
  --libs) echo "-L/opt/$2/lib -l$2" ;;
  *) exit 2 ;;
esac"#,
        );
        program.display().to_string()
    }

    fn tool(name: &str) -> ConfigTool {
        config_tools()
            .into_iter()
            .find(|t| t.name == name)
            .unwrap()
    }

    #[test]
    fn test_queries_each_flag_kind() {
        let dir = TempDir::new().unwrap();
        let program = fake_config(&dir);

        let out = tool("llvm-config").resolve_with(&program, "zlib").unwrap();
        assert_eq!(out.cflags, "-I/opt/zlib/include");
        assert_eq!(out.cppflags, "-I/opt/zlib/include -std=c++17");
        assert_eq!(out.ldflags, "-L/opt/zlib/lib -lzlib");
        assert!(out.deps.is_empty());
    }

    #[test]
    fn test_shared_compile_flags() {
        let dir = TempDir::new().unwrap();
        let program = fake_config(&dir);

        let out = tool("pkg-config").resolve_with(&program, "png").unwrap();
        assert_eq!(out.cflags, out.cppflags);
        assert_eq!(out.ldflags, "-L/opt/png/lib -lpng");
    }

    #[test]
    fn test_failing_tool_reports_status() {
        let dir = TempDir::new().unwrap();
        let program = fake_config(&dir);

        let err = tool("fltk-config").resolve_with(&program, "").unwrap_err();
        assert!(matches!(err, PluginError::Failed { code: Some(2), .. }));
    }

    #[test]
    fn test_program_defaults_to_name() {
        let t = tool("wx-config");
        if std::env::var_os(t.env_var).is_none() {
            assert_eq!(t.program(), "wx-config");
        }
    }
}
