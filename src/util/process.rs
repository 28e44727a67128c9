//! Running external tools.
//!
//! Probes and plugins are captured with a hard timeout; `ninja` runs with
//! the terminal attached.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context as _;
use thiserror::Error;
use wait_timeout::ChildExt;

use crate::util::shell_words;

/// Failures of a bounded subprocess run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("failed to wait for `{program}`")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program and its arguments.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Run to completion with stdout and stderr captured, killing the child
    /// once `timeout` elapses.
    ///
    /// Both pipes are drained on their own threads so a chatty child never
    /// blocks on a full pipe while we wait.
    pub fn exec_with_timeout(&self, timeout: Duration) -> Result<Output, ProcessError> {
        let program = self.program.display().to_string();
        let mut child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = child
            .wait_timeout(timeout)
            .map_err(|source| ProcessError::Wait { program, source })?;
        let Some(status) = waited else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::Timeout {
                command: self.display_command(),
                timeout,
            });
        };

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    /// Run with the terminal attached and return the exit status.
    pub fn status(&self) -> anyhow::Result<ExitStatus> {
        self.command()
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))
    }

    /// The command line, quoted for a POSIX shell.
    pub fn display_command(&self) -> String {
        let program = self.program.display().to_string();
        shell_words::join(std::iter::once(&program).chain(&self.args))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command_quotes() {
        let pb = ProcessBuilder::new("cc").args(["-c", "my file.c", "-o", "out.o"]);
        assert_eq!(pb.display_command(), "cc -c 'my file.c' -o out.o");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_captures_output() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .exec_with_timeout(Duration::from_secs(10))
            .unwrap();

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_timeout_kills_slow_child() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "sleep 5"])
            .exec_with_timeout(Duration::from_millis(100))
            .unwrap_err();

        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[test]
    fn test_spawn_missing_program() {
        let err = ProcessBuilder::new("/definitely/not/a/program")
            .exec_with_timeout(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_status_propagates_exit_code() {
        let status = ProcessBuilder::new("sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_executable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("tool");
        std::fs::write(&file, "#!/bin/sh\n").unwrap();
        assert!(!is_executable(&file));

        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&file));
        assert!(!is_executable(tmp.path()));
    }
}
