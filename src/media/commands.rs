use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, RemoverError};

/// Abstract external tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub description: String,
}

impl ToolCommand {
    /// Create a new command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            envs: Vec::new(),
            working_dir: None,
            timeout: None,
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add a path argument
    pub fn path_arg<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Set an environment variable for the child
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the child if it runs longer than `secs`; `None` waits forever
    pub fn timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout = secs.map(Duration::from_secs);
        self
    }
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools. A non-zero exit is reported through
/// [`CommandOutput::exit_code`], not as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        debug!("Executing {}: {} {:?}", command.description, command.binary_path, command.args);

        let mut cmd = Command::new(&command.binary_path);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &command.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            RemoverError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to start {} ({}): {}", command.description, command.binary_path, e),
            ))
        })?;

        // Dropping the pending future drops the child, which kills it.
        let output = match command.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    warn!("{} exceeded {}s and was killed", command.description, limit.as_secs());
                    return Err(RemoverError::ProcessingTimeout {
                        tool: command.description.clone(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait_with_output().await?,
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!("{} exited with {:?}", command.description, result.exit_code);

        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let command = ToolCommand::new("sh", "shell")
            .args(["-c", "echo hello; echo oops >&2; exit 3"]);

        let output = SystemCommandRunner::new().run(&command).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_passes_environment_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let command = ToolCommand::new("sh", "shell")
            .args(["-c", "echo \"$MARK\"; pwd"])
            .env("MARK", "set")
            .current_dir(dir.path());

        let output = SystemCommandRunner::new().run(&command).await.unwrap();
        let lines: Vec<&str> = output.stdout.lines().collect();

        assert_eq!(lines[0], "set");
        assert_eq!(
            Path::new(lines[1]).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let command = ToolCommand::new("sh", "sleeper")
            .args(["-c", "sleep 5"])
            .timeout_secs(Some(1));

        let err = SystemCommandRunner::new().run(&command).await.unwrap_err();

        assert!(matches!(err, RemoverError::ProcessingTimeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let command = ToolCommand::new("/nonexistent/tool-binary", "missing tool");
        let err = SystemCommandRunner::new().run(&command).await.unwrap_err();
        assert!(matches!(err, RemoverError::Io(_)));
    }
}
