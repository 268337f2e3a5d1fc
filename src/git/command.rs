//! Whitelist-validated external command execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: only pre-approved tool commands execute
//! - **Injection prevention**: uses `tokio::process::Command`, arguments are
//!   never interpolated into shell strings
//! - **Working directory validation**: validated before execution
//!
//! Two modes are provided. `run` captures trimmed stdout for commands whose
//! output is data (`git config`, `git status --porcelain`). `stream` forwards
//! stdout/stderr to the console line-by-line while the subprocess runs, for
//! long operations (`npm install`, `git clone`); the next orchestration step
//! never starts before the subprocess exits.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Allowed tool commands.
///
/// The browser launchers are included because they are invoked with a URL
/// argument during the fork-creation flow.
const ALLOWED_COMMANDS: &[&str] = &["git", "npm", "explorer", "open", "xdg-open"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be spawned (binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exited with a non-zero status
    #[error("Command '{command}' exited with status {code}: {stderr}")]
    ExitStatus {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// Seam for every external process this tool spawns
///
/// Orchestrators and the reconciler hold a `&dyn CommandRunner`, so tests
/// substitute a scripted fake instead of touching git or npm.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a whitelisted command, capturing trimmed stdout
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, CommandError>;

    /// Run a whitelisted command, streaming its output to the console
    async fn stream(
        &self,
        command: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<(), CommandError>;

    /// Run an operator-resolved binary path, capturing trimmed stdout
    ///
    /// Exempt from the whitelist: the path was located explicitly by the
    /// operator or the executable search, not assembled from input.
    async fn run_binary(&self, binary: &Path, args: &[&str]) -> Result<String, CommandError>;
}

/// Command runner backed by real subprocesses
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn validate(command: &str, cwd: Option<&Path>) -> Result<(), CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }
        if let Some(dir) = cwd {
            if !dir.exists() {
                return Err(CommandError::InvalidWorkingDirectory(dir.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Windows-specific: npm is npm.cmd, not npm.exe
    fn command_name(command: &str) -> String {
        if cfg!(target_os = "windows") && command == "npm" {
            format!("{}.cmd", command)
        } else {
            command.to_string()
        }
    }

    async fn capture(
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(CommandError::ExitStatus {
                command: format!("{} {}", program, args.join(" ")),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, CommandError> {
        Self::validate(command, cwd)?;
        Self::capture(&Self::command_name(command), args, cwd).await
    }

    async fn stream(
        &self,
        command: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<(), CommandError> {
        Self::validate(command, cwd)?;

        let mut cmd = Command::new(Self::command_name(command));
        cmd.args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        // Forward both streams while the process runs; keep stderr for the error
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    println!("{}", line);
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{}", line);
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let status = child
            .wait()
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
        let _ = stdout_task.await;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(CommandError::ExitStatus {
                command: format!("{} {}", command, args.join(" ")),
                code: status.code().unwrap_or(-1),
                stderr: stderr_text.trim().to_string(),
            });
        }

        Ok(())
    }

    async fn run_binary(&self, binary: &Path, args: &[&str]) -> Result<String, CommandError> {
        let program = binary.to_string_lossy().to_string();
        Self::capture(&program, args, None).await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted command runner for tests
    //!
    //! Commands are keyed as `"program arg1 arg2"`. Unknown keys succeed
    //! with empty output, keys in `fail_on` fail with a non-zero status,
    //! keys in `outputs` return the scripted stdout. Every invocation is
    //! recorded in order.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedRunner {
        pub calls: Mutex<Vec<String>>,
        pub fail_on: HashSet<String>,
        pub outputs: HashMap<String, String>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_on(mut self, command_line: &str) -> Self {
            self.fail_on.insert(command_line.to_string());
            self
        }

        pub fn output(mut self, command_line: &str, stdout: &str) -> Self {
            self.outputs
                .insert(command_line.to_string(), stdout.to_string());
            self
        }

        pub fn recorded_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn invoke(&self, key: String) -> Result<String, CommandError> {
            self.calls.lock().unwrap().push(key.clone());
            if self.fail_on.contains(&key) {
                return Err(CommandError::ExitStatus {
                    command: key,
                    code: 1,
                    stderr: "scripted failure".to_string(),
                });
            }
            Ok(self.outputs.get(&key).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            command: &str,
            args: &[&str],
            _cwd: Option<&Path>,
        ) -> Result<String, CommandError> {
            self.invoke(format!("{} {}", command, args.join(" ")))
        }

        async fn stream(
            &self,
            command: &str,
            args: &[&str],
            _cwd: Option<&Path>,
        ) -> Result<(), CommandError> {
            self.invoke(format!("{} {}", command, args.join(" ")))
                .map(|_| ())
        }

        async fn run_binary(&self, binary: &Path, args: &[&str]) -> Result<String, CommandError> {
            self.invoke(format!("{} {}", binary.display(), args.join(" ")))
        }
    }
}
