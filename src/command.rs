//! External command execution
//!
//! Every stage that touches the host (package managers, systemctl, openssl,
//! certbot, nginx) goes through the `CommandRunner` trait. `SystemRunner` is
//! the real implementation; tests substitute scripted runners.

use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::debug;

/// Captured result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout
    #[must_use]
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr
    #[must_use]
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Seam between the provisioning stages and the host's external tools.
///
/// `run` only returns `Err` when the program could not be spawned at all; a
/// non-zero exit is reported through `CommandOutput::success`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output
    ///
    /// # Errors
    ///
    /// Returns an error only when the program cannot be started
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Whether `program` resolves to an executable on `PATH`
    fn has_program(&self, program: &str) -> bool;
}

/// Runs commands on the local host through `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running: {program} {}", args.join(" "));
        let output = tokio::process::Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn has_program(&self, program: &str) -> bool {
        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run a command and turn a non-zero exit into `ProvisionError::CommandFailed`.
///
/// # Arguments
///
/// * `runner` - Executes the command
/// * `program` - Program name, resolved on `PATH`
/// * `args` - Arguments passed as-is, without a shell
///
/// # Returns
///
/// The captured output of a successful run
///
/// # Errors
///
/// Returns an error if the program cannot be spawned or exits unsuccessfully.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput> {
    let output = runner.run(program, args).await?;
    if output.success {
        Ok(output)
    } else {
        Err(ProvisionError::CommandFailed {
            program: format!("{program} {}", args.join(" ")).trim_end().to_string(),
            code: output.code,
            stderr: output.stderr,
        })
    }
}

/// Run a command whose failure is acceptable.
///
/// # Returns
///
/// The captured output. A program that could not be started comes back as a
/// failed output with no exit code and the spawn error as stderr.
pub async fn run_lenient(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> CommandOutput {
    match runner.run(program, args).await {
        Ok(output) => output,
        Err(e) => CommandOutput {
            success: false,
            code: None,
            stdout: String::new(),
            stderr: e.to_string(),
        },
    }
}
