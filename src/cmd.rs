use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{SpinupError, SpinupResult};

/// Exit code and captured streams of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `-1` when the process was killed by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run a command and capture its output. Fails if the command
/// returns a non-zero exit code.
pub fn run(program: &str, args: &[&str], envs: &[(&str, &str)]) -> SpinupResult<String> {
    let output = spawn(program, args, envs)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(program, %stderr, "command failed");
        Err(SpinupError::CommandFailed {
            command: format_command(program, args),
            status: output.status,
        })
    }
}

/// Run a command and hand back its exit code and output whatever
/// the outcome. Only a failure to start the process is an error.
pub fn capture(program: &str, args: &[&str], envs: &[(&str, &str)]) -> SpinupResult<CommandOutput> {
    let output = spawn(program, args, envs)?;
    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run a command with every stream detached and wait for it to
/// exit. For programs that fork a background process which would
/// otherwise hold captured pipes open.
pub fn run_detached(program: &str, args: &[&str], envs: &[(&str, &str)]) -> SpinupResult<()> {
    let status = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| spawn_error(program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(SpinupError::CommandFailed {
            command: format_command(program, args),
            status,
        })
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn spawn(program: &str, args: &[&str], envs: &[(&str, &str)]) -> SpinupResult<Output> {
    Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))
}

fn spawn_error(program: &str, e: std::io::Error) -> SpinupError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SpinupError::CommandNotFound(program.to_string())
    } else {
        SpinupError::Io(e)
    }
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
