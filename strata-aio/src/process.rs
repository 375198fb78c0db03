// strata-aio/src/process.rs
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Output as StdOutput;
use std::process::Stdio;
use std::sync::Arc;

use strata_common::error::{Result, StrataError};
use tokio::process::Command;
use tracing::{debug, error};

/// Runs an external command and captures its output. Blocking; this is
/// what step executors inside pool workers call.
pub fn run_command(
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Option<BTreeMap<String, String>>,
) -> Result<StdOutput> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>()) // Log only keys for envs
    );
    let mut cmd = std::process::Command::new(command);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null()); // Prevent hanging on stdin

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output) // Return the full output regardless of status
        }
        Err(e) => {
            error!("Failed to execute command: {}", e);
            Err(StrataError::Io(Arc::new(e)))
        }
    }
}

/// Asynchronously runs an external command and captures its output. Used
/// where a tokio runtime is already driving (installer probes).
pub async fn run_command_async(
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Option<BTreeMap<String, String>>,
) -> Result<StdOutput> {
    debug!(
        "Async Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>())
    );

    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd.kill_on_drop(true); // Ensure process is killed if the command handle is dropped

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output().await {
        Ok(output) => {
            if !output.status.success() {
                debug!("Async Command failed with status: {}", output.status);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Async Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Async Failed to execute command: {}", e);
            Err(StrataError::Io(Arc::new(e)))
        }
    }
}

/// Extracts the tail of a failed command's stderr for error reporting.
pub fn stderr_tail(output: &StdOutput, max_lines: usize) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_exit_status_and_output() {
        let output = run_command(
            "sh".to_string(),
            vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            None,
            None,
        )
        .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(stderr_tail(&output, 5), "err");
    }

    #[test]
    fn passes_environment_through() {
        let mut envs = BTreeMap::new();
        envs.insert("STRATA_TEST_VALUE".to_string(), "42".to_string());
        let output = run_command(
            "sh".to_string(),
            vec!["-c".to_string(), "printf '%s' \"$STRATA_TEST_VALUE\"".to_string()],
            None,
            Some(envs),
        )
        .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "42");
    }

    #[test]
    fn missing_binary_is_an_error() {
        assert!(run_command(
            "definitely-not-a-real-binary-xyz".to_string(),
            vec![],
            None,
            None
        )
        .is_err());
    }
}
