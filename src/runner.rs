// External command execution capability

//! Injectable external-command execution capability
//!
//! Every privileged executable (wg, htpasswd) is invoked through the
//! [`CommandRunner`] trait so unit tests can substitute a scripted fake
//! without touching real system binaries. The system implementation spawns
//! through tokio so a slow or hung process never stalls the cooperative
//! scheduler.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Captured result of one external command invocation
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Process exit code; -1 when terminated by a signal
    pub code: i32,
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl CmdOutput {
    /// True when the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// The failure text a caller should surface: stderr when present,
    /// otherwise stdout
    pub fn failure_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Capability for invoking external executables off the scheduling path
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, capturing exit code, stdout and stderr.
    ///
    /// A non-zero exit is NOT an error at this layer: callers inspect the
    /// output to select success/recovery/failure behavior. `Err` means the
    /// process could not be spawned or awaited at all.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput>;
}

/// Runner backed by real process spawning
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", program))?;

        Ok(CmdOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
