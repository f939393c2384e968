// Proxy account credential management

//! Proxy account credential management via htpasswd
//!
//! Wraps the htpasswd executable behind the command runner: add-or-update
//! with auto-create-on-missing-file recovery, delete with a distinct
//! not-found outcome, and a direct read of the credential file for listing.
//! The file format is one `identity:opaque-secret` entry per line; only the
//! first colon separates fields.

use crate::runner::CommandRunner;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of a credential mutation, explicit so callers branch on a
/// stable contract instead of tuple position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// The change took effect; message describes what happened
    Applied(String),
    /// The named account does not exist (non-fatal for batch callers)
    NotFound(String),
    /// The tool failed without a recovery heuristic; message is its output
    Failed(String),
}

impl CredentialOutcome {
    /// True for [`CredentialOutcome::Applied`]
    pub fn success(&self) -> bool {
        matches!(self, CredentialOutcome::Applied(_))
    }

    /// The human-readable message carried by any variant
    pub fn message(&self) -> &str {
        match self {
            CredentialOutcome::Applied(m)
            | CredentialOutcome::NotFound(m)
            | CredentialOutcome::Failed(m) => m,
        }
    }
}

/// Credential store managed through the htpasswd executable
#[derive(Clone)]
pub struct CredentialStore {
    htpasswd_cmd: String,
    passwd_file: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl CredentialStore {
    /// Create a store over `passwd_file`, mutated via `htpasswd_cmd`
    pub fn new(htpasswd_cmd: String, passwd_file: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            htpasswd_cmd,
            passwd_file,
            runner,
        }
    }

    fn passwd_file_arg(&self) -> String {
        self.passwd_file.to_string_lossy().into_owned()
    }

    /// Add or update an account.
    ///
    /// Success is exit code 0 or an "added"/"updated" notice on stdout.
    /// When the credential file does not exist yet, htpasswd reports
    /// "No such file"; we retry once with the create flag and only then
    /// surface the failure.
    pub async fn add(&self, username: &str, secret: &str) -> Result<CredentialOutcome> {
        if username.is_empty() || username.contains(':') || username.contains('/') {
            return Ok(CredentialOutcome::Failed("invalid username".to_string()));
        }

        let file = self.passwd_file_arg();
        let out = self
            .runner
            .run(&self.htpasswd_cmd, &["-b", &file, username, secret])
            .await?;

        let stdout_lower = out.stdout.to_lowercase();
        if out.success() || stdout_lower.contains("added") || stdout_lower.contains("updated") {
            return Ok(CredentialOutcome::Applied("user added/updated".to_string()));
        }

        if out.stderr.contains("No such file") || out.stdout.contains("No such") {
            let out2 = self
                .runner
                .run(&self.htpasswd_cmd, &["-b", "-c", &file, username, secret])
                .await?;
            if out2.success() {
                return Ok(CredentialOutcome::Applied(
                    "user added and passwd file created".to_string(),
                ));
            }
            return Ok(CredentialOutcome::Failed(out2.failure_text().to_string()));
        }

        Ok(CredentialOutcome::Failed(out.failure_text().to_string()))
    }

    /// Delete an account.
    ///
    /// htpasswd exits non-zero when the user is absent; that is reported
    /// as [`CredentialOutcome::NotFound`], not a tool error.
    pub async fn delete(&self, username: &str) -> Result<CredentialOutcome> {
        let file = self.passwd_file_arg();
        let out = self
            .runner
            .run(&self.htpasswd_cmd, &["-D", &file, username])
            .await?;

        if out.success() {
            return Ok(CredentialOutcome::Applied("deleted".to_string()));
        }

        let stderr_lower = out.stderr.to_lowercase();
        if stderr_lower.contains("not found") || stderr_lower.contains("no such") {
            return Ok(CredentialOutcome::NotFound("user not found".to_string()));
        }

        Ok(CredentialOutcome::Failed(out.failure_text().to_string()))
    }

    /// List account identities from the credential file.
    ///
    /// A missing file is an empty store, not an error. Only the first
    /// colon on each line separates the identity from the opaque secret.
    pub async fn list(&self) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.passwd_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", self.passwd_file.display())
                })
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split(':').next().unwrap_or(line).to_string())
            .collect())
    }
}
