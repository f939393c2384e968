// Inactive-account purge orchestration

//! Inactive-account purge orchestration
//!
//! Joins the credential listing against the activity map recovered from
//! the access log and deletes every account idle for at least the
//! configured number of whole days. Deletions run strictly sequentially so
//! two privileged processes never race on the credential file. Individual
//! failures land in the report without aborting the run.

use crate::activity::{extract_activity, tail_access_log};
use crate::credentials::{CredentialOutcome, CredentialStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Aggregated result of one purge run
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Accounts removed this run
    pub deleted: Vec<String>,
    /// Accounts below the staleness threshold
    pub skipped: Vec<String>,
    /// `identity: message` for every failed deletion
    pub errors: Vec<String>,
}

/// Whether an account last seen at `last_seen` is eligible for deletion.
/// The threshold is inclusive: exactly `inactive_days` whole days of
/// silence already qualifies.
pub fn is_stale(last_seen: DateTime<Utc>, now: DateTime<Utc>, inactive_days: i64) -> bool {
    (now - last_seen).num_days() >= inactive_days
}

/// Orchestrates activity extraction and sequential credential deletion
pub struct InactivityPurger {
    store: CredentialStore,
    access_log: PathBuf,
    tail_lines: usize,
}

impl InactivityPurger {
    /// Create a purger over the given store and access log
    pub fn new(store: CredentialStore, access_log: PathBuf, tail_lines: usize) -> Self {
        Self {
            store,
            access_log,
            tail_lines,
        }
    }

    /// Delete every account inactive for at least `inactive_days`.
    ///
    /// An account absent from the scanned log window is treated as
    /// maximally stale (last seen at the epoch origin) and is always
    /// eligible. `Ok(report)` means the orchestration itself completed;
    /// per-account delete failures are carried in `report.errors`.
    pub async fn purge_inactive(&self, inactive_days: i64) -> Result<PurgeReport> {
        let now = Utc::now();
        let lines = tail_access_log(&self.access_log, self.tail_lines).await?;
        let last_activity = extract_activity(&lines, now);
        let accounts = self.store.list().await?;

        let mut report = PurgeReport::default();
        for account in accounts {
            let last_seen = last_activity
                .get(&account)
                .copied()
                .unwrap_or(DateTime::UNIX_EPOCH);

            if !is_stale(last_seen, now, inactive_days) {
                report.skipped.push(account);
                continue;
            }

            // One deletion at a time: no concurrent htpasswd processes on
            // the same credential file
            match self.store.delete(&account).await {
                Ok(CredentialOutcome::Applied(_)) => {
                    log::info!("Purged inactive account {}", account);
                    report.deleted.push(account);
                }
                Ok(outcome) => {
                    report
                        .errors
                        .push(format!("{}: {}", account, outcome.message()));
                }
                Err(e) => {
                    report.errors.push(format!("{}: {}", account, e));
                }
            }
        }

        Ok(report)
    }
}
