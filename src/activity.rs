// Access-log tailing and activity extraction

//! Access-log tailing and last-activity extraction
//!
//! Two layers: a bounded tail-read of the (possibly large, possibly
//! missing) access log, and a pure extraction pipeline that recovers
//! (identity, timestamp) pairs from loosely-structured log text. The log
//! format is not fixed: lines may look like an epoch-prefixed proxy log or
//! a bracketed-date web-server log, so every heuristic degrades by
//! skipping rather than failing.
//!
//! Known limitation of the tail window: an identity whose only occurrence
//! lies before the trailing block of a large log is invisible to the scan.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::OnceLock;

/// Identity -> most recent UTC instant observed within the scanned window
pub type ActivityMap = HashMap<String, DateTime<Utc>>;

/// Logs at or above this size are read only from their trailing block
const SMALL_FILE_LIMIT: u64 = 5 * 1024 * 1024;

/// Trailing block size read from large logs
const TAIL_BLOCK: u64 = 200_000;

fn epoch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchored to a complete leading token: an IPv4-prefixed line must not
    // have its first two octets misread as an epoch
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)(?:\s|$)").expect("hardcoded regex"))
}

fn bracket_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(\d{1,2}/[A-Za-z]{3}/\d{4}:[^\]]+)\]").expect("hardcoded regex")
    })
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("hardcoded regex"))
}

fn fallback_identity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s([A-Za-z0-9_.\-]{1,64})\s").expect("hardcoded regex"))
}

/// Read the last `max_lines` lines of the log file.
///
/// A missing file is an empty log. Small files are read whole; larger ones
/// only from their trailing [`TAIL_BLOCK`] bytes. Invalid byte sequences
/// decode to replacement characters instead of failing the read.
pub async fn tail_access_log(path: &Path, max_lines: usize) -> Result<Vec<String>> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    };
    let size = meta.len();

    let data = if size < SMALL_FILE_LIMIT {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        // Blocking seek+read offloaded from the cooperative scheduler
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut file = std::fs::File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.seek(SeekFrom::Start(size.saturating_sub(TAIL_BLOCK)))
                .context("Failed to seek into access log")?;
            let mut buf = Vec::with_capacity(TAIL_BLOCK as usize);
            file.read_to_end(&mut buf)
                .context("Failed to read access log tail")?;
            Ok(buf)
        })
        .await
        .context("Access log tail task panicked")??
    };

    let mut lines: Vec<String> = String::from_utf8_lossy(&data)
        .lines()
        .map(str::to_string)
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines.split_off(start))
}

/// Locate the identity candidate in one log line.
///
/// Lines with at least 6 whitespace tokens are assumed to follow the proxy
/// log layout, where the account name sits near fixed position 7 (0-indexed
/// 6, 7 or 8 depending on extra columns): the first of those that is not
/// "-", not a URL, and not a dotted-quad IPv4 wins. Shorter lines fall back
/// to a bounded token search.
pub fn extract_identity(line: &str) -> Option<&str> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.len() >= 6 {
        for idx in [6, 7, 8] {
            if let Some(&cand) = tokens.get(idx) {
                if cand != "-" && !cand.starts_with("http") && !ipv4_re().is_match(cand) {
                    return Some(cand);
                }
            }
        }
        return None;
    }

    fallback_identity_re()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolve the timestamp of one log line, trying in order: a leading Unix
/// epoch (fractional seconds permitted), then a bracketed
/// `[dd/Mon/yyyy:HH:MM:SS ±ZZZZ]` date anywhere in the line.
pub fn extract_timestamp(line: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = epoch_re().captures(line) {
        if let Ok(secs) = caps[1].parse::<f64>() {
            let whole = secs.trunc() as i64;
            let nanos = (secs.fract() * 1e9) as u32;
            if let Some(ts) = DateTime::from_timestamp(whole, nanos) {
                return Some(ts);
            }
        }
    }

    if let Some(caps) = bracket_date_re().captures(line) {
        if let Ok(ts) = DateTime::parse_from_str(&caps[1], "%d/%b/%Y:%H:%M:%S %z") {
            return Some(ts.with_timezone(&Utc));
        }
    }

    None
}

/// Build the activity map from log lines ordered oldest-to-newest.
///
/// Scans newest-to-oldest so the FIRST successful extraction per identity
/// is its most recent occurrence; older occurrences never regress an entry.
/// Lines without a timestamp fall back to `now` — a lossy substitution
/// that can mask true inactivity, kept deliberately (the caller has no
/// better evidence to offer).
pub fn extract_activity(lines: &[String], now: DateTime<Utc>) -> ActivityMap {
    let mut last_seen = ActivityMap::new();

    for line in lines.iter().rev() {
        let Some(identity) = extract_identity(line) else {
            continue;
        };
        if last_seen.contains_key(identity) {
            continue;
        }
        let ts = extract_timestamp(line).unwrap_or(now);
        last_seen.insert(identity.to_string(), ts);
    }

    last_seen
}
