// Shared types across gateway components

//! Shared data structures
//!
//! This module defines the configuration structures and the statistics
//! records produced by the interface dump parser.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// General daemon options
    pub general: GeneralConfig,
    /// Proxy account / access-log options
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Inactivity purge options
    #[serde(default)]
    pub purge: PurgeConfig,
}

/// General configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// WireGuard interface the gateway manages
    pub wg_interface: String,
    /// Root of the directory-per-identity registry storage
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// env_logger filter applied at startup
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Proxy account configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Path to the htpasswd executable
    #[serde(default = "default_htpasswd_cmd")]
    pub htpasswd_cmd: String,
    /// Credential file managed through htpasswd
    #[serde(default = "default_passwd_file")]
    pub passwd_file: PathBuf,
    /// Proxy access log scanned for account activity
    #[serde(default = "default_access_log")]
    pub access_log: PathBuf,
    /// Maximum log lines considered per scan
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

/// Purge configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PurgeConfig {
    /// Accounts idle for at least this many whole days are deleted (inclusive)
    #[serde(default = "default_inactive_days")]
    pub inactive_days: i64,
    /// Seconds between automatic purge runs in daemon mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            htpasswd_cmd: default_htpasswd_cmd(),
            passwd_file: default_passwd_file(),
            access_log: default_access_log(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            inactive_days: default_inactive_days(),
            interval_secs: default_interval_secs(),
        }
    }
}

// Default values for configuration
fn default_storage_dir() -> PathBuf {
    PathBuf::from("/var/lib/wg-gateway/peers")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_htpasswd_cmd() -> String {
    "/usr/bin/htpasswd".to_string()
}

fn default_passwd_file() -> PathBuf {
    PathBuf::from("/etc/squid/passwd")
}

fn default_access_log() -> PathBuf {
    PathBuf::from("/var/log/squid/access.log")
}

fn default_tail_lines() -> usize {
    20_000
}

fn default_inactive_days() -> i64 {
    30
}

fn default_interval_secs() -> u64 {
    86_400 // daily
}

/// Observed network address of a peer's last contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Host portion (IPv4, bracket-stripped IPv6, or hostname)
    pub host: String,
    /// Port, when the endpoint token carried one
    pub port: Option<u16>,
}

/// One record from the interface dump, keyed by pubkey
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpRecord {
    /// Public key identifying the peer on the interface
    pub pubkey: String,
    /// Last contact address, absent before the first handshake
    pub endpoint: Option<Endpoint>,
    /// Raw allowed-ips column
    pub allowed_ips: String,
    /// Unix time of the latest handshake; None when none has occurred
    pub latest_handshake: Option<u64>,
    /// Bytes received from the peer
    pub received: u64,
    /// Bytes sent to the peer
    pub sent: u64,
}

/// Per-identity statistics exposed to callers (pubkey already resolved)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStats {
    /// Last contact address, absent before the first handshake
    pub endpoint: Option<Endpoint>,
    /// Raw allowed-ips column
    pub allowed_ips: String,
    /// Unix time of the latest handshake; None when none has occurred
    pub latest_handshake: Option<u64>,
    /// Bytes received from the peer
    pub received: u64,
    /// Bytes sent to the peer
    pub sent: u64,
}

impl From<DumpRecord> for PeerStats {
    fn from(rec: DumpRecord) -> Self {
        Self {
            endpoint: rec.endpoint,
            allowed_ips: rec.allowed_ips,
            latest_handshake: rec.latest_handshake,
            received: rec.received,
            sent: rec.sent,
        }
    }
}
