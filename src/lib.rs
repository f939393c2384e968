// VPN/Proxy Gateway Node Library
// Shared modules for daemon and tests

#![warn(missing_docs)]

//! VPN/Proxy Gateway Node Library
//!
//! This library provides the core functionality for provisioning WireGuard peers
//! and proxy-service accounts on a gateway node, and for monitoring their activity
//! to drive automated lifecycle decisions (deactivate, reactivate, purge).
//!
//! # Main Components
//!
//! - [`config`]: Configuration file parsing and validation
//! - [`types`]: Shared data structures
//! - [`error`]: Typed error taxonomy for cross-component contracts
//! - [`runner`]: Injectable external-command execution capability
//! - [`registry`]: Filesystem-backed identity/pubkey registry
//! - [`stats`]: Live peer statistics collection from the tunnel interface
//! - [`credentials`]: Proxy account credential management via htpasswd
//! - [`activity`]: Access-log tailing and last-activity extraction
//! - [`purge`]: Inactive-account purge orchestration
//! - [`peers`]: WireGuard peer lifecycle control

pub mod activity;
pub mod config;
pub mod credentials;
pub mod error;
pub mod peers;
pub mod purge;
pub mod registry;
pub mod runner;
pub mod stats;
pub mod types;
