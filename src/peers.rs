// WireGuard peer lifecycle control

//! WireGuard peer lifecycle control
//!
//! Provisions, deactivates, reactivates and removes peers on the tunnel
//! interface by driving `wg set` through the command runner, with the
//! identity registry as the source of truth for identity -> pubkey
//! resolution. Key-pair generation happens outside this module; callers
//! supply the peer's public key at provisioning time.

use crate::config::validate_name;
use crate::error::GatewayError;
use crate::registry::IdentityRegistry;
use crate::runner::CommandRunner;
use crate::stats::looks_like_pubkey;
use anyhow::{Context, Result};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Allowed-ips value that cuts a peer off without removing it
const DEACTIVATED_ALLOWED_IPS: &str = "0.0.0.0/32";

/// Controls peer state on the tunnel interface
pub struct PeerManager {
    interface: String,
    registry: IdentityRegistry,
    runner: Arc<dyn CommandRunner>,
}

impl PeerManager {
    /// Create a manager for the named interface
    pub fn new(
        interface: String,
        registry: IdentityRegistry,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        validate_name(&interface, "Interface name")?;
        Ok(Self {
            interface,
            registry,
            runner,
        })
    }

    async fn wg_set_allowed_ips(&self, pubkey: &str, allowed_ips: &str) -> Result<()> {
        let out = self
            .runner
            .run(
                "wg",
                &[
                    "set",
                    &self.interface,
                    "peer",
                    pubkey,
                    "allowed-ips",
                    allowed_ips,
                ],
            )
            .await?;

        if !out.success() {
            return Err(GatewayError::ToolInvocation {
                tool: "wg".to_string(),
                message: out.failure_text().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Register a new peer and admit it on the interface.
    ///
    /// `isolate` confines the peer to its own /32; otherwise it may route
    /// for its whole /24.
    pub async fn add_peer(
        &self,
        identity: &str,
        pubkey: &str,
        ip_addr: &str,
        isolate: bool,
    ) -> Result<()> {
        if !looks_like_pubkey(pubkey) {
            anyhow::bail!("'{}' does not look like a public key", pubkey);
        }
        let ip: Ipv4Addr = ip_addr
            .parse()
            .with_context(|| format!("Invalid peer address: {}", ip_addr))?;

        self.registry.register(identity, pubkey)?;

        let allowed_ips = if isolate {
            format!("{}/32", ip)
        } else {
            let o = ip.octets();
            format!("{}.{}.{}.0/24", o[0], o[1], o[2])
        };

        log::info!("Admitting peer {} with allowed-ips {}", identity, allowed_ips);
        self.wg_set_allowed_ips(pubkey, &allowed_ips).await
    }

    /// Cut an existing peer off without removing its registration
    pub async fn deactivate_peer(&self, identity: &str) -> Result<()> {
        let pubkey = self.registry.lookup_by_identity(identity)?;
        log::info!("Deactivating peer {}", identity);
        self.wg_set_allowed_ips(&pubkey, DEACTIVATED_ALLOWED_IPS).await
    }

    /// Restore a deactivated peer's allowed range
    pub async fn reactivate_peer(&self, identity: &str, ip_addr: &str) -> Result<()> {
        let pubkey = self.registry.lookup_by_identity(identity)?;
        let ip: Ipv4Addr = ip_addr
            .parse()
            .with_context(|| format!("Invalid peer address: {}", ip_addr))?;
        log::info!("Reactivating peer {}", identity);
        self.wg_set_allowed_ips(&pubkey, &format!("{}/24", ip)).await
    }

    /// Remove a peer from the interface and delete its registry slot
    pub async fn remove_peer(&self, identity: &str) -> Result<()> {
        let pubkey = self.registry.lookup_by_identity(identity)?;

        let out = self
            .runner
            .run("wg", &["set", &self.interface, "peer", &pubkey, "remove"])
            .await?;
        if !out.success() {
            return Err(GatewayError::ToolInvocation {
                tool: "wg".to_string(),
                message: out.failure_text().to_string(),
            }
            .into());
        }

        log::info!("Removed peer {}", identity);
        self.registry.remove(identity)
    }
}
