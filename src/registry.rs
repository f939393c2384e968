// Filesystem-backed identity registry

//! Filesystem-backed identity/pubkey registry
//!
//! One directory per identity under the storage root; the presence of the
//! `public.key` file inside it is the existence test for that identity.
//! Storage is the single source of truth: lookups rebuild their index from
//! a full scan on every call instead of holding a cache, so concurrent
//! reads are always consistent with the filesystem at call time.

use crate::config::validate_name;
use crate::error::GatewayError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const PUBKEY_FILE: &str = "public.key";

/// Bidirectional identity/pubkey registry over a storage directory tree
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    storage: PathBuf,
}

impl IdentityRegistry {
    /// Open (creating if needed) a registry rooted at `storage`
    pub fn open(storage: PathBuf) -> Result<Self> {
        fs::create_dir_all(&storage).context("Failed to create registry storage directory")?;
        Ok(Self { storage })
    }

    fn slot(&self, identity: &str) -> PathBuf {
        self.storage.join(identity)
    }

    fn pubkey_path(&self, identity: &str) -> PathBuf {
        self.slot(identity).join(PUBKEY_FILE)
    }

    /// Full scan of storage: identity -> pubkey for every slot that holds
    /// a public key file
    pub fn identities(&self) -> Result<HashMap<String, String>> {
        let mut users = HashMap::new();

        let entries = fs::read_dir(&self.storage).context("Failed to read registry storage")?;
        for entry in entries {
            let entry = entry.context("Failed to read registry storage entry")?;
            if !entry.path().is_dir() {
                continue;
            }
            let pubkey_file = entry.path().join(PUBKEY_FILE);
            if !pubkey_file.exists() {
                continue;
            }
            let pubkey = fs::read_to_string(&pubkey_file)
                .with_context(|| format!("Failed to read {}", pubkey_file.display()))?;
            users.insert(
                entry.file_name().to_string_lossy().into_owned(),
                pubkey.trim().to_string(),
            );
        }

        Ok(users)
    }

    /// Reverse index pubkey -> identity, rebuilt from a full scan.
    ///
    /// A pubkey owned by two identities is a storage corruption this layer
    /// must surface, never resolve by picking one.
    pub fn identities_by_pubkey(&self) -> Result<HashMap<String, String>> {
        let mut index = HashMap::new();

        for (identity, pubkey) in self.identities()? {
            if let Some(existing) = index.insert(pubkey.clone(), identity.clone()) {
                return Err(GatewayError::RegistryConsistency {
                    pubkey,
                    first: existing,
                    second: identity,
                }
                .into());
            }
        }

        Ok(index)
    }

    /// Create an owned storage slot for `identity` holding `pubkey`.
    ///
    /// Fails with [`GatewayError::AlreadyExists`] when the slot exists and
    /// with [`GatewayError::RegistryConsistency`] when another identity
    /// already owns the key.
    pub fn register(&self, identity: &str, pubkey: &str) -> Result<()> {
        validate_name(identity, "Identity")?;

        if self.pubkey_path(identity).exists() {
            return Err(GatewayError::AlreadyExists(identity.to_string()).into());
        }

        if let Some(owner) = self.identities_by_pubkey()?.get(pubkey) {
            return Err(GatewayError::RegistryConsistency {
                pubkey: pubkey.to_string(),
                first: owner.clone(),
                second: identity.to_string(),
            }
            .into());
        }

        let slot = self.slot(identity);
        fs::create_dir_all(&slot)
            .with_context(|| format!("Failed to create slot for {}", identity))?;
        fs::write(self.pubkey_path(identity), format!("{}\n", pubkey))
            .with_context(|| format!("Failed to write public key for {}", identity))?;

        Ok(())
    }

    /// Resolve an identity to its public key
    pub fn lookup_by_identity(&self, identity: &str) -> Result<String> {
        let path = self.pubkey_path(identity);
        if !path.exists() {
            return Err(GatewayError::NotFound(identity.to_string()).into());
        }
        let pubkey = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read public key for {}", identity))?;
        Ok(pubkey.trim().to_string())
    }

    /// Resolve a public key to the identity owning it
    pub fn lookup_by_pubkey(&self, pubkey: &str) -> Result<String> {
        self.identities_by_pubkey()?
            .get(pubkey)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("pubkey {}", pubkey)).into())
    }

    /// Delete an identity's storage slot
    pub fn remove(&self, identity: &str) -> Result<()> {
        validate_name(identity, "Identity")?;

        let slot = self.slot(identity);
        if !self.pubkey_path(identity).exists() {
            return Err(GatewayError::NotFound(identity.to_string()).into());
        }
        fs::remove_dir_all(&slot)
            .with_context(|| format!("Failed to remove slot for {}", identity))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, IdentityRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path().join("peers")).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_register_and_lookup_roundtrip() {
        let (_dir, registry) = registry();
        let pubkey = format!("AAAA{}", "x".repeat(40));

        registry.register("alice", &pubkey).unwrap();

        assert_eq!(registry.lookup_by_identity("alice").unwrap(), pubkey);
        assert_eq!(registry.lookup_by_pubkey(&pubkey).unwrap(), "alice");
    }

    #[test]
    fn test_register_duplicate_identity() {
        let (_dir, registry) = registry();
        registry.register("alice", "PK-A").unwrap();

        let err = registry.register("alice", "PK-B").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_register_duplicate_pubkey() {
        let (_dir, registry) = registry();
        registry.register("alice", "PK-SHARED").unwrap();

        let err = registry.register("bob", "PK-SHARED").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::RegistryConsistency { .. })
        ));
    }

    #[test]
    fn test_lookup_missing() {
        let (_dir, registry) = registry();

        let err = registry.lookup_by_identity("ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::NotFound(_))
        ));

        let err = registry.lookup_by_pubkey("no-such-key").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove() {
        let (_dir, registry) = registry();
        registry.register("alice", "PK-A").unwrap();

        registry.remove("alice").unwrap();
        assert!(registry.lookup_by_identity("alice").is_err());

        let err = registry.remove("alice").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_scan_skips_incomplete_slots() {
        let (_dir, registry) = registry();
        registry.register("alice", "PK-A").unwrap();

        // A slot without a public.key file does not exist as far as the
        // registry is concerned
        fs::create_dir_all(registry.slot("half-provisioned")).unwrap();

        let users = registry.identities().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users.contains_key("alice"));
    }

    #[test]
    fn test_duplicate_pubkey_on_disk_surfaces_consistency_error() {
        let (_dir, registry) = registry();
        registry.register("alice", "PK-SHARED").unwrap();

        // Corrupt storage behind the registry's back
        let slot = registry.slot("bob");
        fs::create_dir_all(&slot).unwrap();
        fs::write(slot.join(PUBKEY_FILE), "PK-SHARED\n").unwrap();

        let err = registry.identities_by_pubkey().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::RegistryConsistency { .. })
        ));
    }

    #[test]
    fn test_register_rejects_unsafe_identity() {
        let (_dir, registry) = registry();
        assert!(registry.register("../escape", "PK").is_err());
        assert!(registry.register("a; rm -rf /", "PK").is_err());
        assert!(registry.register("", "PK").is_err());
    }
}
