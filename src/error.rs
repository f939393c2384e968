// Typed error taxonomy

//! Typed error taxonomy for cross-component contracts
//!
//! Callers that must branch on the failure kind (missing identity vs.
//! duplicate registration vs. a failed privileged tool) match on these
//! variants; everything else travels as `anyhow` context chains.

use thiserror::Error;

/// Errors that cross component boundaries with a stable, matchable shape
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The named identity (or a pubkey's owner) does not exist
    #[error("identity not found: {0}")]
    NotFound(String),

    /// A registration targeted an identity slot that already exists
    #[error("identity already exists: {0}")]
    AlreadyExists(String),

    /// A registry scan found the same pubkey owned by two identities.
    /// Never silently resolved: the storage tree needs operator attention.
    #[error("registry inconsistent: pubkey {pubkey} owned by both '{first}' and '{second}'")]
    RegistryConsistency {
        /// The duplicated public key
        pubkey: String,
        /// First identity found owning the key
        first: String,
        /// Second identity found owning the key
        second: String,
    },

    /// An external tool failed without matching a known recovery heuristic
    #[error("{tool} invocation failed: {message}")]
    ToolInvocation {
        /// Name of the invoked executable
        tool: String,
        /// Captured stderr (or stdout when stderr was empty)
        message: String,
    },
}
