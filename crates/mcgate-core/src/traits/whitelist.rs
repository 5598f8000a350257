// # Whitelist Trait
//
// Defines the interface to the game process's nickname whitelist.
//
// ## Implementations
//
// - GNU screen console injection: `mcgate-whitelist-screen` crate
//
// ## Usage
//
// ```rust,ignore
// let whitelist = /* Whitelist implementation */;
// whitelist.add("steve_1").await?;
// whitelist.reload().await?;
// ```

use async_trait::async_trait;

/// Trait for whitelist implementations
///
/// # Trust Level: Untrusted
///
/// Whitelist backends are thin wrappers around an external process:
///
/// ## Allowed Capabilities
/// - ✅ Issue one console command per call
/// - ✅ Check that the control channel is live before issuing it
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by the operator via resync)
/// - ❌ Access the account store
/// - ❌ Decide whether a grant is needed (owned by the flows)
///
/// # Idempotency
///
/// `add` of a present nickname and `remove` of an absent one must succeed
/// without changing membership.
#[async_trait]
pub trait Whitelist: Send + Sync {
    /// Add a nickname to the whitelist
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Command accepted
    /// - `Err(Error::ControlChannelUnavailable)`: The game process is not running
    /// - `Err(Error)`: The command could not be delivered
    async fn add(&self, nickname: &str) -> Result<(), crate::Error>;

    /// Remove a nickname from the whitelist
    async fn remove(&self, nickname: &str) -> Result<(), crate::Error>;

    /// Make the game process re-read its whitelist
    async fn reload(&self) -> Result<(), crate::Error>;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}
