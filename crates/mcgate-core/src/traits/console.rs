// # Console Trait
//
// Defines the interface to the game server's operator console, used for
// administrator commands that do not change account state (chat, weather,
// bans).
//
// ## Implementations
//
// - GNU screen console injection: `mcgate-whitelist-screen` crate
//
// ## Usage
//
// ```rust,ignore
// let console = /* Console implementation */;
// console.execute("weather clear").await?;
// ```

use async_trait::async_trait;

/// Trait for console implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Deliver one single-line command per call
/// - ✅ Check that the control channel is live before delivering it
///
/// ## Forbidden Capabilities
/// - ❌ Compose commands (the flows build the line)
/// - ❌ Access the account store
///
/// The game server does not acknowledge console input, so success means
/// the line was delivered, not that the command did anything.
#[async_trait]
pub trait Console: Send + Sync {
    /// Deliver one console command line
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Line delivered
    /// - `Err(Error::ControlChannelUnavailable)`: The game process is not running
    /// - `Err(Error::InvalidInput)`: The line contains control characters
    /// - `Err(Error)`: The line could not be delivered
    async fn execute(&self, line: &str) -> Result<(), crate::Error>;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}
