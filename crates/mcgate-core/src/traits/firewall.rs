// # Firewall Trait
//
// Defines the interface for host firewall allow-rules.
//
// ## Implementations
//
// - ufw: `mcgate-firewall-ufw` crate
//
// Each call installs or deletes exactly one rule. The two-protocol grant for
// an address is composed by `AccessSynchronizer`, which is where partial
// application is detected and reported.

use async_trait::async_trait;
use std::fmt;

/// Transport protocol of an allow-rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Both protocols, in the order rules are applied
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allow-rule: traffic from `source` to the game `port` over `protocol`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllowRule {
    pub source: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl AllowRule {
    pub fn new(source: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            source: source.into(),
            port,
            protocol,
        }
    }
}

impl fmt::Display for AllowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> :{}/{}", self.source, self.port, self.protocol)
    }
}

/// Trait for firewall implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Run one external command per call
///
/// ## Forbidden Capabilities
/// - ❌ Retry, roll back or compose rules (owned by `AccessSynchronizer`)
/// - ❌ Access the account store
///
/// # Idempotency
///
/// Allowing a present rule and deleting an absent one must succeed.
#[async_trait]
pub trait Firewall: Send + Sync {
    /// Install an allow-rule
    async fn allow(&self, rule: &AllowRule) -> Result<(), crate::Error>;

    /// Delete an allow-rule
    async fn delete(&self, rule: &AllowRule) -> Result<(), crate::Error>;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}
