//! Configuration types for the mcgate system
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`GateConfig`] is built once at process start and shared read-only
//! (`Arc<GateConfig>`) with every component; nothing reads ambient process
//! state after that.

use crate::traits::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Longest accepted idle session timeout (one week)
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Main gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Privileged account ids
    pub admins: BTreeSet<AccountId>,

    /// Account store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Game whitelist (console injection) configuration
    #[serde(default)]
    pub whitelist: WhitelistConfig,

    /// Host firewall configuration
    #[serde(default)]
    pub firewall: FirewallConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl GateConfig {
    /// Create a new configuration with defaults and the given administrators
    pub fn new(admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            store: StoreConfig::default(),
            whitelist: WhitelistConfig::default(),
            firewall: FirewallConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Check administrator membership
    pub fn is_admin(&self, account_id: AccountId) -> bool {
        self.admins.contains(&account_id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.admins.is_empty() {
            return Err(crate::Error::config("No administrators configured"));
        }

        self.store.validate()?;
        self.whitelist.validate()?;
        self.firewall.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Account store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite-backed account table
    Sqlite {
        /// Path to the database file
        path: String,
    },

    /// In-memory account table (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Sqlite { path } if path.trim().is_empty() => {
                Err(crate::Error::config("SQLite store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Game whitelist configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Name of the `screen` session the game server console runs in
    #[serde(default = "default_screen_session")]
    pub screen_session: String,

    /// `screen` executable
    #[serde(default = "default_screen_binary")]
    pub screen_binary: String,
}

impl WhitelistConfig {
    /// Validate the whitelist configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.screen_session.trim().is_empty() {
            return Err(crate::Error::config("Screen session name cannot be empty"));
        }
        if self.screen_binary.trim().is_empty() {
            return Err(crate::Error::config("Screen binary cannot be empty"));
        }
        Ok(())
    }
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            screen_session: default_screen_session(),
            screen_binary: default_screen_binary(),
        }
    }
}

/// Host firewall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// `ufw` executable
    #[serde(default = "default_ufw_binary")]
    pub ufw_binary: String,

    /// Game network port the allow-rules open
    #[serde(default = "default_game_port")]
    pub port: u16,

    /// Log intended rule changes without executing them
    #[serde(default)]
    pub dry_run: bool,
}

impl FirewallConfig {
    /// Validate the firewall configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.port == 0 {
            return Err(crate::Error::config("Game port must be > 0"));
        }
        if self.ufw_binary.trim().is_empty() {
            return Err(crate::Error::config("ufw binary cannot be empty"));
        }
        Ok(())
    }
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            ufw_binary: default_ufw_binary(),
            port: default_game_port(),
            dry_run: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Idle time after which an unfinished conversation is discarded (in seconds)
    ///
    /// Set to 0 to keep sessions until they finish or are superseded. At
    /// most [`MAX_SESSION_TIMEOUT_SECS`].
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.session_timeout_secs > MAX_SESSION_TIMEOUT_SECS {
            return Err(crate::Error::config(format!(
                "Session timeout must be at most {MAX_SESSION_TIMEOUT_SECS} seconds, got {}",
                self.session_timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_screen_session() -> String {
    "minecraft_server".to_string()
}

fn default_screen_binary() -> String {
    "screen".to_string()
}

fn default_ufw_binary() -> String {
    "ufw".to_string()
}

fn default_game_port() -> u16 {
    25565
}

fn default_session_timeout_secs() -> u64 {
    900
}

fn default_event_channel_capacity() -> usize {
    1000
}
