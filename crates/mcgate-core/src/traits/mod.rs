//! Core traits for the mcgate system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AccountStore`]: Persistent account table
//! - [`Console`]: The game server's operator console
//! - [`Whitelist`]: The game process's nickname whitelist
//! - [`Firewall`]: Host firewall allow-rules
//! - [`Notifier`]: Outbound chat messages
//! - [`UpdateSource`]: Inbound chat updates

pub mod account_store;
pub mod console;
pub mod firewall;
pub mod notifier;
pub mod update_source;
pub mod whitelist;

pub use account_store::{Account, AccountFilter, AccountId, AccountPatch, AccountStore};
pub use console::Console;
pub use firewall::{AllowRule, Firewall, Protocol};
pub use notifier::{Action, Notifier, OutboundMessage};
pub use update_source::{Inbound, Payload, UpdateSource};
pub use whitelist::Whitelist;
