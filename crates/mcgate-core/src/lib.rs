// # mcgate-core
//
// Core library for the mcgate registration and access-synchronization gate.
//
// ## Architecture Overview
//
// This library owns the account lifecycle of a small game server:
// - **AccountStore**: Trait for the persistent account table (pending/approved rows)
// - **Whitelist** / **Firewall**: Traits for the two external access stores
// - **AccessSynchronizer**: Best-effort grant/revoke across whitelist and firewall
// - **Flows**: Registration, approval, edit and unregistration state machines
// - **GateEngine**: Core engine that turns inbound chat updates into flow steps
//
// ## Design Principles
//
// 1. **State first, access second**: the account table is written before the
//    external stores are touched, and drift is reported instead of rolled back
// 2. **Event-Driven**: Inbound updates arrive as an async stream
// 3. **Closed command set**: transports decode into `Command`, never raw strings
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: every whitelist/firewall call is safe to repeat

pub mod access;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod session;
pub mod store;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use access::{AccessSynchronizer, SyncFailure, SyncReport, SyncStep};
pub use command::{Command, Resource, Weather};
pub use config::{EngineConfig, FirewallConfig, GateConfig, StoreConfig, WhitelistConfig};
pub use engine::{Dispatcher, GateEngine, GateEvent, RemovalReason};
pub use error::{ConflictError, Error, Field, Result, ValidationError};
pub use session::{RegistrationStep, Session, SessionStore};
pub use store::{MemoryAccountStore, SqliteAccountStore};
pub use traits::{
    Account, AccountFilter, AccountId, AccountPatch, AccountStore, Action, AllowRule, Console,
    Firewall, Inbound, Notifier, OutboundMessage, Payload, Protocol, UpdateSource, Whitelist,
};
