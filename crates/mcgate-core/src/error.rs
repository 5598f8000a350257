//! Error types for the mcgate system
//!
//! This module defines all error types used throughout the crate.
//!
//! The conversational taxonomy is split in two nested enums:
//! - [`ValidationError`]: the submitted value is syntactically unusable
//! - [`ConflictError`]: the value is fine but collides with existing state
//!
//! Both are recovered locally by re-prompting the same step. Everything else
//! ends the interaction (see [`Error::is_recoverable`]).

use crate::traits::AccountId;
use thiserror::Error;

/// Result type alias for mcgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which account field a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Nickname,
    Ip,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Nickname => f.write_str("nickname"),
            Field::Ip => f.write_str("IP address"),
        }
    }
}

/// Syntactic/policy rejection of a submitted value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Blank after trimming
    #[error("{0} cannot be empty")]
    Empty(Field),

    /// Nickname length outside the allowed range
    #[error("nickname must be between {min} and {max} characters, got {actual}")]
    LengthOutOfRange {
        min: usize,
        max: usize,
        actual: usize,
    },

    /// Nickname contains characters outside `[a-z0-9_]`
    #[error("nickname may only contain latin letters, digits and underscores")]
    InvalidCharacters,

    /// Not an IPv4/IPv6 address
    #[error("malformed IP address: {0}")]
    MalformedIp(String),

    /// Loopback, link-local, multicast or reserved address
    #[error("special-purpose address not allowed: {0}")]
    ReservedAddress(String),
}

/// Collision with existing state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("nickname already taken: {0}")]
    NicknameTaken(String),

    #[error("IP address already in use: {0}")]
    IpTaken(String),

    #[error("new value is the same as the current one")]
    NoChange,

    /// The invoking account already has a row
    #[error("account already registered (approved: {approved})")]
    AlreadyRegistered { approved: bool },
}

/// Core error type for the mcgate system
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Caller is not in the administrator set
    #[error("permission denied for account {0}")]
    PermissionDenied(AccountId),

    /// The step being answered is no longer active (stale button, timed-out session)
    #[error("no active session for this action")]
    SessionExpired,

    /// The game process control channel is not live
    #[error("control channel unavailable: {0}")]
    ControlChannelUnavailable(String),

    /// A console command reached a live session but could not be typed in
    #[error("console command failed: {0}")]
    Console(String),

    /// Firewall rule application failed (possibly partially)
    #[error("firewall error: {0}")]
    Firewall(String),

    /// Account store errors
    #[error("account store error: {0}")]
    Store(String),

    /// Notification delivery / update polling errors
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input at a boundary (undecodable command payload, bad console text)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a console error
    pub fn console(msg: impl Into<String>) -> Self {
        Self::Console(msg.into())
    }

    /// Create a firewall error
    pub fn firewall(msg: impl Into<String>) -> Self {
        Self::Firewall(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a control channel error
    pub fn control_channel(msg: impl Into<String>) -> Self {
        Self::ControlChannelUnavailable(msg.into())
    }

    /// Whether the conversation stays in its current step after this error.
    ///
    /// Validation and conflict errors re-prompt, except `AlreadyRegistered`
    /// which has no sensible retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Validation(_) => true,
            Error::Conflict(ConflictError::AlreadyRegistered { .. }) => false,
            Error::Conflict(_) => true,
            _ => false,
        }
    }

    /// Text shown to the end user for this error.
    ///
    /// Infrastructure errors get a generic text; details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(ValidationError::Empty(field)) => {
                format!("The {field} cannot be empty. Please try again:")
            }
            Error::Validation(ValidationError::LengthOutOfRange { min, max, .. }) => {
                format!("The nickname must be {min} to {max} characters long. Please try again:")
            }
            Error::Validation(ValidationError::InvalidCharacters) => {
                "The nickname may only contain latin letters, digits and underscores. Please try again:"
                    .to_string()
            }
            Error::Validation(ValidationError::MalformedIp(_)) => {
                "Invalid IP format. Use IPv4 (e.g. 203.0.113.5) or IPv6 (e.g. 2001:db8:85a3::8a2e:370:7334):"
                    .to_string()
            }
            Error::Validation(ValidationError::ReservedAddress(_)) => {
                "Special-purpose or reserved IP addresses cannot be used. Please enter another one:"
                    .to_string()
            }
            Error::Conflict(ConflictError::NicknameTaken(_)) => {
                "This nickname is already taken. Please choose another one:".to_string()
            }
            Error::Conflict(ConflictError::IpTaken(_)) => {
                "This IP address is already in use. Please enter another one:".to_string()
            }
            Error::Conflict(ConflictError::NoChange) => {
                "The new value is the same as the current one. Please enter a different value:"
                    .to_string()
            }
            Error::Conflict(ConflictError::AlreadyRegistered { approved: true }) => {
                "You are already registered and approved. Use /status to see your profile."
                    .to_string()
            }
            Error::Conflict(ConflictError::AlreadyRegistered { approved: false }) => {
                "You already have an application awaiting administrator approval.".to_string()
            }
            Error::AccountNotFound(_) => "Account not found.".to_string(),
            Error::PermissionDenied(_) => "Access denied.".to_string(),
            Error::SessionExpired => {
                "This action is no longer active. Please start over.".to_string()
            }
            _ => "Something went wrong while processing your request.".to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Store(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_follows_taxonomy() {
        assert!(Error::from(ValidationError::InvalidCharacters).is_recoverable());
        assert!(Error::from(ConflictError::NicknameTaken("steve".into())).is_recoverable());
        assert!(Error::from(ConflictError::NoChange).is_recoverable());
        assert!(!Error::from(ConflictError::AlreadyRegistered { approved: false }).is_recoverable());
        assert!(!Error::AccountNotFound(7).is_recoverable());
        assert!(!Error::PermissionDenied(7).is_recoverable());
    }

    #[test]
    fn infrastructure_details_stay_out_of_user_messages() {
        let err = Error::store("disk I/O error at /var/lib/mcgate/users.db");
        assert!(!err.user_message().contains("/var/lib"));
    }
}
